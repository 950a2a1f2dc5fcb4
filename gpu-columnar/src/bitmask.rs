//! Validity bitmaps: one bit per row, least-significant bit first, a set bit
//! marks a valid (non-null) value.

/// Bytes needed to hold a mask for `rows` rows.
pub fn mask_bytes(rows: usize) -> usize {
    rows.div_ceil(8)
}

pub fn get_bit(mask: &[u8], row: usize) -> bool {
    (mask[row / 8] >> (row % 8)) & 1 == 1
}

pub fn set_bit(mask: &mut [u8], row: usize, valid: bool) {
    let bit = 1u8 << (row % 8);
    if valid {
        mask[row / 8] |= bit;
    } else {
        mask[row / 8] &= !bit;
    }
}

/// Pack per-row validity flags into a mask.
pub fn pack<I>(validity: I) -> Vec<u8>
where
    I: IntoIterator<Item = bool>,
{
    let mut mask = Vec::new();
    for (row, valid) in validity.into_iter().enumerate() {
        if row % 8 == 0 {
            mask.push(0);
        }
        if valid {
            set_bit(&mut mask, row, true);
        }
    }
    mask
}

pub fn count_nulls(mask: &[u8], rows: usize) -> usize {
    (0..rows).filter(|&row| !get_bit(mask, row)).count()
}
