//! Element types a device column can hold.

/// Fixed-width element types supported on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuDataType {
    /// One byte per value, 0 or 1.
    Bool8,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Days since the Unix epoch, stored as `i32`.
    Date32,
    /// Milliseconds since the Unix epoch, stored as `i64`.
    TimestampMs,
}

impl GpuDataType {
    /// Byte width of one element.
    pub fn byte_width(self) -> usize {
        match self {
            GpuDataType::Bool8 | GpuDataType::Int8 | GpuDataType::UInt8 => 1,
            GpuDataType::Int16 | GpuDataType::UInt16 => 2,
            GpuDataType::Int32 | GpuDataType::UInt32 | GpuDataType::Float32 | GpuDataType::Date32 => 4,
            GpuDataType::Int64 | GpuDataType::UInt64 | GpuDataType::Float64 | GpuDataType::TimestampMs => 8,
        }
    }
}

/// Rust scalar types that map onto a [`GpuDataType`].
pub trait NativeType: Copy + Send + Sync + 'static {
    /// Type used when a column is built from a slice of `Self`.
    const DTYPE: GpuDataType;
    const NAME: &'static str;

    /// Whether values of `dtype` can be read as `Self`.
    fn compatible(dtype: GpuDataType) -> bool {
        dtype == Self::DTYPE
    }

    fn write_le(self, out: &mut [u8]);

    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! native_type {
    ($ty:ty, $dtype:ident $(, $alias:ident)*) => {
        impl NativeType for $ty {
            const DTYPE: GpuDataType = GpuDataType::$dtype;
            const NAME: &'static str = stringify!($ty);

            fn compatible(dtype: GpuDataType) -> bool {
                matches!(dtype, GpuDataType::$dtype $(| GpuDataType::$alias)*)
            }

            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

native_type!(i8, Int8);
native_type!(i16, Int16);
native_type!(i32, Int32, Date32);
native_type!(i64, Int64, TimestampMs);
native_type!(u8, UInt8);
native_type!(u16, UInt16);
native_type!(u32, UInt32);
native_type!(u64, UInt64);
native_type!(f32, Float32);
native_type!(f64, Float64);

impl NativeType for bool {
    const DTYPE: GpuDataType = GpuDataType::Bool8;
    const NAME: &'static str = "bool";

    fn write_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_widths() {
        assert_eq!(GpuDataType::Bool8.byte_width(), 1);
        assert_eq!(GpuDataType::Int16.byte_width(), 2);
        assert_eq!(GpuDataType::Date32.byte_width(), 4);
        assert_eq!(GpuDataType::Float64.byte_width(), 8);
    }

    #[test]
    fn native_widths_match_dtype() {
        fn check<T: NativeType>() {
            assert_eq!(std::mem::size_of::<T>(), T::DTYPE.byte_width(), "{}", T::NAME);
        }
        check::<i8>();
        check::<i16>();
        check::<i32>();
        check::<i64>();
        check::<u8>();
        check::<u16>();
        check::<u32>();
        check::<u64>();
        check::<f32>();
        check::<f64>();
        check::<bool>();
    }

    #[test]
    fn aliases_share_representation() {
        assert!(i32::compatible(GpuDataType::Date32));
        assert!(i64::compatible(GpuDataType::TimestampMs));
        assert!(!i64::compatible(GpuDataType::Float64));

        let mut raw = [0u8; 8];
        (-42i64).write_le(&mut raw);
        assert_eq!(i64::read_le(&raw), -42);
    }
}
