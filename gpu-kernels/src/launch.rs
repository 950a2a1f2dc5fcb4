//! Launch geometry for element-parallel kernels.
//!
//! Kernels in this crate run one logical thread per output element; the
//! grid is split into blocks and each block is scheduled as one unit of
//! parallel work.

/// Threads per block.
pub const BLOCK_SIZE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid: u32,
    pub block: u32,
}

impl LaunchConfig {
    /// Compute an appropriate grid size for `n_elements`.
    pub fn for_elements(n_elements: usize) -> Self {
        Self::with_block(n_elements, BLOCK_SIZE)
    }

    pub fn with_block(n_elements: usize, block: u32) -> Self {
        let block = block.max(1);
        let grid = n_elements.div_ceil(block as usize).clamp(1, u32::MAX as usize) as u32;
        Self { grid, block }
    }

    /// Elements handled by one block.
    pub fn block_len(&self) -> usize {
        self.block as usize
    }
}
