//! Block storage for one region.
//!
//! Two strategies share the same read/write contract: a dense packed array
//! with a resizing palette, and a sparse map for large, mostly empty volumes.

pub mod array;
pub mod packed;
pub mod palette;
pub mod sparse;

pub use array::ArrayBlockContainer;
pub use packed::{PackedIntArray, PackedLayout};
pub use palette::{required_bit_width, NonResizingPalette, Palette, PaletteResizer};
pub use sparse::SparseBlockContainer;

use rustc_hash::FxHashMap;

use crate::block_state::BlockState;
use crate::error::Result;
use crate::math::BlockPos;

#[derive(Debug, Clone)]
pub enum BlockContainer {
    Array(ArrayBlockContainer),
    Sparse(SparseBlockContainer),
}

impl BlockContainer {
    /// Dense container with aligned storage.
    pub fn array(size: BlockPos, bits: u32) -> Result<Self> {
        Ok(BlockContainer::Array(ArrayBlockContainer::new(size, bits)?))
    }

    pub fn tight_array(size: BlockPos, bits: u32) -> Result<Self> {
        Ok(BlockContainer::Array(ArrayBlockContainer::with_layout(
            size,
            bits,
            PackedLayout::Tight,
        )?))
    }

    pub fn sparse(size: BlockPos) -> Self {
        BlockContainer::Sparse(SparseBlockContainer::new(size))
    }

    pub fn size(&self) -> BlockPos {
        match self {
            BlockContainer::Array(c) => c.size(),
            BlockContainer::Sparse(c) => c.size(),
        }
    }

    pub fn total_volume(&self) -> u64 {
        match self {
            BlockContainer::Array(c) => c.total_volume(),
            BlockContainer::Sparse(c) => c.total_volume(),
        }
    }

    pub fn get_block_state(&self, x: i32, y: i32, z: i32) -> &BlockState {
        match self {
            BlockContainer::Array(c) => c.get_block_state(x, y, z),
            BlockContainer::Sparse(c) => c.get_block_state(x, y, z),
        }
    }

    pub fn set_block_state(&mut self, x: i32, y: i32, z: i32, state: &BlockState) -> Result<()> {
        match self {
            BlockContainer::Array(c) => c.set_block_state(x, y, z, state),
            BlockContainer::Sparse(c) => {
                c.set_block_state(x, y, z, state);
                Ok(())
            }
        }
    }

    pub fn total_block_count(&self) -> u64 {
        match self {
            BlockContainer::Array(c) => c.total_block_count(),
            BlockContainer::Sparse(c) => c.total_block_count(),
        }
    }

    pub fn block_counts_map(&self) -> FxHashMap<BlockState, u64> {
        match self {
            BlockContainer::Array(c) => c.block_counts_map(),
            BlockContainer::Sparse(c) => c.block_counts_map(),
        }
    }

    pub fn palette_mapping(&self) -> &[BlockState] {
        match self {
            BlockContainer::Array(c) => c.palette().mapping(),
            BlockContainer::Sparse(c) => c.palette().mapping(),
        }
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn as_array(&self) -> Option<&ArrayBlockContainer> {
        match self {
            BlockContainer::Array(c) => Some(c),
            BlockContainer::Sparse(_) => None,
        }
    }

    pub fn as_sparse(&self) -> Option<&SparseBlockContainer> {
        match self {
            BlockContainer::Sparse(c) => Some(c),
            BlockContainer::Array(_) => None,
        }
    }

    /// Dense copy in `layout` with the narrowest storage for its palette.
    /// Array sources keep their palette ids.
    pub fn to_array(&self, layout: PackedLayout) -> Result<ArrayBlockContainer> {
        match self {
            BlockContainer::Array(c) => c.to_compact_layout(layout),
            BlockContainer::Sparse(c) => {
                let bits = required_bit_width(c.palette().len() + 1);
                let mut out = ArrayBlockContainer::with_layout(c.size(), bits, layout)?;
                for (pos, state) in c.iter_blocks() {
                    out.set_block_state(pos.x, pos.y, pos.z, state)?;
                }
                out.to_compact_layout(layout)
            }
        }
    }
}

/// Copies the overlapping extent of `from` into `to`.
pub fn copy_container_contents(from: &BlockContainer, to: &mut BlockContainer) -> Result<()> {
    let a = from.size();
    let b = to.size();
    let (sx, sy, sz) = (a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));

    if let BlockContainer::Sparse(sparse) = from {
        for (pos, state) in sparse.iter_blocks() {
            if pos.x < sx && pos.y < sy && pos.z < sz {
                to.set_block_state(pos.x, pos.y, pos.z, state)?;
            }
        }
        return Ok(());
    }

    for y in 0..sy {
        for z in 0..sz {
            for x in 0..sx {
                to.set_block_state(x, y, z, from.get_block_state(x, y, z))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_between_kinds() {
        let stone = BlockState::new("minecraft:stone");
        let mut sparse = BlockContainer::sparse(BlockPos::new(4, 4, 4));
        sparse.set_block_state(0, 0, 0, &stone).unwrap();
        sparse.set_block_state(3, 3, 3, &stone).unwrap();

        let mut small = BlockContainer::array(BlockPos::new(2, 2, 2), 2).unwrap();
        copy_container_contents(&sparse, &mut small).unwrap();
        assert_eq!(small.get_block_state(0, 0, 0), &stone);
        assert_eq!(small.total_block_count(), 1);

        let mut back = BlockContainer::sparse(BlockPos::new(4, 4, 4));
        copy_container_contents(&small, &mut back).unwrap();
        assert_eq!(back.get_block_state(0, 0, 0), &stone);
        assert!(back.get_block_state(3, 3, 3).is_air());
    }

    #[test]
    fn test_copy_is_independent() {
        let stone = BlockState::new("minecraft:stone");
        let mut original = BlockContainer::array(BlockPos::new(2, 2, 2), 2).unwrap();
        let copy = original.copy();
        original.set_block_state(1, 1, 1, &stone).unwrap();
        assert!(copy.get_block_state(1, 1, 1).is_air());
    }

    #[test]
    fn test_sparse_to_array() {
        let glass = BlockState::new("minecraft:glass");
        let mut sparse = BlockContainer::sparse(BlockPos::new(3, 3, 3));
        sparse.set_block_state(2, 1, 0, &glass).unwrap();
        let dense = sparse.to_array(PackedLayout::Tight).unwrap();
        assert_eq!(dense.get_block_state(2, 1, 0), &glass);
        assert_eq!(dense.palette().get(0), Some(&BlockState::air()));
        assert_eq!(dense.total_block_count(), 1);
    }
}
