use rustc_hash::FxHashMap;

use super::palette::NonResizingPalette;
use crate::block_state::{BlockState, AIR};
use crate::math::BlockPos;

const INITIAL_PALETTE_SIZE: usize = 1024;

/// Packs a position into the sparse map key.
pub fn pack_pos(x: i32, y: i32, z: i32) -> u64 {
    ((y as u64 & 0xFFFF) << 48) | ((z as u64 & 0xFF_FFFF) << 24) | (x as u64 & 0xFF_FFFF)
}

pub fn unpack_x(key: u64) -> i32 {
    (key & 0xFF_FFFF) as i32
}

pub fn unpack_y(key: u64) -> i32 {
    ((key >> 48) & 0xFFFF) as i32
}

pub fn unpack_z(key: u64) -> i32 {
    ((key >> 24) & 0xFF_FFFF) as i32
}

/// Map-backed storage for mostly empty volumes.
///
/// Only explicitly set cells are stored. Counts are kept up to date on every
/// write instead of being recomputed.
#[derive(Debug, Clone)]
pub struct SparseBlockContainer {
    size: BlockPos,
    volume: u64,
    blocks: FxHashMap<u64, BlockState>,
    palette: NonResizingPalette,
    block_counts: Vec<u64>,
}

impl SparseBlockContainer {
    pub fn new(size: BlockPos) -> Self {
        let size = size.abs();
        SparseBlockContainer {
            size,
            volume: size.volume(),
            blocks: FxHashMap::default(),
            palette: NonResizingPalette::with_capacity(INITIAL_PALETTE_SIZE),
            block_counts: vec![0; INITIAL_PALETTE_SIZE],
        }
    }

    pub fn size(&self) -> BlockPos {
        self.size
    }

    pub fn total_volume(&self) -> u64 {
        self.volume
    }

    pub fn palette(&self) -> &NonResizingPalette {
        &self.palette
    }

    fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && y >= 0 && z >= 0 && x < self.size.x && y < self.size.y && z < self.size.z
    }

    pub fn get_block_state(&self, x: i32, y: i32, z: i32) -> &BlockState {
        if !self.contains(x, y, z) {
            return &AIR;
        }
        self.blocks.get(&pack_pos(x, y, z)).unwrap_or(&AIR)
    }

    /// Stores `state` even when it is air. Ignores positions outside the container.
    pub fn set_block_state(&mut self, x: i32, y: i32, z: i32, state: &BlockState) {
        if !self.contains(x, y, z) {
            return;
        }
        let id = self.palette.id_for(state) as usize;
        if id >= self.block_counts.len() {
            let mut len = self.block_counts.len().max(1);
            while len <= id {
                len *= 2;
            }
            self.block_counts.resize(len, 0);
        }

        let old = self.blocks.insert(pack_pos(x, y, z), state.clone());
        if old.as_ref() == Some(state) {
            return;
        }
        if let Some(old) = old {
            let old_id = self.palette.id_for(&old) as usize;
            self.block_counts[old_id] = self.block_counts[old_id].saturating_sub(1);
        }
        self.block_counts[id] += 1;
    }

    /// Number of explicitly stored cells.
    pub fn stored_cells(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockPos, &BlockState)> + '_ {
        self.blocks.iter().map(|(&key, state)| {
            (
                BlockPos::new(unpack_x(key), unpack_y(key), unpack_z(key)),
                state,
            )
        })
    }

    /// Counts indexed by palette id.
    pub fn block_counts(&self) -> &[u64] {
        &self.block_counts
    }

    pub fn total_block_count(&self) -> u64 {
        self.palette
            .mapping()
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.is_air())
            .map(|(id, _)| self.block_counts[id])
            .sum()
    }

    pub fn block_counts_map(&self) -> FxHashMap<BlockState, u64> {
        let mut map = FxHashMap::default();
        for (id, state) in self.palette.mapping().iter().enumerate() {
            let count = self.block_counts[id];
            if count > 0 {
                map.insert(state.clone(), count);
            }
        }
        map
    }
}
