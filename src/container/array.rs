use rustc_hash::FxHashMap;
use std::cell::OnceCell;

use super::packed::{PackedIntArray, PackedLayout};
use super::palette::{required_bit_width, Palette, PaletteResizer, MIN_BITS};
use crate::block_state::{BlockState, AIR};
use crate::error::Result;
use crate::math::BlockPos;

/// Dense storage: one palette id per cell, indexed `y * sx * sz + z * sx + x`.
#[derive(Debug, Clone)]
pub struct ArrayBlockContainer {
    size: BlockPos,
    size_layer: u64,
    volume: u64,
    palette: Palette,
    storage: PackedIntArray,
    block_counts: OnceCell<Vec<u64>>,
    check_for_freed_ids: bool,
}

/// Grows or scans the container's storage on behalf of its palette.
struct StorageResizer<'a> {
    storage: &'a mut PackedIntArray,
    check_for_freed_ids: bool,
}

impl PaletteResizer for StorageResizer<'_> {
    fn free_id(&mut self, palette_len: usize) -> Option<u32> {
        if !self.check_for_freed_ids {
            return None;
        }
        let counts = self.storage.value_counts();
        // id 0 stays air
        (1..palette_len.min(counts.len()))
            .find(|&id| counts[id] == 0)
            .map(|id| id as u32)
    }

    fn grow(&mut self, new_bits: u32) -> Result<()> {
        *self.storage = self.storage.resized(new_bits)?;
        Ok(())
    }
}

impl ArrayBlockContainer {
    /// An all-air container with aligned storage.
    pub fn new(size: BlockPos, bits: u32) -> Result<Self> {
        Self::with_layout(size, bits, PackedLayout::Aligned)
    }

    pub fn with_layout(size: BlockPos, bits: u32, layout: PackedLayout) -> Result<Self> {
        let size = size.abs();
        let bits = bits.max(MIN_BITS);
        let storage = PackedIntArray::new(layout, bits, size.volume())?;
        Ok(Self::assemble(size, Palette::new(bits), storage))
    }

    /// Adopts decoded storage and its palette mapping.
    pub fn with_storage(
        size: BlockPos,
        storage: PackedIntArray,
        mapping: Vec<BlockState>,
    ) -> Result<Self> {
        let size = size.abs();
        let mut palette = Palette::empty(storage.bits_per_entry());
        palette.set_mapping(mapping)?;
        Ok(Self::assemble(size, palette, storage))
    }

    fn assemble(size: BlockPos, palette: Palette, storage: PackedIntArray) -> Self {
        ArrayBlockContainer {
            size,
            size_layer: size.x as u64 * size.z as u64,
            volume: size.volume(),
            palette,
            storage,
            block_counts: OnceCell::new(),
            check_for_freed_ids: true,
        }
    }

    /// A full palette reuses ids that no cell references any more before it
    /// grows. Passing `false` makes it always grow instead.
    pub fn set_check_for_freed_ids(&mut self, check: bool) {
        self.check_for_freed_ids = check;
    }

    pub fn size(&self) -> BlockPos {
        self.size
    }

    pub fn total_volume(&self) -> u64 {
        self.volume
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn storage(&self) -> &PackedIntArray {
        &self.storage
    }

    fn index(&self, x: i32, y: i32, z: i32) -> Option<u64> {
        if x < 0 || y < 0 || z < 0 || x >= self.size.x || y >= self.size.y || z >= self.size.z {
            return None;
        }
        Some(y as u64 * self.size_layer + z as u64 * self.size.x as u64 + x as u64)
    }

    /// Air for positions outside the container.
    pub fn get_block_state(&self, x: i32, y: i32, z: i32) -> &BlockState {
        self.index(x, y, z)
            .and_then(|index| self.palette.get(self.storage.get(index)))
            .unwrap_or(&AIR)
    }

    /// Ignores positions outside the container.
    pub fn set_block_state(&mut self, x: i32, y: i32, z: i32, state: &BlockState) -> Result<()> {
        let Some(index) = self.index(x, y, z) else {
            return Ok(());
        };
        let mut resizer = StorageResizer {
            storage: &mut self.storage,
            check_for_freed_ids: self.check_for_freed_ids,
        };
        let id = self.palette.id_for(state, &mut resizer)?;
        self.storage.set(index, id);
        self.block_counts.take();
        Ok(())
    }

    /// Raw palette id of a cell, `None` outside the container.
    pub fn get_id(&self, x: i32, y: i32, z: i32) -> Option<u32> {
        self.index(x, y, z).map(|index| self.storage.get(index))
    }

    /// Per-id counts, computed once until the next write.
    pub fn block_counts(&self) -> &[u64] {
        self.block_counts.get_or_init(|| self.storage.value_counts())
    }

    /// Seeds the count cache with counts a decoder already gathered.
    pub fn set_block_counts(&mut self, counts: Vec<u64>) {
        self.block_counts = OnceCell::from(counts);
    }

    /// Cells holding anything other than air.
    pub fn total_block_count(&self) -> u64 {
        let counts = self.block_counts();
        self.palette
            .mapping()
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.is_air())
            .map(|(id, _)| counts.get(id).copied().unwrap_or(0))
            .sum()
    }

    pub fn block_counts_map(&self) -> FxHashMap<BlockState, u64> {
        let counts = self.block_counts();
        let mut map = FxHashMap::default();
        for (id, state) in self.palette.mapping().iter().enumerate() {
            let count = counts.get(id).copied().unwrap_or(0);
            if count > 0 {
                *map.entry(state.clone()).or_insert(0) += count;
            }
        }
        map
    }

    /// Same cells and palette ids, storage re-packed in `layout`.
    pub fn to_layout(&self, layout: PackedLayout) -> Result<Self> {
        if self.storage.layout() == layout {
            return Ok(self.clone());
        }
        let mut out = self.clone();
        out.storage = self.storage.with_layout(layout)?;
        Ok(out)
    }

    /// Like [`to_layout`](Self::to_layout), with the storage narrowed or widened
    /// to exactly the width the palette needs.
    pub fn to_compact_layout(&self, layout: PackedLayout) -> Result<Self> {
        let bits = required_bit_width(self.palette.len());
        let mut out = self.to_layout(layout)?;
        if out.storage.bits_per_entry() != bits {
            out.storage = out.storage.resized(bits)?;
            let mut palette = Palette::empty(bits);
            palette.set_mapping(self.palette.mapping().to_vec())?;
            out.palette = palette;
        }
        Ok(out)
    }
}
