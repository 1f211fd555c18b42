//! Block-state palettes mapping states to small integer ids.

use rustc_hash::FxHashMap;

use crate::block_state::BlockState;
use crate::error::{Result, SchematicError};

/// Narrowest bit width a container is created with.
pub const MIN_BITS: u32 = 2;

/// Palettes up to this width use a linear scan, wider ones a hash index.
pub const MAX_LINEAR_BITS: u32 = 4;

/// Bits needed to address `palette_len` entries, never less than [`MIN_BITS`].
pub fn required_bit_width(palette_len: usize) -> u32 {
    let highest_id = (palette_len.max(1) - 1) as u64;
    (64 - highest_id.leading_zeros()).max(MIN_BITS)
}

/// The storage side of a palette resize.
///
/// The palette only decides when more room is needed; it never owns the
/// storage, so the container hands in a short-lived resizer for each call.
pub trait PaletteResizer {
    /// A non-zero id with no remaining uses in storage, if the owner reuses ids.
    fn free_id(&mut self, palette_len: usize) -> Option<u32>;

    /// Re-packs storage to hold `new_bits` wide ids.
    fn grow(&mut self, new_bits: u32) -> Result<()>;
}

/// Resizing palette bounded by `2^bits` entries.
#[derive(Debug, Clone)]
pub struct Palette {
    bits: u32,
    values: Vec<BlockState>,
    index: Option<FxHashMap<BlockState, u32>>,
}

impl Palette {
    /// A palette holding only air at id 0.
    pub fn new(bits: u32) -> Self {
        let mut palette = Palette::empty(bits);
        palette.push(BlockState::air());
        palette
    }

    pub fn empty(bits: u32) -> Self {
        let bits = bits.max(1);
        Palette {
            bits,
            values: Vec::new(),
            index: (bits > MAX_LINEAR_BITS).then(FxHashMap::default),
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn capacity(&self) -> usize {
        1usize << self.bits
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_linear(&self) -> bool {
        self.index.is_none()
    }

    pub fn get(&self, id: u32) -> Option<&BlockState> {
        self.values.get(id as usize)
    }

    pub fn mapping(&self) -> &[BlockState] {
        &self.values
    }

    pub fn id_of(&self, state: &BlockState) -> Option<u32> {
        match &self.index {
            Some(index) => index.get(state).copied(),
            None => self.values.iter().position(|v| v == state).map(|i| i as u32),
        }
    }

    /// Id for `state`, allocating one if needed.
    ///
    /// A full palette first asks the resizer for an unused id and otherwise
    /// grows by one bit.
    pub fn id_for(&mut self, state: &BlockState, resizer: &mut dyn PaletteResizer) -> Result<u32> {
        if let Some(id) = self.id_of(state) {
            return Ok(id);
        }

        if self.values.len() < self.capacity() {
            return Ok(self.push(state.clone()));
        }

        if let Some(free) = resizer.free_id(self.values.len()) {
            if self.override_mapping(free, state.clone()) {
                return Ok(free);
            }
        }

        let new_bits = self.bits + 1;
        resizer.grow(new_bits)?;
        self.set_bits(new_bits);
        Ok(self.push(state.clone()))
    }

    /// Replaces the whole mapping; ids are list positions.
    pub fn set_mapping(&mut self, list: Vec<BlockState>) -> Result<()> {
        if list.len() > self.capacity() {
            return Err(SchematicError::InvalidPalette(format!(
                "{} entries do not fit in {} bits",
                list.len(),
                self.bits
            )));
        }
        self.values = list;
        self.rebuild_index();
        Ok(())
    }

    /// Points an existing id at another state.
    pub fn override_mapping(&mut self, id: u32, state: BlockState) -> bool {
        let Some(slot) = self.values.get_mut(id as usize) else {
            return false;
        };
        let old = std::mem::replace(slot, state.clone());
        if let Some(index) = &mut self.index {
            if index.get(&old) == Some(&id) {
                index.remove(&old);
            }
            index.insert(state, id);
        }
        true
    }

    fn push(&mut self, state: BlockState) -> u32 {
        let id = self.values.len() as u32;
        if let Some(index) = &mut self.index {
            index.insert(state.clone(), id);
        }
        self.values.push(state);
        id
    }

    fn set_bits(&mut self, bits: u32) {
        self.bits = bits;
        let wants_index = bits > MAX_LINEAR_BITS;
        if wants_index != self.index.is_some() {
            self.rebuild_index();
        }
    }

    fn rebuild_index(&mut self) {
        self.index = if self.bits > MAX_LINEAR_BITS {
            let mut index = FxHashMap::default();
            for (id, state) in self.values.iter().enumerate() {
                index.entry(state.clone()).or_insert(id as u32);
            }
            Some(index)
        } else {
            None
        };
    }
}

/// Append-only palette with no width limit, used by sparse storage and
/// when writing formats that list states once.
#[derive(Debug, Clone, Default)]
pub struct NonResizingPalette {
    values: Vec<BlockState>,
    index: FxHashMap<BlockState, u32>,
}

impl NonResizingPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        NonResizingPalette {
            values: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    pub fn id_for(&mut self, state: &BlockState) -> u32 {
        if let Some(&id) = self.index.get(state) {
            return id;
        }
        let id = self.values.len() as u32;
        self.index.insert(state.clone(), id);
        self.values.push(state.clone());
        id
    }

    pub fn id_of(&self, state: &BlockState) -> Option<u32> {
        self.index.get(state).copied()
    }

    pub fn get(&self, id: u32) -> Option<&BlockState> {
        self.values.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mapping(&self) -> &[BlockState] {
        &self.values
    }

    pub fn set_mapping(&mut self, list: Vec<BlockState>) {
        self.index.clear();
        for (id, state) in list.iter().enumerate() {
            self.index.entry(state.clone()).or_insert(id as u32);
        }
        self.values = list;
    }

    pub fn override_mapping(&mut self, id: u32, state: BlockState) -> bool {
        let Some(slot) = self.values.get_mut(id as usize) else {
            return false;
        };
        let old = std::mem::replace(slot, state.clone());
        if self.index.get(&old) == Some(&id) {
            self.index.remove(&old);
        }
        self.index.insert(state, id);
        true
    }
}
