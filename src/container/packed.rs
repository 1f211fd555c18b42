//! Fixed-width unsigned integers packed into 64-bit words.

use crate::error::{Result, SchematicError};

/// Largest element count of an array tag.
const MAX_ARRAY_LEN: u64 = i32::MAX as u64;

/// How entries are laid out across words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackedLayout {
    /// `64 / bits` entries per word; the leftover high bits stay unused.
    Aligned,
    /// Entries are contiguous and may straddle two words.
    Tight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedIntArray {
    layout: PackedLayout,
    bits: u32,
    size: u64,
    mask: u64,
    values_per_word: u64,
    words: Vec<i64>,
}

/// Backing word count for `size` entries of `bits` each.
pub fn required_words(layout: PackedLayout, bits: u32, size: u64) -> Result<usize> {
    check_bits(bits)?;
    let len = match layout {
        PackedLayout::Aligned => size.div_ceil(64 / bits as u64),
        PackedLayout::Tight => size
            .checked_mul(bits as u64)
            .map(|total| total.div_ceil(64))
            .unwrap_or(u64::MAX),
    };
    if len > MAX_ARRAY_LEN {
        return Err(SchematicError::CapacityExceeded {
            what: "Packed block array",
            requested: len,
            limit: MAX_ARRAY_LEN,
        });
    }
    Ok(len as usize)
}

fn check_bits(bits: u32) -> Result<()> {
    if (1..=31).contains(&bits) {
        Ok(())
    } else {
        Err(SchematicError::InvalidBitWidth(bits))
    }
}

impl PackedIntArray {
    pub fn new(layout: PackedLayout, bits: u32, size: u64) -> Result<Self> {
        let len = required_words(layout, bits, size)?;
        Ok(Self::build(layout, bits, size, vec![0; len]))
    }

    /// Wraps existing words, which must have exactly the required length.
    pub fn from_words(layout: PackedLayout, bits: u32, size: u64, words: Vec<i64>) -> Result<Self> {
        let len = required_words(layout, bits, size)?;
        if words.len() != len {
            return Err(SchematicError::ArrayLengthMismatch {
                what: "packed block states",
                expected: len,
                found: words.len(),
            });
        }
        Ok(Self::build(layout, bits, size, words))
    }

    fn build(layout: PackedLayout, bits: u32, size: u64, words: Vec<i64>) -> Self {
        PackedIntArray {
            layout,
            bits,
            size,
            mask: (1u64 << bits) - 1,
            values_per_word: 64 / bits as u64,
            words,
        }
    }

    pub fn layout(&self) -> PackedLayout {
        self.layout
    }

    pub fn bits_per_entry(&self) -> u32 {
        self.bits
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn max_value(&self) -> u32 {
        self.mask as u32
    }

    pub fn words(&self) -> &[i64] {
        &self.words
    }

    pub fn into_words(self) -> Vec<i64> {
        self.words
    }

    /// Panics if `index >= size`.
    pub fn get(&self, index: u64) -> u32 {
        assert!(index < self.size, "index {index} out of bounds for {}", self.size);
        match self.layout {
            PackedLayout::Aligned => {
                let word = (index / self.values_per_word) as usize;
                let shift = (index % self.values_per_word) * self.bits as u64;
                ((self.words[word] as u64 >> shift) & self.mask) as u32
            }
            PackedLayout::Tight => {
                let bits = self.bits as u64;
                let start = index * bits;
                let start_word = (start >> 6) as usize;
                let end_word = (((index + 1) * bits - 1) >> 6) as usize;
                let offset = start & 63;
                let low = self.words[start_word] as u64 >> offset;
                if start_word == end_word {
                    (low & self.mask) as u32
                } else {
                    let high = (self.words[end_word] as u64) << (64 - offset);
                    ((low | high) & self.mask) as u32
                }
            }
        }
    }

    /// Stores the low `bits` of `value`. Panics if `index >= size`.
    pub fn set(&mut self, index: u64, value: u32) {
        assert!(index < self.size, "index {index} out of bounds for {}", self.size);
        let value = value as u64 & self.mask;
        match self.layout {
            PackedLayout::Aligned => {
                let word = (index / self.values_per_word) as usize;
                let shift = (index % self.values_per_word) * self.bits as u64;
                let current = self.words[word] as u64;
                self.words[word] = ((current & !(self.mask << shift)) | (value << shift)) as i64;
            }
            PackedLayout::Tight => {
                let bits = self.bits as u64;
                let start = index * bits;
                let start_word = (start >> 6) as usize;
                let end_word = (((index + 1) * bits - 1) >> 6) as usize;
                let offset = start & 63;

                let current = self.words[start_word] as u64;
                self.words[start_word] =
                    ((current & !(self.mask << offset)) | (value << offset)) as i64;

                if start_word != end_word {
                    let written = 64 - offset;
                    let spill = bits - written;
                    let current = self.words[end_word] as u64;
                    self.words[end_word] = (((current >> spill) << spill) | (value >> written)) as i64;
                }
            }
        }
    }

    /// Occurrences of every storable value, indexed by value.
    pub fn value_counts(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.mask as usize + 1];
        for index in 0..self.size {
            counts[self.get(index) as usize] += 1;
        }
        counts
    }

    /// An empty array with the same layout.
    pub fn create_new_array(&self, bits: u32, size: u64) -> Result<Self> {
        Self::new(self.layout, bits, size)
    }

    /// Copies every entry into a fresh array of `bits` width.
    pub fn resized(&self, bits: u32) -> Result<Self> {
        let mut out = self.create_new_array(bits, self.size)?;
        for index in 0..self.size {
            out.set(index, self.get(index));
        }
        Ok(out)
    }

    /// Re-packs the same entries in another layout.
    pub fn with_layout(&self, layout: PackedLayout) -> Result<Self> {
        if layout == self.layout {
            return Ok(self.clone());
        }
        let mut out = Self::new(layout, self.bits, self.size)?;
        for index in 0..self.size {
            out.set(index, self.get(index));
        }
        Ok(out)
    }
}
