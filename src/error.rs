//! Error types for schematic storage and the file codecs.

use thiserror::Error;

/// Result type alias using SchematicError.
pub type Result<T> = std::result::Result<T, SchematicError>;

/// Errors that abort a read, a write or a container operation.
///
/// Problems with a single record (one block, one entity) never surface here;
/// they are counted in a [`ReadReport`] instead.
#[derive(Error, Debug)]
pub enum SchematicError {
    /// A required tag is absent.
    #[error("Missing tag '{0}'")]
    MissingField(String),

    /// A tag is present with the wrong kind.
    #[error("Tag '{field}' is not of type {expected}")]
    MistypedField {
        field: String,
        expected: &'static str,
    },

    /// Size with a zero component, or otherwise unusable dimensions.
    #[error("Invalid schematic size {x} x {y} x {z}")]
    InvalidSize { x: i32, y: i32, z: i32 },

    /// The format holds a fixed number of regions.
    #[error("Expected {expected} region(s), found {found}")]
    WrongRegionCount { expected: usize, found: usize },

    #[error("Schematic has no regions")]
    NoRegions,

    /// Dimensions exceed what the format can encode.
    #[error("Size {x} x {y} x {z} exceeds the maximum of {max_x} x {max_y} x {max_z}")]
    TooLarge {
        x: i32,
        y: i32,
        z: i32,
        max_x: i32,
        max_y: i32,
        max_z: i32,
    },

    /// An array does not have the length its header promises.
    #[error("Array '{what}' has length {found}, expected {expected}")]
    ArrayLengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid block palette: {0}")]
    InvalidPalette(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported version {0}")]
    UnsupportedVersion(i32),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A VarInt ran past the end of the buffer or past 5 bytes.
    #[error("Malformed VarInt at byte offset {offset}")]
    MalformedVarInt { offset: usize },

    /// Bit width outside 1..=31.
    #[error("Invalid bits per entry {0}, expected 1..=31")]
    InvalidBitWidth(u32),

    /// A computed length exceeds the signed 32-bit limit of the tag format.
    #[error("{what} needs {requested} elements, more than the limit of {limit}")]
    CapacityExceeded {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    /// No registered schematic type accepted the data.
    #[error("Unrecognized schematic format")]
    UnrecognizedFormat,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NBT error: {0}")]
    Nbt(#[from] quartz_nbt::io::NbtIoError),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

impl SchematicError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        SchematicError::MissingField(field.into())
    }

    pub(crate) fn mistyped(field: impl Into<String>, expected: &'static str) -> Self {
        SchematicError::MistypedField {
            field: field.into(),
            expected,
        }
    }
}

/// Record-level problems skipped while decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadReport {
    pub skipped_blocks: usize,
    pub skipped_block_entities: usize,
    pub skipped_entities: usize,
    pub skipped_block_ticks: usize,
}

impl ReadReport {
    pub fn is_clean(&self) -> bool {
        self.total_skipped() == 0
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_blocks
            + self.skipped_block_entities
            + self.skipped_entities
            + self.skipped_block_ticks
    }

    pub fn merge(&mut self, other: &ReadReport) {
        self.skipped_blocks += other.skipped_blocks;
        self.skipped_block_entities += other.skipped_block_entities;
        self.skipped_entities += other.skipped_entities;
        self.skipped_block_ticks += other.skipped_block_ticks;
    }
}
