//! One module per on-disk schematic format, plus the shared helpers and the
//! type registry that sniffs between them.

pub mod common;
pub mod indev;
pub mod litematic;
pub mod manager;
pub mod schematica;
pub mod sponge;
pub mod structurize;
pub mod vanilla;
pub mod varint;

pub use manager::{SchematicType, TypeRegistry};
