//! Storage and file codecs for Minecraft schematics.
//!
//! Regions hold their blocks in a palette-backed [`BlockContainer`], either a
//! dense bit-packed array or a sparse map. A [`Schematic`] ties regions and
//! metadata to one of the supported formats:
//!
//! - Litematica (`.litematic`), the only multi-region format
//! - Sponge (`.schem`, versions 1 to 3)
//! - Schematica / MCEdit (`.schematic`)
//! - vanilla structures (`.nbt`)
//! - Structurize blueprints (`.blueprint`)
//! - Indev worlds (`.dat`)
//!
//! [`formats::manager`] sniffs the format of unknown data and
//! [`LoadedSchematic::try_load`] goes straight from file bytes to a schematic.

pub mod block_state;
pub mod block_tick;
pub mod container;
pub mod entity;
pub mod error;
pub mod formats;
pub mod io;
pub mod legacy;
pub mod loaded;
pub mod math;
pub mod metadata;
pub mod nbt;
pub mod region;
pub mod schematic;
pub mod settings;

pub use block_state::BlockState;
pub use block_tick::ScheduledBlockTick;
pub use container::{ArrayBlockContainer, BlockContainer, PackedIntArray, PackedLayout, SparseBlockContainer};
pub use entity::EntityData;
pub use error::{ReadReport, Result, SchematicError};
pub use formats::manager::SchematicType;
pub use loaded::LoadedSchematic;
pub use math::{BlockPos, Vec3d, Vec3i};
pub use metadata::{MinecraftVersion, SchematicMetadata};
pub use region::SchematicRegion;
pub use schematic::{FormatData, Schematic, SchematicFormat};
pub use settings::SaveSettings;

/// World data version the legacy id tables and writers target (1.12.2).
pub const CURRENT_MINECRAFT_DATA_VERSION: i32 = 1343;
