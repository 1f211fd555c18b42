use quartz_nbt::NbtCompound;
use std::collections::BTreeMap;

use crate::block_tick::ScheduledBlockTick;
use crate::container::BlockContainer;
use crate::entity::EntityData;
use crate::math::BlockPos;
use crate::CURRENT_MINECRAFT_DATA_VERSION;

/// One named sub-volume of a schematic.
///
/// Block entity, tick and entity positions are relative to the region's own
/// origin. The region is assembled once with the `with_*` builders and is
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct SchematicRegion {
    position: BlockPos,
    size: BlockPos,
    container: BlockContainer,
    block_entities: BTreeMap<BlockPos, NbtCompound>,
    block_ticks: BTreeMap<BlockPos, ScheduledBlockTick>,
    entities: Vec<EntityData>,
    data_version: i32,
}

/// The owned pieces of a region.
#[derive(Debug, Clone)]
pub struct RegionParts {
    pub position: BlockPos,
    pub size: BlockPos,
    pub container: BlockContainer,
    pub block_entities: BTreeMap<BlockPos, NbtCompound>,
    pub block_ticks: BTreeMap<BlockPos, ScheduledBlockTick>,
    pub entities: Vec<EntityData>,
    pub data_version: i32,
}

impl SchematicRegion {
    /// `size` may be negative on any axis; the container always uses the absolute size.
    pub fn new(position: BlockPos, size: BlockPos, container: BlockContainer) -> Self {
        SchematicRegion {
            position,
            size,
            container,
            block_entities: BTreeMap::new(),
            block_ticks: BTreeMap::new(),
            entities: Vec::new(),
            data_version: CURRENT_MINECRAFT_DATA_VERSION,
        }
    }

    pub fn from_parts(parts: RegionParts) -> Self {
        SchematicRegion {
            position: parts.position,
            size: parts.size,
            container: parts.container,
            block_entities: parts.block_entities,
            block_ticks: parts.block_ticks,
            entities: parts.entities,
            data_version: parts.data_version,
        }
    }

    pub fn with_block_entities(mut self, block_entities: BTreeMap<BlockPos, NbtCompound>) -> Self {
        self.block_entities = block_entities;
        self
    }

    pub fn with_block_ticks(mut self, block_ticks: BTreeMap<BlockPos, ScheduledBlockTick>) -> Self {
        self.block_ticks = block_ticks;
        self
    }

    pub fn with_entities(mut self, entities: Vec<EntityData>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_data_version(mut self, data_version: i32) -> Self {
        self.data_version = data_version;
        self
    }

    pub fn position(&self) -> BlockPos {
        self.position
    }

    pub fn size(&self) -> BlockPos {
        self.size
    }

    pub fn block_container(&self) -> &BlockContainer {
        &self.container
    }

    pub fn block_entities(&self) -> &BTreeMap<BlockPos, NbtCompound> {
        &self.block_entities
    }

    pub fn block_ticks(&self) -> &BTreeMap<BlockPos, ScheduledBlockTick> {
        &self.block_ticks
    }

    pub fn entities(&self) -> &[EntityData] {
        &self.entities
    }

    pub fn data_version(&self) -> i32 {
        self.data_version
    }

    pub fn into_parts(self) -> RegionParts {
        RegionParts {
            position: self.position,
            size: self.size,
            container: self.container,
            block_entities: self.block_entities,
            block_ticks: self.block_ticks,
            entities: self.entities,
            data_version: self.data_version,
        }
    }
}
