//! What a save keeps from the captured regions, and which format it targets.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::block_state::BlockState;
use crate::container::BlockContainer;
use crate::error::{Result, SchematicError};
use crate::formats::{litematic, manager};
use crate::math::BlockPos;
use crate::metadata::now_millis;
use crate::region::{RegionParts, SchematicRegion};
use crate::schematic::Schematic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSettings {
    #[serde(default = "default_true")]
    pub save_blocks: bool,
    #[serde(default = "default_true")]
    pub save_block_entities: bool,
    #[serde(default = "default_true")]
    pub save_scheduled_block_ticks: bool,
    #[serde(default = "default_true")]
    pub save_entities: bool,
    /// Accepted and stored, but every block currently counts as exposed.
    #[serde(default)]
    pub exposed_blocks_only: bool,
    #[serde(default)]
    pub obey_ignored_blocks: bool,
    #[serde(default)]
    pub obey_ignored_block_states: bool,
    #[serde(default)]
    pub obey_ignored_entities: bool,
    /// Block ids, e.g. `minecraft:stone`.
    #[serde(default)]
    pub ignored_blocks: Vec<String>,
    /// Full state strings, e.g. `minecraft:lever[face=wall,facing=north,powered=false]`.
    #[serde(default)]
    pub ignored_block_states: Vec<String>,
    /// Entity ids.
    #[serde(default)]
    pub ignored_entities: Vec<String>,
    /// File extension of the target type.
    #[serde(default = "default_schematic_type")]
    pub schematic_type: String,
}

fn default_true() -> bool {
    true
}

fn default_schematic_type() -> String {
    litematic::FILE_EXTENSION.to_string()
}

impl Default for SaveSettings {
    fn default() -> Self {
        SaveSettings {
            save_blocks: true,
            save_block_entities: true,
            save_scheduled_block_ticks: true,
            save_entities: true,
            exposed_blocks_only: false,
            obey_ignored_blocks: false,
            obey_ignored_block_states: false,
            obey_ignored_entities: false,
            ignored_blocks: Vec::new(),
            ignored_block_states: Vec::new(),
            ignored_entities: Vec::new(),
            schematic_type: default_schematic_type(),
        }
    }
}

/// Ignore lists resolved once per save.
struct BlockFilter {
    blocks: FxHashSet<String>,
    states: FxHashSet<BlockState>,
}

impl BlockFilter {
    fn keeps(&self, state: &BlockState) -> bool {
        !state.is_air()
            && !self.blocks.contains(state.get_name())
            && !self.states.contains(state)
    }
}

impl SaveSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Always true until exposure checks exist.
    pub fn is_exposed(&self, _region: &SchematicRegion, _x: i32, _y: i32, _z: i32) -> bool {
        true
    }

    fn block_filter(&self) -> Result<BlockFilter> {
        let blocks: FxHashSet<String> = if self.obey_ignored_blocks {
            self.ignored_blocks.iter().cloned().collect()
        } else {
            FxHashSet::default()
        };
        let states: FxHashSet<BlockState> = if self.obey_ignored_block_states {
            self.ignored_block_states
                .iter()
                .map(|s| BlockState::parse(s))
                .collect::<Result<_>>()?
        } else {
            FxHashSet::default()
        };
        Ok(BlockFilter { blocks, states })
    }

    fn keeps_entity(&self, id: Option<&str>) -> bool {
        !self.obey_ignored_entities
            || id.map_or(true, |id| !self.ignored_entities.iter().any(|e| e == id))
    }

    /// A copy of `region` holding only what these settings save. Air is never
    /// stored, and block entities and ticks of dropped blocks go with them.
    pub fn filter_region(&self, region: &SchematicRegion) -> Result<SchematicRegion> {
        let filter = self.block_filter()?;
        let source = region.block_container();
        let size = source.size();

        let mut container = match source {
            BlockContainer::Array(array) => BlockContainer::array(size, array.palette().bits())?,
            BlockContainer::Sparse(_) => BlockContainer::sparse(size),
        };
        if self.save_blocks {
            match source {
                BlockContainer::Sparse(sparse) => {
                    for (pos, state) in sparse.iter_blocks() {
                        if filter.keeps(state) && self.is_exposed(region, pos.x, pos.y, pos.z) {
                            container.set_block_state(pos.x, pos.y, pos.z, state)?;
                        }
                    }
                }
                BlockContainer::Array(_) => {
                    for y in 0..size.y {
                        for z in 0..size.z {
                            for x in 0..size.x {
                                let state = source.get_block_state(x, y, z);
                                if filter.keeps(state) && self.is_exposed(region, x, y, z) {
                                    container.set_block_state(x, y, z, state)?;
                                }
                            }
                        }
                    }
                }
            }
        }

        let kept_at = |pos: &BlockPos| {
            self.save_blocks && filter.keeps(source.get_block_state(pos.x, pos.y, pos.z))
        };

        let block_entities = if self.save_block_entities {
            region
                .block_entities()
                .iter()
                .filter(|(pos, _)| kept_at(pos))
                .map(|(pos, data)| (*pos, data.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };
        let block_ticks = if self.save_scheduled_block_ticks {
            region
                .block_ticks()
                .iter()
                .filter(|(pos, _)| kept_at(pos))
                .map(|(pos, tick)| (*pos, tick.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };
        let entities = if self.save_entities {
            region
                .entities()
                .iter()
                .filter(|e| self.keeps_entity(e.id()))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        Ok(SchematicRegion::from_parts(RegionParts {
            position: region.position(),
            size: region.size(),
            container,
            block_entities,
            block_ticks,
            entities,
            data_version: region.data_version(),
        }))
    }

    /// Filters every region and converts them with the configured type.
    pub fn create_schematic(
        &self,
        regions: &BTreeMap<String, SchematicRegion>,
    ) -> Result<Schematic> {
        let schematic_type = manager::type_by_extension(&self.schematic_type).ok_or_else(|| {
            SchematicError::Unsupported(format!("schematic type '{}'", self.schematic_type))
        })?;

        let mut filtered = BTreeMap::new();
        for (name, region) in regions {
            filtered.insert(name.clone(), self.filter_region(region)?);
        }
        let mut schematic = schematic_type.create_schematic_from_regions(filtered)?;
        schematic.update_metadata_from_regions();
        let now = now_millis();
        schematic.metadata.time_created = now;
        schematic.metadata.time_modified = now;
        Ok(schematic)
    }
}
