use quartz_nbt::NbtCompound;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;

use crate::block_state::BlockState;
use crate::error::{ReadReport, Result};
use crate::formats;
use crate::math::{self, BlockPos};
use crate::metadata::SchematicMetadata;
use crate::region::SchematicRegion;
use crate::CURRENT_MINECRAFT_DATA_VERSION;

/// The on-disk dialects this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchematicFormat {
    Litematic,
    Sponge,
    Schematica,
    Vanilla,
    Structurize,
    IndevWorld,
}

impl fmt::Display for SchematicFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchematicFormat::Litematic => "Litematica",
            SchematicFormat::Sponge => "Sponge",
            SchematicFormat::Schematica => "Schematica",
            SchematicFormat::Vanilla => "Vanilla Structure",
            SchematicFormat::Structurize => "Structurize",
            SchematicFormat::IndevWorld => "Indev World",
        };
        f.write_str(name)
    }
}

/// Tags a format keeps from the file it was read from so they survive a re-save.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormatData {
    #[default]
    Litematic,
    Sponge {
        metadata_tag: NbtCompound,
    },
    Schematica,
    Vanilla,
    Structurize {
        metadata_tag: NbtCompound,
        optional_data: NbtCompound,
        required_mods: Vec<String>,
    },
    IndevWorld {
        environment: NbtCompound,
        spawn: Option<[i16; 3]>,
        local_player: Option<NbtCompound>,
    },
}

impl FormatData {
    pub fn empty(format: SchematicFormat) -> Self {
        match format {
            SchematicFormat::Litematic => FormatData::Litematic,
            SchematicFormat::Sponge => FormatData::Sponge {
                metadata_tag: NbtCompound::new(),
            },
            SchematicFormat::Schematica => FormatData::Schematica,
            SchematicFormat::Vanilla => FormatData::Vanilla,
            SchematicFormat::Structurize => FormatData::Structurize {
                metadata_tag: NbtCompound::new(),
                optional_data: NbtCompound::new(),
                required_mods: Vec::new(),
            },
            SchematicFormat::IndevWorld => FormatData::IndevWorld {
                environment: NbtCompound::new(),
                spawn: None,
                local_player: None,
            },
        }
    }

    pub fn format(&self) -> SchematicFormat {
        match self {
            FormatData::Litematic => SchematicFormat::Litematic,
            FormatData::Sponge { .. } => SchematicFormat::Sponge,
            FormatData::Schematica => SchematicFormat::Schematica,
            FormatData::Vanilla => SchematicFormat::Vanilla,
            FormatData::Structurize { .. } => SchematicFormat::Structurize,
            FormatData::IndevWorld { .. } => SchematicFormat::IndevWorld,
        }
    }
}

/// Regions plus header, tied to the format they were read as or will be written as.
#[derive(Debug, Clone)]
pub struct Schematic {
    pub(crate) regions: BTreeMap<String, SchematicRegion>,
    pub(crate) metadata: SchematicMetadata,
    pub(crate) enclosing_size: BlockPos,
    pub(crate) data_version: i32,
    pub(crate) format_data: FormatData,
    pub(crate) read_report: ReadReport,
}

impl Schematic {
    pub fn new(format: SchematicFormat) -> Self {
        Schematic {
            regions: BTreeMap::new(),
            metadata: SchematicMetadata::default(),
            enclosing_size: BlockPos::ORIGIN,
            data_version: CURRENT_MINECRAFT_DATA_VERSION,
            format_data: FormatData::empty(format),
            read_report: ReadReport::default(),
        }
    }

    pub fn format(&self) -> SchematicFormat {
        self.format_data.format()
    }

    pub fn format_data(&self) -> &FormatData {
        &self.format_data
    }

    pub fn regions(&self) -> &BTreeMap<String, SchematicRegion> {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&SchematicRegion> {
        self.regions.get(name)
    }

    pub fn metadata(&self) -> &SchematicMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut SchematicMetadata {
        &mut self.metadata
    }

    pub fn enclosing_size(&self) -> BlockPos {
        self.enclosing_size
    }

    /// World data version of the source file or capture.
    pub fn data_version(&self) -> i32 {
        self.data_version
    }

    /// Records skipped while reading. Always clean for schematics built from regions.
    pub fn read_report(&self) -> &ReadReport {
        &self.read_report
    }

    /// Root tag name for the file, empty for formats that don't use one.
    pub fn root_tag_name(&self) -> &'static str {
        match self.format() {
            SchematicFormat::Schematica => formats::schematica::ROOT_TAG_NAME,
            _ => "",
        }
    }

    pub fn write(&self) -> Result<NbtCompound> {
        match self.format() {
            SchematicFormat::Litematic => formats::litematic::write(self),
            SchematicFormat::Sponge => formats::sponge::write(self),
            SchematicFormat::Schematica => formats::schematica::write(self),
            SchematicFormat::Vanilla => formats::vanilla::write(self),
            SchematicFormat::Structurize => formats::structurize::write(self),
            SchematicFormat::IndevWorld => formats::indev::write(self),
        }
    }

    /// Gzip-compressed file bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let root = self.write()?;
        crate::io::write_nbt_bytes(&root, self.root_tag_name())
    }

    /// The only region, `None` without regions, or an error when there are several.
    pub fn single_region(&self) -> Result<Option<(&String, &SchematicRegion)>> {
        single_region(&self.regions)
    }

    /// Non-air block counts summed over all regions.
    pub fn material_counts(&self) -> FxHashMap<BlockState, u64> {
        let mut totals: FxHashMap<BlockState, u64> = FxHashMap::default();
        for region in self.regions.values() {
            for (state, count) in region.block_container().block_counts_map() {
                if !state.is_air() {
                    *totals.entry(state).or_insert(0) += count;
                }
            }
        }
        totals
    }

    pub fn total_block_count(&self) -> u64 {
        self.regions
            .values()
            .map(|r| r.block_container().total_block_count())
            .sum()
    }

    /// Recomputes the metadata's size and count fields from the regions.
    pub fn update_metadata_from_regions(&mut self) {
        let meta = &mut self.metadata;
        meta.enclosing_size = self.enclosing_size;
        meta.region_count = self.regions.len() as i32;
        meta.total_volume = self
            .regions
            .values()
            .map(|r| r.block_container().total_volume() as i64)
            .sum();
        meta.total_blocks = self
            .regions
            .values()
            .map(|r| r.block_container().total_block_count() as i64)
            .sum();
        meta.entity_count = self.regions.values().map(|r| r.entities().len() as i32).sum();
        meta.block_entity_count = self
            .regions
            .values()
            .map(|r| r.block_entities().len() as i64)
            .sum();
        meta.block_tick_count = self
            .regions
            .values()
            .map(|r| r.block_ticks().len() as i64)
            .sum();
    }
}

pub(crate) fn single_region(
    regions: &BTreeMap<String, SchematicRegion>,
) -> Result<Option<(&String, &SchematicRegion)>> {
    match regions.len() {
        0 => Ok(None),
        1 => Ok(regions.iter().next()),
        found => Err(crate::error::SchematicError::WrongRegionCount { expected: 1, found }),
    }
}

pub(crate) fn enclosing_size_of(regions: &BTreeMap<String, SchematicRegion>) -> BlockPos {
    math::enclosing_size(regions.values().map(|r| (r.position(), r.size())))
        .unwrap_or(BlockPos::ORIGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::BlockContainer;

    fn region_with(states: &[(i32, i32, i32, &str)], size: BlockPos) -> SchematicRegion {
        let mut container = BlockContainer::array(size, 2).unwrap();
        for &(x, y, z, name) in states {
            container
                .set_block_state(x, y, z, &BlockState::new(name))
                .unwrap();
        }
        SchematicRegion::new(BlockPos::ORIGIN, size, container)
    }

    #[test]
    fn test_material_counts_span_regions() {
        let mut schematic = Schematic::new(SchematicFormat::Litematic);
        schematic.regions.insert(
            "a".into(),
            region_with(
                &[(0, 0, 0, "minecraft:stone"), (1, 0, 0, "minecraft:dirt")],
                BlockPos::new(2, 1, 1),
            ),
        );
        schematic.regions.insert(
            "b".into(),
            region_with(&[(0, 0, 0, "minecraft:stone")], BlockPos::new(3, 1, 1)),
        );

        let counts = schematic.material_counts();
        assert_eq!(counts.get(&BlockState::new("minecraft:stone")), Some(&2));
        assert_eq!(counts.get(&BlockState::new("minecraft:dirt")), Some(&1));
        assert!(!counts.contains_key(&BlockState::air()));
        assert_eq!(schematic.total_block_count(), 3);

        schematic.update_metadata_from_regions();
        assert_eq!(schematic.metadata().region_count, 2);
        assert_eq!(schematic.metadata().total_volume, 5);
        assert_eq!(schematic.metadata().total_blocks, 3);
    }

    #[test]
    fn test_single_region_rules() {
        let mut schematic = Schematic::new(SchematicFormat::Sponge);
        assert!(schematic.single_region().unwrap().is_none());
        schematic
            .regions
            .insert("a".into(), region_with(&[], BlockPos::new(1, 1, 1)));
        assert!(schematic.single_region().unwrap().is_some());
        schematic
            .regions
            .insert("b".into(), region_with(&[], BlockPos::new(1, 1, 1)));
        assert!(schematic.single_region().is_err());
    }

    #[test]
    fn test_format_data_matches_format() {
        for format in [
            SchematicFormat::Litematic,
            SchematicFormat::Sponge,
            SchematicFormat::Schematica,
            SchematicFormat::Vanilla,
            SchematicFormat::Structurize,
            SchematicFormat::IndevWorld,
        ] {
            assert_eq!(Schematic::new(format).format(), format);
        }
        assert_eq!(
            Schematic::new(SchematicFormat::Schematica).root_tag_name(),
            "Schematic"
        );
    }
}
