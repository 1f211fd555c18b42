//! Litematica's own multi-region format (`.litematic`).
//!
//! The writer always emits version 4. The reader accepts every version back to
//! 0, adapting to how block entities, entities and scheduled ticks were laid
//! out at the time.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;
use tracing::warn;

use super::common;
use crate::block_state::BlockState;
use crate::block_tick::ScheduledBlockTick;
use crate::container::{
    required_bit_width, ArrayBlockContainer, BlockContainer, PackedIntArray, PackedLayout,
};
use crate::entity::EntityData;
use crate::error::{ReadReport, Result, SchematicError};
use crate::math::BlockPos;
use crate::metadata::{MinecraftVersion, SchematicMetadata};
use crate::nbt::{self, TagKind};
use crate::region::{RegionParts, SchematicRegion};
use crate::schematic::{self, Schematic, SchematicFormat};
use crate::CURRENT_MINECRAFT_DATA_VERSION;

pub const FILE_EXTENSION: &str = "litematic";
pub const CURRENT_VERSION: i32 = 4;

pub fn is_valid_data(tag: &NbtCompound) -> bool {
    nbt::contains(tag, "Metadata", TagKind::Compound)
        && nbt::contains(tag, "Regions", TagKind::Compound)
        && nbt::contains(tag, "Version", TagKind::Int)
}

/// An all-air tight container with 2 bits per entry.
pub fn create_default_container(size: BlockPos) -> Result<BlockContainer> {
    BlockContainer::tight_array(size, 2)
}

/// Reads the `Metadata` compound and fills in what older files left out from
/// the rest of the tag, without decoding any block data.
pub fn read_metadata(tag: &NbtCompound) -> Option<SchematicMetadata> {
    if !is_valid_data(tag) {
        return None;
    }
    let mut meta = SchematicMetadata::from_tag(nbt::get_compound(tag, "Metadata")?);
    let regions = nbt::get_compound(tag, "Regions")?;

    if meta.minecraft_version.is_unknown() {
        meta.minecraft_version =
            MinecraftVersion::from_data_version(nbt::get_i32_or(tag, "MinecraftDataVersion", -1));
    }
    if meta.schematic_version <= 0 {
        meta.schematic_version = nbt::get_i32_or(tag, "Version", -1);
    }
    if meta.region_count <= 0 {
        meta.region_count = regions.inner().len() as i32;
    }
    if meta.entity_count < 0 || meta.block_entity_count < 0 {
        let mut entities = 0;
        let mut block_entities = 0;
        for (_, region) in regions.inner() {
            if let NbtTag::Compound(region) = region {
                entities += nbt::get_list(region, "Entities").map_or(0, NbtList::len);
                block_entities += nbt::get_list(region, "TileEntities").map_or(0, NbtList::len);
            }
        }
        meta.entity_count = entities as i32;
        meta.block_entity_count = block_entities as i64;
    }
    Some(meta)
}

pub fn read(tag: &NbtCompound) -> Result<Schematic> {
    let version = match nbt::tag(tag, "Version") {
        Some(NbtTag::Int(v)) => *v,
        Some(_) => return Err(SchematicError::mistyped("Version", "int")),
        None => return Err(SchematicError::missing("Version")),
    };
    let data_version = nbt::get_i32_or(tag, "MinecraftDataVersion", -1);

    if version == 0 || version > CURRENT_VERSION {
        warn!("Unknown litematic version {version}, newest supported is {CURRENT_VERSION}");
    }
    if data_version > CURRENT_MINECRAFT_DATA_VERSION {
        warn!(
            "Schematic data version {data_version} is newer than the supported {CURRENT_MINECRAFT_DATA_VERSION}"
        );
    }

    let regions_tag = nbt::required_compound(tag, "Regions")?;
    let mut report = ReadReport::default();
    let mut regions = BTreeMap::new();
    for (name, region_tag) in regions_tag.inner() {
        let NbtTag::Compound(region_tag) = region_tag else {
            return Err(SchematicError::mistyped(format!("Regions.{name}"), "compound"));
        };
        let region = read_region(name, region_tag, version, data_version, &mut report)?;
        regions.insert(name.clone(), region);
    }

    let metadata = read_metadata(tag).ok_or_else(|| SchematicError::missing("Metadata"))?;
    let mut schematic = Schematic::new(SchematicFormat::Litematic);
    schematic.enclosing_size = metadata.enclosing_size;
    schematic.metadata = metadata;
    schematic.regions = regions;
    schematic.data_version = data_version;
    schematic.read_report = report;
    Ok(schematic)
}

fn read_region(
    name: &str,
    tag: &NbtCompound,
    version: i32,
    main_data_version: i32,
    report: &mut ReadReport,
) -> Result<SchematicRegion> {
    let position = nbt::read_block_pos_tag(tag, "Position")
        .ok_or_else(|| SchematicError::missing(format!("{name}.Position")))?;
    let region_size = nbt::read_block_pos_tag(tag, "Size")
        .ok_or_else(|| SchematicError::missing(format!("{name}.Size")))?;

    let empty = NbtList::new();
    let block_entity_list = nbt::get_list(tag, "TileEntities").unwrap_or(&empty);
    let entity_list = nbt::get_list(tag, "Entities").unwrap_or(&empty);

    let ((block_entities, be_errors), (entities, entity_errors)) = match version {
        v if v >= 2 => (
            common::read_block_entities(block_entity_list),
            common::read_entities(entity_list),
        ),
        1 => (
            read_wrapped_block_entities(block_entity_list),
            read_wrapped_entities(entity_list),
        ),
        _ => {
            warn!("Region '{name}' uses version 0, its entities and block entities are not read");
            ((BTreeMap::new(), 0), (Vec::new(), 0))
        }
    };
    let (block_ticks, tick_errors) = if version >= 3 {
        read_block_ticks(nbt::get_list(tag, "PendingBlockTicks").unwrap_or(&empty))
    } else {
        (BTreeMap::new(), 0)
    };

    common::warn_skipped("entities", entity_errors, entities.len(), Some(name));
    common::warn_skipped("block entities", be_errors, block_entities.len(), Some(name));
    common::warn_skipped("scheduled ticks", tick_errors, block_ticks.len(), Some(name));
    report.skipped_entities += entity_errors;
    report.skipped_block_entities += be_errors;
    report.skipped_block_ticks += tick_errors;

    let words = match nbt::get_long_array(tag, "BlockStates") {
        Some(words) if !words.is_empty() => words,
        _ => {
            return Err(SchematicError::InvalidData(format!(
                "Region '{name}' has no block state data"
            )))
        }
    };
    let palette = common::read_palette_list(
        nbt::get_list(tag, "BlockStatePalette")
            .ok_or_else(|| SchematicError::missing(format!("{name}.BlockStatePalette")))?,
    )?;
    let container = container_from_words(region_size, palette, words)?;

    Ok(SchematicRegion::from_parts(RegionParts {
        position,
        size: region_size,
        container: BlockContainer::Array(container),
        block_entities,
        block_ticks,
        entities,
        data_version: nbt::get_i32_or(tag, "DataVersion", main_data_version),
    }))
}

/// Adopts a tight long array sized for exactly `palette.len()` entries.
pub fn container_from_words(
    size: BlockPos,
    palette: Vec<BlockState>,
    words: &[i64],
) -> Result<ArrayBlockContainer> {
    let size = size.abs();
    let bits = required_bit_width(palette.len());
    let storage = PackedIntArray::from_words(PackedLayout::Tight, bits, size.volume(), words.to_vec())?;
    ArrayBlockContainer::with_storage(size, storage, palette)
}

/// Version 1 wraps block entity data in `TileNBT`, with the position beside it.
fn read_wrapped_block_entities(list: &NbtList) -> (BTreeMap<BlockPos, NbtCompound>, usize) {
    let mut map = BTreeMap::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(wrapper) = tag else {
            errors += 1;
            continue;
        };
        let data = nbt::get_compound(wrapper, "TileNBT").filter(|data| !data.is_empty());
        match (nbt::read_block_pos(wrapper), data) {
            (Some(pos), Some(data)) => {
                map.insert(pos, data.clone());
            }
            _ => errors += 1,
        }
    }
    (map, errors)
}

/// Version 1 wraps entity data in `EntityData`, with `x`, `y`, `z` doubles beside it.
fn read_wrapped_entities(list: &NbtList) -> (Vec<EntityData>, usize) {
    let mut entities = Vec::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(wrapper) = tag else {
            errors += 1;
            continue;
        };
        let data = nbt::get_compound(wrapper, "EntityData").filter(|data| !data.is_empty());
        match (nbt::read_vec3d_siblings(wrapper), data) {
            (Some(pos), Some(data)) => entities.push(EntityData::new(pos, data.clone())),
            _ => errors += 1,
        }
    }
    (entities, errors)
}

fn read_block_ticks(list: &NbtList) -> (BTreeMap<BlockPos, ScheduledBlockTick>, usize) {
    let mut ticks = BTreeMap::new();
    let mut errors = 0;
    let mut tick_id_counter = 0i64;
    for tag in list.iter() {
        let NbtTag::Compound(tag) = tag else {
            errors += 1;
            continue;
        };
        // version 3 saved Time as a long by accident
        let block = nbt::get_str(tag, "Block");
        let time = nbt::tag(tag, "Time").and_then(nbt::as_i64);
        let pos = nbt::read_block_pos(tag);
        let (Some(block), Some(time), Some(pos)) = (block, time, pos) else {
            errors += 1;
            continue;
        };
        let counter = tick_id_counter;
        tick_id_counter += 1;
        let priority = nbt::get_i32_or(tag, "Priority", 0);
        let tick_id = match nbt::tag(tag, "TickId") {
            Some(NbtTag::Long(id)) => *id,
            _ => counter,
        };
        ticks.insert(
            pos,
            ScheduledBlockTick::new(block, priority, time as i32 as i64, tick_id),
        );
    }
    (ticks, errors)
}

fn block_ticks_to_list(ticks: &BTreeMap<BlockPos, ScheduledBlockTick>) -> NbtList {
    let mut list = NbtList::new();
    for (pos, tick) in ticks {
        let mut tag = NbtCompound::new();
        tag.insert("Block", NbtTag::String(tick.block.to_string()));
        tag.insert("Priority", NbtTag::Int(tick.priority));
        tag.insert("Time", NbtTag::Int(tick.delay as i32));
        tag.insert("TickId", NbtTag::Long(tick.tick_id));
        nbt::put_block_pos(&mut tag, *pos);
        list.push(NbtTag::Compound(tag));
    }
    list
}

fn write_region(region: &SchematicRegion) -> Result<NbtCompound> {
    let container = region.block_container().to_array(PackedLayout::Tight)?;

    let mut tag = NbtCompound::new();
    tag.insert("DataVersion", NbtTag::Int(region.data_version()));
    tag.insert(
        "BlockStatePalette",
        NbtTag::List(common::palette_to_list(container.palette().mapping())),
    );
    tag.insert(
        "BlockStates",
        NbtTag::LongArray(container.storage().words().to_vec()),
    );
    if !region.block_entities().is_empty() {
        tag.insert(
            "TileEntities",
            NbtTag::List(common::block_entities_to_list(region.block_entities())),
        );
    }
    if !region.block_ticks().is_empty() {
        tag.insert(
            "PendingBlockTicks",
            NbtTag::List(block_ticks_to_list(region.block_ticks())),
        );
    }
    if !region.entities().is_empty() {
        tag.insert(
            "Entities",
            NbtTag::List(common::entities_to_list(region.entities())),
        );
    }
    tag.insert(
        "Position",
        NbtTag::Compound(nbt::block_pos_compound(region.position())),
    );
    tag.insert(
        "Size",
        NbtTag::Compound(nbt::block_pos_compound(region.size())),
    );
    Ok(tag)
}

pub fn write(schematic: &Schematic) -> Result<NbtCompound> {
    if schematic.regions.is_empty() {
        return Err(SchematicError::NoRegions);
    }

    let mut regions = NbtCompound::new();
    for (name, region) in &schematic.regions {
        regions.insert(name.clone(), NbtTag::Compound(write_region(region)?));
    }

    // metadata goes before the regions so a partial read can stop early
    let mut root = NbtCompound::new();
    root.insert("Version", NbtTag::Int(CURRENT_VERSION));
    root.insert("MinecraftDataVersion", NbtTag::Int(schematic.data_version));
    root.insert("Metadata", NbtTag::Compound(schematic.metadata.to_tag()));
    root.insert("Regions", NbtTag::Compound(regions));
    Ok(root)
}

pub fn from_regions(regions: BTreeMap<String, SchematicRegion>) -> Result<Schematic> {
    if regions.is_empty() {
        return Err(SchematicError::NoRegions);
    }
    let mut schematic = Schematic::new(SchematicFormat::Litematic);
    schematic.enclosing_size = schematic::enclosing_size_of(&regions);
    schematic.data_version = CURRENT_MINECRAFT_DATA_VERSION;
    schematic.regions = regions;
    schematic.update_metadata_from_regions();
    schematic.metadata.schematic_version = CURRENT_VERSION;
    schematic.metadata.minecraft_version =
        MinecraftVersion::from_data_version(CURRENT_MINECRAFT_DATA_VERSION);
    Ok(schematic)
}

pub fn from_bytes(data: &[u8]) -> Result<Schematic> {
    let (root, _) = crate::io::read_nbt_bytes(data)?;
    if !is_valid_data(&root) {
        return Err(SchematicError::UnrecognizedFormat);
    }
    read(&root)
}

pub fn to_bytes(schematic: &Schematic) -> Result<Vec<u8>> {
    crate::io::write_nbt_bytes(&write(schematic)?, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3d;

    fn stone() -> BlockState {
        BlockState::new("minecraft:stone")
    }

    fn region_at(position: BlockPos, size: BlockPos) -> SchematicRegion {
        let mut container = create_default_container(size).unwrap();
        container.set_block_state(0, 0, 0, &stone()).unwrap();
        SchematicRegion::new(position, size, container)
    }

    /// A version 1 region tag with wrapped records.
    fn v1_region() -> NbtCompound {
        let mut tag = NbtCompound::new();
        tag.insert(
            "Position",
            NbtTag::Compound(nbt::block_pos_compound(BlockPos::ORIGIN)),
        );
        tag.insert(
            "Size",
            NbtTag::Compound(nbt::block_pos_compound(BlockPos::new(2, 1, 1))),
        );
        tag.insert(
            "BlockStatePalette",
            NbtTag::List(common::palette_to_list(&[BlockState::air(), stone()])),
        );
        // cells 0 and 1 -> ids 1 and 0
        tag.insert("BlockStates", NbtTag::LongArray(vec![1]));

        let mut chest = NbtCompound::new();
        chest.insert("id", NbtTag::String("minecraft:chest".into()));
        let mut be_wrapper = nbt::block_pos_compound(BlockPos::new(1, 0, 0));
        be_wrapper.insert("TileNBT", NbtTag::Compound(chest));
        let mut be_list = NbtList::new();
        be_list.push(NbtTag::Compound(be_wrapper));
        tag.insert("TileEntities", NbtTag::List(be_list));

        let mut pig = NbtCompound::new();
        pig.insert("id", NbtTag::String("minecraft:pig".into()));
        let mut entity_wrapper = NbtCompound::new();
        entity_wrapper.insert("x", NbtTag::Double(0.5));
        entity_wrapper.insert("y", NbtTag::Double(0.0));
        entity_wrapper.insert("z", NbtTag::Double(0.5));
        entity_wrapper.insert("EntityData", NbtTag::Compound(pig));
        let mut entity_list = NbtList::new();
        entity_list.push(NbtTag::Compound(entity_wrapper));
        tag.insert("Entities", NbtTag::List(entity_list));
        tag
    }

    fn root_with(version: i32, region: NbtCompound) -> NbtCompound {
        let mut regions = NbtCompound::new();
        regions.insert("main", NbtTag::Compound(region));
        let mut root = NbtCompound::new();
        root.insert("Version", NbtTag::Int(version));
        root.insert("MinecraftDataVersion", NbtTag::Int(1343));
        root.insert("Metadata", NbtTag::Compound(SchematicMetadata::default().to_tag()));
        root.insert("Regions", NbtTag::Compound(regions));
        root
    }

    #[test]
    fn test_version_1_wrappers() {
        let schematic = read(&root_with(1, v1_region())).unwrap();
        let region = schematic.region("main").unwrap();
        assert_eq!(region.block_container().get_block_state(0, 0, 0), &stone());
        assert!(region.block_container().get_block_state(1, 0, 0).is_air());
        assert_eq!(
            nbt::get_str(&region.block_entities()[&BlockPos::new(1, 0, 0)], "id"),
            Some("minecraft:chest")
        );
        assert_eq!(region.entities()[0].position, Vec3d::new(0.5, 0.0, 0.5));
        assert!(schematic.read_report().is_clean());
    }

    #[test]
    fn test_version_0_skips_records() {
        let schematic = read(&root_with(0, v1_region())).unwrap();
        let region = schematic.region("main").unwrap();
        assert!(region.block_entities().is_empty());
        assert!(region.entities().is_empty());
        assert_eq!(region.block_container().get_block_state(0, 0, 0), &stone());
    }

    #[test]
    fn test_ticks_with_long_time_and_default_ids() {
        let mut region = v1_region();
        let mut ticks = NbtList::new();
        for (x, tick_id) in [(0, None), (1, Some(40i64))] {
            let mut tick = nbt::block_pos_compound(BlockPos::new(x, 0, 0));
            tick.insert("Block", NbtTag::String("minecraft:water".into()));
            tick.insert("Time", NbtTag::Long(7));
            if let Some(id) = tick_id {
                tick.insert("TickId", NbtTag::Long(id));
            }
            ticks.push(NbtTag::Compound(tick));
        }
        // no Block
        ticks.push(NbtTag::Compound(nbt::block_pos_compound(BlockPos::ORIGIN)));
        region.insert("PendingBlockTicks", NbtTag::List(ticks));

        let schematic = read(&root_with(3, region)).unwrap();
        let ticks = schematic.region("main").unwrap().block_ticks();
        assert_eq!(ticks.len(), 2);
        let first = &ticks[&BlockPos::ORIGIN];
        assert_eq!(first.delay, 7);
        assert_eq!(first.tick_id, 0);
        assert_eq!(ticks[&BlockPos::new(1, 0, 0)].tick_id, 40);
        assert_eq!(schematic.read_report().skipped_block_ticks, 1);
    }

    #[test]
    fn test_empty_block_states_fail() {
        let mut region = v1_region();
        region.insert("BlockStates", NbtTag::LongArray(Vec::new()));
        assert!(matches!(
            read(&root_with(4, region)),
            Err(SchematicError::InvalidData(_))
        ));
    }

    #[test]
    fn test_missing_size_fails() {
        let mut region = v1_region();
        nbt::remove(&mut region, "Size");
        assert!(matches!(
            read(&root_with(4, region)),
            Err(SchematicError::MissingField(_))
        ));
    }

    #[test]
    fn test_write_without_regions_fails() {
        let schematic = Schematic::new(SchematicFormat::Litematic);
        assert!(matches!(write(&schematic), Err(SchematicError::NoRegions)));
        assert!(from_regions(BTreeMap::new()).is_err());
    }

    #[test]
    fn test_metadata_counts_filled_from_body() {
        let mut root = root_with(4, v1_region());
        let meta = read_metadata(&root).unwrap();
        assert_eq!(meta.region_count, 1);
        assert_eq!(meta.entity_count, 1);
        assert_eq!(meta.block_entity_count, 1);
        assert_eq!(meta.schematic_version, 4);
        assert_eq!(meta.minecraft_version.data_version, 1343);

        nbt::remove(&mut root, "Regions");
        assert!(read_metadata(&root).is_none());
    }

    #[test]
    fn test_multi_region_round_trip() {
        let mut regions = BTreeMap::new();
        regions.insert(
            "first".to_string(),
            region_at(BlockPos::ORIGIN, BlockPos::new(2, 2, 2)),
        );
        regions.insert(
            "second".to_string(),
            region_at(BlockPos::new(4, 0, 0), BlockPos::new(-3, 1, 1)),
        );
        let schematic = from_regions(regions).unwrap();
        assert_eq!(schematic.enclosing_size(), BlockPos::new(5, 2, 2));

        let read = read(&write(&schematic).unwrap()).unwrap();
        assert_eq!(read.regions().len(), 2);
        let second = read.region("second").unwrap();
        assert_eq!(second.size(), BlockPos::new(-3, 1, 1));
        assert_eq!(second.block_container().get_block_state(0, 0, 0), &stone());
        assert_eq!(read.metadata().schematic_version, CURRENT_VERSION);
        assert_eq!(read.metadata().region_count, 2);
    }
}
