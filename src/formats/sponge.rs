//! Sponge schematic (`.schem`), versions 1 to 3.
//!
//! Versions 1 and 2 keep everything at the root. Version 3 nests the body in a
//! `Schematic` compound and moves the palette, block data and block entities
//! into `Blocks`.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;
use tracing::warn;

use super::common;
use super::varint::{read_varint, varint_size, write_varint};
use crate::block_state::BlockState;
use crate::container::{
    required_bit_width, ArrayBlockContainer, BlockContainer, PackedIntArray, PackedLayout,
};
use crate::entity::EntityData;
use crate::error::{ReadReport, Result, SchematicError};
use crate::math::BlockPos;
use crate::metadata::{MinecraftVersion, SchematicMetadata};
use crate::nbt::{self, TagKind};
use crate::region::SchematicRegion;
use crate::schematic::{self, FormatData, Schematic, SchematicFormat};

pub const FILE_EXTENSION: &str = "schem";
pub const CURRENT_VERSION: i32 = 2;
pub const SAVABLE_VERSIONS: &[i32] = &[1, 2, 3];

/// Name of the single region a Sponge file decodes into.
pub const REGION_NAME: &str = "Schematic";

const SIZE_KEYS: [&str; 3] = ["Width", "Height", "Length"];

/// The tag holding the schematic body and its version.
fn body_and_version(tag: &NbtCompound) -> Result<(&NbtCompound, i32)> {
    if let Some(inner) = nbt::get_compound(tag, "Schematic") {
        return match nbt::required_i32(inner, "Version")? {
            3 => Ok((inner, 3)),
            other => Err(SchematicError::UnsupportedVersion(other)),
        };
    }
    match nbt::required_i32(tag, "Version")? {
        version @ 1..=2 => Ok((tag, version)),
        other => Err(SchematicError::UnsupportedVersion(other)),
    }
}

/// Sponge format version of `tag`, if it is a valid Sponge schematic.
pub fn sponge_version(tag: &NbtCompound) -> Option<i32> {
    let (body, version) = body_and_version(tag).ok()?;
    if !nbt::contains(body, "Version", TagKind::Int) {
        return None;
    }
    let blocks_ok = if version >= 3 {
        nbt::get_compound(body, "Blocks").is_some_and(|blocks| {
            nbt::contains(blocks, "Palette", TagKind::Compound)
                && nbt::contains(blocks, "Data", TagKind::ByteArray)
        })
    } else {
        nbt::contains(body, "Palette", TagKind::Compound)
            && nbt::contains(body, "BlockData", TagKind::ByteArray)
    };
    (blocks_ok && common::read_valid_size(body, SIZE_KEYS).is_ok()).then_some(version)
}

pub fn is_valid_data(tag: &NbtCompound) -> bool {
    sponge_version(tag).is_some()
}

pub fn create_default_container(size: BlockPos) -> Result<BlockContainer> {
    BlockContainer::array(size, 8)
}

fn metadata_from_tag(
    meta_tag: &NbtCompound,
    size: BlockPos,
    version: i32,
    data_version: i32,
) -> SchematicMetadata {
    let mut meta = SchematicMetadata::from_tag(meta_tag);
    meta.schematic_version = version;
    meta.enclosing_size = size;
    meta.total_volume = size.volume() as i64;
    meta.region_count = 1;
    meta.minecraft_version = MinecraftVersion::from_data_version(data_version);

    if meta.time_created <= 0 {
        if let Some(NbtTag::Long(date)) = nbt::tag(meta_tag, "Date") {
            meta.time_created = *date;
        }
    }

    let origin = nbt::get_compound(meta_tag, "WorldEdit")
        .and_then(|we| nbt::get_int_array(we, "Origin"))
        .and_then(nbt::block_pos_from_int_array);
    if origin.is_some() {
        meta.original_origin = origin;
    }
    meta
}

/// Header and counts without decoding the block data.
pub fn read_metadata(tag: &NbtCompound) -> Option<SchematicMetadata> {
    let version = sponge_version(tag)?;
    let (body, _) = body_and_version(tag).ok()?;
    let size = common::read_valid_size(body, SIZE_KEYS).ok()?;
    let data_version = nbt::get_i32_or(body, "DataVersion", -1);
    let empty = NbtCompound::new();
    let meta_tag = nbt::get_compound(body, "Metadata").unwrap_or(&empty);
    let mut meta = metadata_from_tag(meta_tag, size, version, data_version);

    meta.entity_count = nbt::get_list(body, "Entities").map_or(0, |l| l.len() as i32);
    let block_entities = match version {
        1 => nbt::get_list(body, "TileEntities"),
        2 => nbt::get_list(body, "BlockEntities"),
        _ => nbt::get_compound(body, "Blocks").and_then(|b| nbt::get_list(b, "BlockEntities")),
    };
    meta.block_entity_count = block_entities.map_or(0, |l| l.len() as i64);
    Some(meta)
}

pub fn read(tag: &NbtCompound) -> Result<Schematic> {
    let (body, version) = body_and_version(tag)?;
    let size = common::read_valid_size(body, SIZE_KEYS)?;
    let data_version = nbt::get_i32_or(body, "DataVersion", -1);
    let metadata_tag = nbt::get_compound(body, "Metadata")
        .cloned()
        .unwrap_or_default();
    let metadata = metadata_from_tag(&metadata_tag, size, version, data_version);

    let blocks_tag = if version >= 3 {
        nbt::required_compound(body, "Blocks")?
    } else {
        body
    };
    let data_key = if version >= 3 { "Data" } else { "BlockData" };
    let palette = read_palette(nbt::required_compound(blocks_tag, "Palette")?)?;
    let block_data = nbt::get_byte_array(blocks_tag, data_key)
        .ok_or_else(|| SchematicError::missing(data_key))?;
    let container = decode_block_data(size, palette, block_data)?;

    let empty = NbtList::new();
    let (block_entities, skipped_block_entities) = match version {
        1 => read_block_entities(nbt::get_list(body, "TileEntities").unwrap_or(&empty), 1),
        2 => read_block_entities(nbt::get_list(body, "BlockEntities").unwrap_or(&empty), 2),
        _ => read_wrapped_block_entities(
            nbt::get_list(blocks_tag, "BlockEntities").unwrap_or(&empty),
        ),
    };
    let entity_list = nbt::get_list(body, "Entities").unwrap_or(&empty);
    let (entities, skipped_entities) = if version >= 3 {
        read_wrapped_entities(entity_list)
    } else {
        read_entities(entity_list, version)
    };
    common::warn_skipped("block entities", skipped_block_entities, block_entities.len(), None);
    common::warn_skipped("entities", skipped_entities, entities.len(), None);

    let region = SchematicRegion::new(BlockPos::ORIGIN, size, BlockContainer::Array(container))
        .with_block_entities(block_entities)
        .with_entities(entities)
        .with_data_version(data_version);

    let mut schematic = Schematic::new(SchematicFormat::Sponge);
    schematic.regions.insert(REGION_NAME.to_string(), region);
    schematic.metadata = metadata;
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.format_data = FormatData::Sponge { metadata_tag };
    schematic.read_report = ReadReport {
        skipped_block_entities,
        skipped_entities,
        ..ReadReport::default()
    };
    Ok(schematic)
}

/// A `state string -> id` compound. Ids must fall in `0..len`; gaps stay air.
fn read_palette(tag: &NbtCompound) -> Result<Vec<BlockState>> {
    let len = tag.inner().len();
    let mut mapping = vec![BlockState::air(); len];
    for (key, value) in tag.inner() {
        let id = nbt::as_i64(value).ok_or_else(|| {
            SchematicError::InvalidPalette(format!("Palette id for '{key}' is not a number"))
        })?;
        if id < 0 || id as usize >= len {
            return Err(SchematicError::InvalidPalette(format!(
                "Palette id {id} for '{key}' is outside 0..{len}"
            )));
        }
        mapping[id as usize] = BlockState::parse(key)?;
    }
    Ok(mapping)
}

fn decode_block_data(
    size: BlockPos,
    mapping: Vec<BlockState>,
    data: &[i8],
) -> Result<ArrayBlockContainer> {
    let volume = common::checked_volume(size, "Sponge block storage")?;
    let bits = required_bit_width(mapping.len());
    let mut storage = PackedIntArray::new(PackedLayout::Aligned, bits, volume as u64)?;
    let mut counts = vec![0u64; mapping.len()];
    let mut offset = 0;

    for index in 0..volume {
        let id = read_varint(data, &mut offset)?;
        let Some(count) = counts.get_mut(id as usize) else {
            return Err(SchematicError::InvalidData(format!(
                "Block id {id} at index {index} is outside the palette of {} entries",
                mapping.len()
            )));
        };
        *count += 1;
        storage.set(index as u64, id);
    }

    let mut container = ArrayBlockContainer::with_storage(size, storage, mapping)?;
    container.set_block_counts(counts);
    Ok(container)
}

fn read_block_entities(list: &NbtList, version: i32) -> (BTreeMap<BlockPos, NbtCompound>, usize) {
    let mut map = BTreeMap::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(compound) = tag else {
            errors += 1;
            continue;
        };
        let Some(pos) = nbt::get_int_array(compound, "Pos").and_then(nbt::block_pos_from_int_array)
        else {
            errors += 1;
            continue;
        };
        let mut data = compound.clone();
        if let Some(id) = nbt::remove(&mut data, "Id") {
            data.insert("id", id);
        }
        nbt::remove(&mut data, "Pos");
        if version == 1 {
            nbt::remove(&mut data, "ContentVersion");
        }
        map.insert(pos, data);
    }
    (map, errors)
}

fn read_wrapped_block_entities(list: &NbtList) -> (BTreeMap<BlockPos, NbtCompound>, usize) {
    let mut map = BTreeMap::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(wrapper) = tag else {
            errors += 1;
            continue;
        };
        let pos = nbt::get_int_array(wrapper, "Pos").and_then(nbt::block_pos_from_int_array);
        match (pos, nbt::get_compound(wrapper, "Data")) {
            (Some(pos), Some(data)) => {
                map.insert(pos, data.clone());
            }
            _ => errors += 1,
        }
    }
    (map, errors)
}

fn read_entities(list: &NbtList, version: i32) -> (Vec<EntityData>, usize) {
    let mut entities = Vec::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(compound) = tag else {
            errors += 1;
            continue;
        };
        let Some(pos) = nbt::get_list(compound, "Pos").and_then(nbt::vec3d_from_list) else {
            errors += 1;
            continue;
        };
        let mut data = compound.clone();
        if let Some(id) = nbt::remove(&mut data, "Id") {
            data.insert("id", id);
        }
        if version == 1 {
            nbt::remove(&mut data, "ContentVersion");
        }
        entities.push(EntityData::new(pos, data));
    }
    (entities, errors)
}

fn read_wrapped_entities(list: &NbtList) -> (Vec<EntityData>, usize) {
    let mut entities = Vec::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(wrapper) = tag else {
            errors += 1;
            continue;
        };
        let pos = nbt::get_list(wrapper, "Pos").and_then(nbt::vec3d_from_list);
        match (pos, nbt::get_compound(wrapper, "Data")) {
            (Some(pos), Some(data)) => entities.push(EntityData::new(pos, data.clone())),
            _ => errors += 1,
        }
    }
    (entities, errors)
}

pub fn write(schematic: &Schematic) -> Result<NbtCompound> {
    let (_, region) = schematic.single_region()?.ok_or(SchematicError::NoRegions)?;
    let version = match schematic.metadata.schematic_version {
        v if SAVABLE_VERSIONS.contains(&v) => v,
        v if v < 0 => CURRENT_VERSION,
        v => return Err(SchematicError::UnsupportedVersion(v)),
    };

    let original_meta = match &schematic.format_data {
        FormatData::Sponge { metadata_tag } => metadata_tag.clone(),
        _ => NbtCompound::new(),
    };
    let meta_tag = metadata_to_tag(&original_meta, &schematic.metadata);

    let dims = common::short_size(region.size().abs())?;
    let container = region.block_container().to_array(PackedLayout::Aligned)?;
    let palette = palette_to_tag(container.palette().mapping());
    let block_data = encode_block_data(&container)?;

    let mut body = NbtCompound::new();
    body.insert("Metadata", NbtTag::Compound(meta_tag));
    body.insert("Width", NbtTag::Short(dims[0]));
    body.insert("Height", NbtTag::Short(dims[1]));
    body.insert("Length", NbtTag::Short(dims[2]));
    body.insert("Version", NbtTag::Int(version));
    body.insert("DataVersion", NbtTag::Int(schematic.data_version));

    if version >= 3 {
        let mut blocks = NbtCompound::new();
        blocks.insert("Palette", NbtTag::Compound(palette));
        blocks.insert("Data", NbtTag::ByteArray(block_data));
        blocks.insert(
            "BlockEntities",
            NbtTag::List(wrapped_block_entities(region.block_entities())),
        );
        body.insert("Blocks", NbtTag::Compound(blocks));
        body.insert("Entities", NbtTag::List(wrapped_entities(region.entities())));

        let mut root = NbtCompound::new();
        root.insert("Schematic", NbtTag::Compound(body));
        return Ok(root);
    }

    body.insert(
        "PaletteMax",
        NbtTag::Int(container.palette().len() as i32 - 1),
    );
    body.insert("Palette", NbtTag::Compound(palette));
    body.insert("BlockData", NbtTag::ByteArray(block_data));
    let list_name = if version == 1 { "TileEntities" } else { "BlockEntities" };
    body.insert(
        list_name,
        NbtTag::List(block_entities_to_list(region.block_entities(), version)),
    );
    body.insert(
        "Entities",
        NbtTag::List(entities_to_list(region.entities(), version)),
    );
    Ok(body)
}

/// The preserved Metadata tag with the current metadata merged over it.
fn metadata_to_tag(original: &NbtCompound, meta: &SchematicMetadata) -> NbtCompound {
    let mut tag = original.clone();
    meta.write_into(&mut tag);
    if meta.time_created > 0 && !matches!(nbt::tag(original, "Date"), Some(NbtTag::Long(_))) {
        tag.insert("Date", NbtTag::Long(meta.time_created));
    }
    tag
}

pub fn palette_to_tag(mapping: &[BlockState]) -> NbtCompound {
    let mut tag = NbtCompound::new();
    for (id, state) in mapping.iter().enumerate() {
        tag.insert(state.to_string(), NbtTag::Int(id as i32));
    }
    tag
}

fn encode_block_data(container: &ArrayBlockContainer) -> Result<Vec<i8>> {
    let storage = container.storage();
    let volume = storage.size();
    let max_id = container.palette().len().saturating_sub(1) as u32;
    let worst_case = varint_size(max_id) as u64 * volume;
    if worst_case > i32::MAX as u64 {
        return Err(SchematicError::CapacityExceeded {
            what: "Sponge block data",
            requested: worst_case,
            limit: i32::MAX as u64,
        });
    }

    let mut out = Vec::with_capacity(worst_case as usize);
    for index in 0..volume {
        write_varint(&mut out, storage.get(index));
    }
    Ok(out)
}

fn block_entities_to_list(block_entities: &BTreeMap<BlockPos, NbtCompound>, version: i32) -> NbtList {
    let mut list = NbtList::new();
    for (pos, data) in block_entities {
        let mut tag = data.clone();
        tag.insert("Pos", nbt::block_pos_to_int_array(*pos));
        if let Some(id) = nbt::remove(&mut tag, "id") {
            tag.insert("Id", id);
        }
        if version == 1 {
            tag.insert("ContentVersion", NbtTag::Int(1));
        }
        list.push(NbtTag::Compound(tag));
    }
    list
}

fn wrapped_block_entities(block_entities: &BTreeMap<BlockPos, NbtCompound>) -> NbtList {
    let mut list = NbtList::new();
    for (pos, data) in block_entities {
        let mut wrapper = NbtCompound::new();
        wrapper.insert("Data", NbtTag::Compound(data.clone()));
        wrapper.insert("Id", NbtTag::String(nbt::get_string_or(data, "id", "")));
        wrapper.insert("Pos", nbt::block_pos_to_int_array(*pos));
        list.push(NbtTag::Compound(wrapper));
    }
    list
}

fn entities_to_list(entities: &[EntityData], version: i32) -> NbtList {
    let mut list = NbtList::new();
    for entity in entities {
        let mut tag = entity.to_tag_with_pos();
        if let Some(id) = nbt::remove(&mut tag, "id") {
            tag.insert("Id", id);
        }
        if version == 1 {
            tag.insert("ContentVersion", NbtTag::Int(1));
        }
        list.push(NbtTag::Compound(tag));
    }
    list
}

fn wrapped_entities(entities: &[EntityData]) -> NbtList {
    let mut list = NbtList::new();
    for entity in entities {
        let mut wrapper = NbtCompound::new();
        wrapper.insert("Data", NbtTag::Compound(entity.data.clone()));
        wrapper.insert(
            "Id",
            NbtTag::String(entity.id().unwrap_or_default().to_string()),
        );
        wrapper.insert("Pos", NbtTag::List(nbt::vec3d_to_list(entity.position)));
        list.push(NbtTag::Compound(wrapper));
    }
    list
}

/// Wraps a single region, Sponge version 2.
pub fn from_regions(regions: BTreeMap<String, SchematicRegion>) -> Result<Schematic> {
    let (_, region) = schematic::single_region(&regions)?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    let data_version = region.data_version();

    let mut schematic = Schematic::new(SchematicFormat::Sponge);
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.regions = regions;
    schematic.update_metadata_from_regions();
    schematic.metadata.schematic_version = CURRENT_VERSION;
    schematic.metadata.minecraft_version = MinecraftVersion::from_data_version(data_version);
    Ok(schematic)
}

pub fn from_bytes(data: &[u8]) -> Result<Schematic> {
    let (root, _) = crate::io::read_nbt_bytes(data)?;
    if !is_valid_data(&root) {
        warn!("Data is not a Sponge schematic");
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

    fn sample_region() -> SchematicRegion {
        let size = BlockPos::new(3, 2, 2);
        let mut container = create_default_container(size).unwrap();
        container
            .set_block_state(0, 0, 0, &BlockState::new("minecraft:stone"))
            .unwrap();
        container
            .set_block_state(
                2,
                1,
                1,
                &BlockState::new("minecraft:oak_log").with_property("axis", "y"),
            )
            .unwrap();

        let mut chest = NbtCompound::new();
        chest.insert("id", NbtTag::String("minecraft:chest".into()));
        let mut block_entities = BTreeMap::new();
        block_entities.insert(BlockPos::new(1, 0, 1), chest);

        let mut cow = NbtCompound::new();
        cow.insert("id", NbtTag::String("minecraft:cow".into()));
        let entities = vec![EntityData::new(Vec3d::new(1.5, 0.0, 0.5), cow)];

        SchematicRegion::new(BlockPos::ORIGIN, size, container)
            .with_block_entities(block_entities)
            .with_entities(entities)
            .with_data_version(1343)
    }

    fn round_trip(version: i32) -> Schematic {
        let mut regions = BTreeMap::new();
        regions.insert("Main".to_string(), sample_region());
        let mut schematic = from_regions(regions).unwrap();
        schematic.metadata_mut().schematic_version = version;
        let tag = schematic.write().unwrap();
        assert_eq!(sponge_version(&tag), Some(version), "written v{version} not recognized");
        read(&tag).unwrap()
    }

    #[test]
    fn test_all_versions_round_trip() {
        for version in [1, 2, 3] {
            let read = round_trip(version);
            let region = read.region(REGION_NAME).expect("region named Schematic");
            let blocks = region.block_container();
            assert_eq!(blocks.get_block_state(0, 0, 0).get_name(), "minecraft:stone");
            assert_eq!(
                blocks.get_block_state(2, 1, 1).get_property("axis").map(|v| v.as_str()),
                Some("y"),
                "v{version} lost block properties"
            );
            assert_eq!(blocks.total_block_count(), 2);

            let chest = &region.block_entities()[&BlockPos::new(1, 0, 1)];
            assert_eq!(nbt::get_str(chest, "id"), Some("minecraft:chest"));
            assert!(!chest.contains_key("Id"));
            assert!(!chest.contains_key("ContentVersion"));

            assert_eq!(region.entities().len(), 1);
            assert_eq!(region.entities()[0].id(), Some("minecraft:cow"));
            assert_eq!(region.entities()[0].position, Vec3d::new(1.5, 0.0, 0.5));
            assert_eq!(read.metadata().schematic_version, version);
            assert_eq!(read.data_version(), 1343);
            assert!(read.read_report().is_clean());
        }
    }

    #[test]
    fn test_v3_entities_are_wrapped() {
        let mut regions = BTreeMap::new();
        regions.insert("Main".to_string(), sample_region());
        let mut schematic = from_regions(regions).unwrap();
        schematic.metadata_mut().schematic_version = 3;
        let tag = schematic.write().unwrap();

        let body = nbt::get_compound(&tag, "Schematic").unwrap();
        let entities = nbt::get_list(body, "Entities").unwrap();
        let wrapper = nbt::compounds(entities).next().unwrap();
        assert_eq!(nbt::get_str(wrapper, "Id"), Some("minecraft:cow"));
        assert!(nbt::get_compound(wrapper, "Data").is_some());
        assert!(nbt::get_list(wrapper, "Pos").is_some());
    }

    #[test]
    fn test_v1_uses_tile_entities_and_content_version() {
        let mut regions = BTreeMap::new();
        regions.insert("Main".to_string(), sample_region());
        let mut schematic = from_regions(regions).unwrap();
        schematic.metadata_mut().schematic_version = 1;
        let tag = schematic.write().unwrap();

        assert!(!tag.contains_key("BlockEntities"));
        let list = nbt::get_list(&tag, "TileEntities").unwrap();
        let chest = nbt::compounds(list).next().unwrap();
        assert_eq!(nbt::get_i32(chest, "ContentVersion"), Some(1));
        assert_eq!(nbt::get_str(chest, "Id"), Some("minecraft:chest"));
        assert_eq!(nbt::get_i32(&tag, "PaletteMax"), Some(2));
    }

    #[test]
    fn test_palette_id_out_of_range_fails() {
        let mut palette = NbtCompound::new();
        palette.insert("minecraft:air", NbtTag::Int(0));
        palette.insert("minecraft:stone", NbtTag::Int(5));
        assert!(matches!(
            read_palette(&palette),
            Err(SchematicError::InvalidPalette(_))
        ));
    }

    #[test]
    fn test_truncated_block_data_fails() {
        let mut regions = BTreeMap::new();
        regions.insert("Main".to_string(), sample_region());
        let mut tag = from_regions(regions).unwrap().write().unwrap();
        tag.insert("BlockData", NbtTag::ByteArray(vec![0, 1, 0]));
        assert!(matches!(
            read(&tag),
            Err(SchematicError::MalformedVarInt { .. })
        ));
    }

    #[test]
    fn test_metadata_date_and_origin() {
        let mut world_edit = NbtCompound::new();
        world_edit.insert("Origin", NbtTag::IntArray(vec![10, 64, -3]));
        let mut meta_tag = NbtCompound::new();
        meta_tag.insert("Date", NbtTag::Long(1_600_000_000_000));
        meta_tag.insert("WorldEdit", NbtTag::Compound(world_edit));

        let meta = metadata_from_tag(&meta_tag, BlockPos::new(2, 2, 2), 2, 1343);
        assert_eq!(meta.time_created, 1_600_000_000_000);
        assert_eq!(meta.original_origin, Some(BlockPos::new(10, 64, -3)));
        assert_eq!(meta.total_volume, 8);
    }

    #[test]
    fn test_original_metadata_survives_rewrite() {
        let mut regions = BTreeMap::new();
        regions.insert("Main".to_string(), sample_region());
        let mut tag = from_regions(regions).unwrap().write().unwrap();
        let mut meta_tag = nbt::get_compound(&tag, "Metadata").unwrap().clone();
        meta_tag.insert("CustomKey", NbtTag::String("kept".into()));
        tag.insert("Metadata", NbtTag::Compound(meta_tag));

        let again = read(&tag).unwrap().write().unwrap();
        let meta = nbt::get_compound(&again, "Metadata").unwrap();
        assert_eq!(nbt::get_str(meta, "CustomKey"), Some("kept"));
    }

    #[test]
    fn test_multiple_regions_rejected() {
        let mut regions = BTreeMap::new();
        regions.insert("a".to_string(), sample_region());
        regions.insert("b".to_string(), sample_region());
        assert!(matches!(
            from_regions(regions),
            Err(SchematicError::WrongRegionCount { found: 2, .. })
        ));
    }
}
