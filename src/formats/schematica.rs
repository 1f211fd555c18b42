//! The MCEdit / Schematica legacy block id format (`.schematic`).
//!
//! Cells hold an 8-bit id, an optional 4-bit "add" nibble for ids up to 4095
//! and a 4-bit meta value. Ids are resolved through the file's own
//! `SchematicaMapping` or MCEdit2 `BlockIDs` table when present, and through
//! the process-wide legacy registry otherwise.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::common;
use crate::block_state::BlockState;
use crate::container::{required_bit_width, ArrayBlockContainer, BlockContainer};
use crate::error::{ReadReport, Result, SchematicError};
use crate::legacy::{self, LegacyBlockRegistry};
use crate::math::BlockPos;
use crate::metadata::{MinecraftVersion, SchematicMetadata};
use crate::nbt::{self, TagKind};
use crate::region::SchematicRegion;
use crate::schematic::{self, Schematic, SchematicFormat};

pub const FILE_EXTENSION: &str = "schematic";

/// MCEdit and WorldEdit only accept files whose root tag carries this name.
pub const ROOT_TAG_NAME: &str = "Schematic";

/// Largest id a 12-bit cell can hold.
pub const MAX_BLOCK_ID: u16 = 4095;

/// Meta values per block id, used to size the container up front.
const METAS_PER_BLOCK: usize = 16;

pub fn is_valid_data(tag: &NbtCompound) -> bool {
    ["Width", "Height", "Length"]
        .iter()
        .all(|key| nbt::contains(tag, key, TagKind::Short))
        && nbt::contains(tag, "Blocks", TagKind::ByteArray)
        && nbt::contains(tag, "Data", TagKind::ByteArray)
        && read_size(tag).is_size_valid()
}

fn read_size(tag: &NbtCompound) -> BlockPos {
    let short = |key: &str| match nbt::tag(tag, key) {
        Some(NbtTag::Short(v)) => *v as i32,
        _ => 0,
    };
    BlockPos::new(short("Width"), short("Height"), short("Length"))
}

pub fn create_default_container(size: BlockPos) -> Result<BlockContainer> {
    BlockContainer::array(size, 8)
}

pub fn read_metadata(tag: &NbtCompound) -> Option<SchematicMetadata> {
    if !is_valid_data(tag) {
        return None;
    }
    let size = read_size(tag);
    let mut meta = nbt::get_compound(tag, "Metadata")
        .map(SchematicMetadata::from_tag)
        .unwrap_or_default();
    meta.enclosing_size = size;
    meta.total_volume = size.volume() as i64;
    meta.region_count = 1;
    meta.entity_count = nbt::get_list(tag, "Entities").map_or(0, |l| l.len() as i32);
    meta.block_entity_count = nbt::get_list(tag, "TileEntities").map_or(0, |l| l.len() as i64);
    Some(meta)
}

pub fn read(tag: &NbtCompound) -> Result<Schematic> {
    if !is_valid_data(tag) {
        return Err(SchematicError::InvalidData(
            "Not a legacy block id schematic".into(),
        ));
    }
    let size = read_size(tag);
    let registry = legacy::legacy_registry();
    let mapping = read_id_mapping(tag, registry);

    let mut report = ReadReport::default();
    let container = read_blocks(tag, size, &mapping, registry, &mut report)?;

    let empty = NbtList::new();
    let (block_entities, skipped_block_entities) =
        common::read_block_entities(nbt::get_list(tag, "TileEntities").unwrap_or(&empty));
    let (entities, skipped_entities) =
        common::read_entities(nbt::get_list(tag, "Entities").unwrap_or(&empty));
    common::warn_skipped("block entities", skipped_block_entities, block_entities.len(), None);
    common::warn_skipped("entities", skipped_entities, entities.len(), None);
    report.skipped_block_entities = skipped_block_entities;
    report.skipped_entities = skipped_entities;

    let metadata = read_metadata(tag).unwrap_or_default();
    // older files used DataVersion before the key was renamed
    let data_version = nbt::get_i32(tag, "MinecraftDataVersion")
        .or_else(|| nbt::get_i32(tag, "DataVersion"))
        .unwrap_or(metadata.minecraft_version.data_version);

    let region = SchematicRegion::new(BlockPos::ORIGIN, size, BlockContainer::Array(container))
        .with_block_entities(block_entities)
        .with_entities(entities)
        .with_data_version(data_version);

    let mut schematic = Schematic::new(SchematicFormat::Schematica);
    schematic.regions.insert(metadata.name.clone(), region);
    schematic.metadata = metadata;
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.read_report = report;
    Ok(schematic)
}

/// Legacy id to default block state, from the file's own table when it has one.
fn read_id_mapping(tag: &NbtCompound, registry: &dyn LegacyBlockRegistry) -> FxHashMap<u16, BlockState> {
    if let Some(mapping) = nbt::get_compound(tag, "SchematicaMapping") {
        read_schematica_mapping(mapping, registry)
    } else if let Some(mapping) = nbt::get_compound(tag, "BlockIDs") {
        read_mcedit2_mapping(mapping, registry)
    } else {
        legacy::registry_id_mapping(registry)
    }
}

/// `name -> short id` entries.
fn read_schematica_mapping(
    tag: &NbtCompound,
    registry: &dyn LegacyBlockRegistry,
) -> FxHashMap<u16, BlockState> {
    let mut mapping = FxHashMap::default();
    let mut errors = 0;
    for (name, value) in tag.inner() {
        let NbtTag::Short(id) = value else {
            debug!("Mapping entry '{name}' is not a short");
            errors += 1;
            continue;
        };
        if *id < 0 || *id as u16 > MAX_BLOCK_ID {
            debug!("Mapping id {id} for '{name}' is outside 0..={MAX_BLOCK_ID}");
            errors += 1;
            continue;
        }
        match registry.block_by_name(name) {
            Some(state) => {
                mapping.insert(*id as u16, state);
            }
            None => {
                debug!("Unknown block '{name}' in the id mapping");
                errors += 1;
            }
        }
    }
    if errors > 0 {
        warn!("Skipped {errors} id mapping entries, {} read successfully", mapping.len());
    }
    mapping
}

/// MCEdit2 `numeric string -> name` entries.
fn read_mcedit2_mapping(
    tag: &NbtCompound,
    registry: &dyn LegacyBlockRegistry,
) -> FxHashMap<u16, BlockState> {
    let mut mapping = FxHashMap::default();
    let mut errors = 0;
    for (key, value) in tag.inner() {
        let Ok(id) = key.parse::<u16>() else {
            debug!("Mapping key '{key}' is not a block id");
            errors += 1;
            continue;
        };
        let state = match value {
            NbtTag::String(name) => registry.block_by_name(name),
            _ => None,
        };
        match state {
            Some(state) => {
                mapping.insert(id, state);
            }
            None => {
                debug!("Mapping entry {id} has no known block");
                errors += 1;
            }
        }
    }
    if errors > 0 {
        warn!("Skipped {errors} id mapping entries, {} read successfully", mapping.len());
    }
    mapping
}

/// Combines the low id bytes with the optional add nibbles. Even indices take
/// the high nibble of their add byte, odd indices the low one.
pub fn decode_block_ids(blocks: &[i8], add: Option<&[i8]>) -> Result<Vec<u16>> {
    let Some(add) = add else {
        return Ok(blocks.iter().map(|&b| b as u8 as u16).collect());
    };
    let expected = blocks.len().div_ceil(2);
    if add.len() != expected {
        return Err(SchematicError::ArrayLengthMismatch {
            what: "AddBlocks",
            expected,
            found: add.len(),
        });
    }
    Ok(blocks
        .iter()
        .enumerate()
        .map(|(index, &low)| {
            let nibbles = add[index >> 1] as u8 as u16;
            let high = if index & 1 != 0 {
                (nibbles & 0x0F) << 8
            } else {
                (nibbles & 0xF0) << 4
            };
            low as u8 as u16 | high
        })
        .collect())
}

/// Splits 12-bit ids into low bytes and add nibbles. The add array is `None`
/// when every id fits in 8 bits.
pub fn encode_block_ids(ids: &[u16]) -> (Vec<i8>, Option<Vec<i8>>) {
    let mut blocks = Vec::with_capacity(ids.len());
    let mut add = vec![0u8; ids.len().div_ceil(2)];
    let mut any_add = false;
    for (index, &id) in ids.iter().enumerate() {
        blocks.push((id & 0xFF) as u8 as i8);
        let nibble = if index & 1 != 0 {
            ((id >> 8) & 0x0F) as u8
        } else {
            ((id >> 4) & 0xF0) as u8
        };
        if nibble != 0 {
            add[index >> 1] |= nibble;
            any_add = true;
        }
    }
    let add = any_add.then(|| add.into_iter().map(|b| b as i8).collect());
    (blocks, add)
}

fn read_blocks(
    tag: &NbtCompound,
    size: BlockPos,
    mapping: &FxHashMap<u16, BlockState>,
    registry: &dyn LegacyBlockRegistry,
    report: &mut ReadReport,
) -> Result<ArrayBlockContainer> {
    let volume = common::checked_volume(size, "legacy block array")?;
    let blocks = nbt::get_byte_array(tag, "Blocks").ok_or_else(|| SchematicError::missing("Blocks"))?;
    let meta = nbt::get_byte_array(tag, "Data").ok_or_else(|| SchematicError::missing("Data"))?;
    if blocks.len() != volume {
        return Err(SchematicError::ArrayLengthMismatch {
            what: "Blocks",
            expected: volume,
            found: blocks.len(),
        });
    }
    if meta.len() != volume {
        return Err(SchematicError::ArrayLengthMismatch {
            what: "Data",
            expected: volume,
            found: meta.len(),
        });
    }

    let add = nbt::get_byte_array(tag, "AddBlocks");
    if add.is_none() && nbt::contains(tag, "Add", TagKind::ByteArray) {
        return Err(SchematicError::Unsupported(
            "the old Schematica 'Add' block array".into(),
        ));
    }
    let ids = decode_block_ids(blocks, add)?;

    let bits = required_bit_width(mapping.len() * METAS_PER_BLOCK);
    let mut container = ArrayBlockContainer::new(size, bits)?;
    let mut resolved: FxHashMap<(u16, u8), BlockState> = FxHashMap::default();
    let mut errors = 0;
    let mut index = 0;

    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                let id = ids[index];
                let meta_value = (meta[index] & 0x0F) as u8;
                index += 1;

                let key = (id, meta_value);
                if !resolved.contains_key(&key) {
                    if let Some(block) = mapping.get(&id) {
                        resolved.insert(key, registry.state_from_meta(block, meta_value));
                    }
                }
                let Some(state) = resolved.get(&key) else {
                    errors += 1;
                    continue;
                };
                if !state.is_air() {
                    container.set_block_state(x, y, z, state)?;
                }
            }
        }
    }

    if errors > 0 {
        warn!("Skipped {errors} blocks with unknown ids out of {volume}");
    }
    report.skipped_blocks = errors;
    Ok(container)
}

/// Block name to legacy id for every block in the palette that has one.
fn write_mapping(mapping: &[BlockState], registry: &dyn LegacyBlockRegistry) -> NbtCompound {
    let mut tag = NbtCompound::new();
    for state in mapping {
        if let Some(id) = registry.legacy_id(state).filter(|&id| id <= MAX_BLOCK_ID) {
            tag.insert(state.get_name(), NbtTag::Short(id as i16));
        }
    }
    tag
}

pub fn write(schematic: &Schematic) -> Result<NbtCompound> {
    let (_, region) = schematic.single_region()?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    let dims = common::short_size(size)?;
    let container = region.block_container();
    let registry = legacy::legacy_registry();
    let volume = common::checked_volume(size, "legacy block array")?;

    let mut root = NbtCompound::new();
    root.insert("Materials", NbtTag::String("Alpha".into()));
    root.insert("MinecraftDataVersion", NbtTag::Int(schematic.data_version));
    root.insert("Metadata", NbtTag::Compound(schematic.metadata.to_tag()));
    root.insert("Width", NbtTag::Short(dims[0]));
    root.insert("Height", NbtTag::Short(dims[1]));
    root.insert("Length", NbtTag::Short(dims[2]));
    root.insert(
        "SchematicaMapping",
        NbtTag::Compound(write_mapping(container.palette_mapping(), registry)),
    );
    root.insert(
        "TileEntities",
        NbtTag::List(common::block_entities_to_list(region.block_entities())),
    );
    root.insert(
        "Entities",
        NbtTag::List(common::entities_to_list(region.entities())),
    );

    let mut ids = Vec::with_capacity(volume);
    let mut metas = Vec::with_capacity(volume);
    let mut encoded: FxHashMap<&BlockState, Option<(u16, u8)>> = FxHashMap::default();
    let mut unknown = 0;

    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                let state = container.get_block_state(x, y, z);
                let entry = *encoded.entry(state).or_insert_with(|| {
                    registry
                        .legacy_id(state)
                        .filter(|&id| id <= MAX_BLOCK_ID)
                        .map(|id| (id, registry.meta_from_state(state)))
                });
                let (id, meta) = entry.unwrap_or_else(|| {
                    unknown += 1;
                    (0, 0)
                });
                ids.push(id);
                metas.push(meta as i8);
            }
        }
    }
    if unknown > 0 {
        warn!("{unknown} blocks have no legacy id and were written as air");
    }

    let (blocks, add) = encode_block_ids(&ids);
    root.insert("Blocks", NbtTag::ByteArray(blocks));
    root.insert("Data", NbtTag::ByteArray(metas));
    if let Some(add) = add {
        root.insert("AddBlocks", NbtTag::ByteArray(add));
    }
    Ok(root)
}

pub fn from_regions(regions: BTreeMap<String, SchematicRegion>) -> Result<Schematic> {
    let (_, region) = schematic::single_region(&regions)?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    let data_version = region.data_version();

    let mut schematic = Schematic::new(SchematicFormat::Schematica);
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.regions = regions;
    schematic.update_metadata_from_regions();
    schematic.metadata.minecraft_version = MinecraftVersion::from_data_version(data_version);
    Ok(schematic)
}

pub fn from_bytes(data: &[u8]) -> Result<Schematic> {
    let (root, _) = crate::io::read_nbt_bytes(data)?;
    read(&root)
}

pub fn to_bytes(schematic: &Schematic) -> Result<Vec<u8>> {
    crate::io::write_nbt_bytes(&write(schematic)?, ROOT_TAG_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_root(size: (i16, i16, i16), blocks: Vec<i8>, data: Vec<i8>) -> NbtCompound {
        let mut root = NbtCompound::new();
        root.insert("Width", NbtTag::Short(size.0));
        root.insert("Height", NbtTag::Short(size.1));
        root.insert("Length", NbtTag::Short(size.2));
        root.insert("Blocks", NbtTag::ByteArray(blocks));
        root.insert("Data", NbtTag::ByteArray(data));
        root
    }

    #[test]
    fn test_add_nibbles_decode() {
        let ids = decode_block_ids(&[0x01, 0x02], Some(&[0xF0u8 as i8])).unwrap();
        assert_eq!(ids, vec![0x01 | (0xF0 << 4), 0x02]);

        let ids = decode_block_ids(&[0x01, 0x02], Some(&[0x0Fu8 as i8])).unwrap();
        assert_eq!(ids, vec![0x01, 0x02 | (0x0F << 8)]);
    }

    #[test]
    fn test_add_array_length_is_checked() {
        assert!(matches!(
            decode_block_ids(&[1, 2, 3], Some(&[0])),
            Err(SchematicError::ArrayLengthMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_encode_skips_empty_add_array() {
        let (blocks, add) = encode_block_ids(&[1, 35, 0]);
        assert_eq!(blocks, vec![1, 35, 0]);
        assert!(add.is_none());

        let ids = [0x101, 0x2FF, 0x005];
        let (blocks, add) = encode_block_ids(&ids);
        let add = add.expect("ids above 255 need add nibbles");
        assert_eq!(add.len(), 2);
        assert_eq!(decode_block_ids(&blocks, Some(&add)).unwrap(), ids.to_vec());
    }

    #[test]
    fn test_registry_fallback_and_meta() {
        // stone, red wool, unknown id 253, air
        let root = legacy_root((4, 1, 1), vec![1, 35, 253u8 as i8, 0], vec![0, 14, 0, 0]);
        assert!(is_valid_data(&root));
        let schematic = read(&root).unwrap();
        let region = schematic.single_region().unwrap().unwrap().1;
        let blocks = region.block_container();
        assert_eq!(blocks.get_block_state(0, 0, 0).get_name(), "minecraft:stone");
        assert_eq!(
            blocks.get_block_state(1, 0, 0),
            &BlockState::new("minecraft:wool").with_property("color", "red")
        );
        assert!(blocks.get_block_state(2, 0, 0).is_air());
        assert_eq!(schematic.read_report().skipped_blocks, 1);
    }

    #[test]
    fn test_file_mapping_overrides_registry() {
        let mut root = legacy_root((1, 1, 1), vec![7], vec![0]);
        let mut mapping = NbtCompound::new();
        mapping.insert("minecraft:glass", NbtTag::Short(7));
        mapping.insert("minecraft:stone", NbtTag::Short(5000));
        mapping.insert("minecraft:dirt", NbtTag::Int(3));
        root.insert("SchematicaMapping", NbtTag::Compound(mapping));

        let schematic = read(&root).unwrap();
        let region = schematic.single_region().unwrap().unwrap().1;
        assert_eq!(
            region.block_container().get_block_state(0, 0, 0).get_name(),
            "minecraft:glass"
        );
    }

    #[test]
    fn test_mcedit2_mapping() {
        let mut root = legacy_root((1, 1, 1), vec![9], vec![0]);
        let mut mapping = NbtCompound::new();
        mapping.insert("9", NbtTag::String("minecraft:bookshelf".into()));
        mapping.insert("nine", NbtTag::String("minecraft:dirt".into()));
        root.insert("BlockIDs", NbtTag::Compound(mapping));

        let schematic = read(&root).unwrap();
        let region = schematic.single_region().unwrap().unwrap().1;
        assert_eq!(
            region.block_container().get_block_state(0, 0, 0).get_name(),
            "minecraft:bookshelf"
        );
    }

    #[test]
    fn test_length_mismatch_and_old_add_fail() {
        let root = legacy_root((2, 1, 1), vec![1], vec![0, 0]);
        assert!(matches!(
            read(&root),
            Err(SchematicError::ArrayLengthMismatch { what: "Blocks", .. })
        ));

        let mut root = legacy_root((2, 1, 1), vec![1, 1], vec![0, 0]);
        root.insert("Add", NbtTag::ByteArray(vec![0]));
        assert!(matches!(read(&root), Err(SchematicError::Unsupported(_))));
    }

    #[test]
    fn test_write_round_trip() {
        let size = BlockPos::new(2, 2, 1);
        let mut container = create_default_container(size).unwrap();
        let orange = BlockState::new("minecraft:concrete").with_property("color", "orange");
        container
            .set_block_state(0, 0, 0, &BlockState::new("minecraft:observer"))
            .unwrap();
        container.set_block_state(1, 1, 0, &orange).unwrap();
        container
            .set_block_state(0, 1, 0, &BlockState::new("mymod:widget"))
            .unwrap();
        let mut regions = BTreeMap::new();
        regions.insert("main".to_string(), SchematicRegion::new(BlockPos::ORIGIN, size, container));

        let tag = write(&from_regions(regions).unwrap()).unwrap();
        assert_eq!(nbt::get_str(&tag, "Materials"), Some("Alpha"));
        assert!(!tag.contains_key("AddBlocks"));
        let mapping = nbt::get_compound(&tag, "SchematicaMapping").unwrap();
        assert!(!mapping.contains_key("mymod:widget"));

        let read = read(&tag).unwrap();
        let blocks = read.single_region().unwrap().unwrap().1.block_container();
        assert_eq!(blocks.get_block_state(0, 0, 0).get_name(), "minecraft:observer");
        assert_eq!(blocks.get_block_state(1, 1, 0), &orange);
        assert!(blocks.get_block_state(0, 1, 0).is_air());
    }
}
