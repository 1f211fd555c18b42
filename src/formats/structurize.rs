//! Structurize blueprints (`.blueprint`, version 1).
//!
//! Block ids are 16-bit palette indices packed two per int, the first cell in
//! the high half.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;
use tracing::warn;

use super::common;
use crate::block_state::BlockState;
use crate::container::{
    required_bit_width, ArrayBlockContainer, BlockContainer, PackedIntArray, PackedLayout,
};
use crate::error::{ReadReport, Result, SchematicError};
use crate::math::BlockPos;
use crate::metadata::{MinecraftVersion, SchematicMetadata};
use crate::nbt::{self, TagKind};
use crate::region::SchematicRegion;
use crate::schematic::{self, FormatData, Schematic, SchematicFormat};
use crate::CURRENT_MINECRAFT_DATA_VERSION;

pub const FILE_EXTENSION: &str = "blueprint";
pub const CURRENT_VERSION: i32 = 1;
pub const REGION_NAME: &str = "Schematic";

const SIZE_KEYS: [&str; 3] = ["size_x", "size_y", "size_z"];
const ID_MASK: u32 = 0xFFFF;

fn read_size(tag: &NbtCompound) -> BlockPos {
    let short = |key| match nbt::tag(tag, key) {
        Some(NbtTag::Short(v)) => *v as i32,
        _ => 0,
    };
    BlockPos::new(short("size_x"), short("size_y"), short("size_z"))
}

pub fn is_valid_data(tag: &NbtCompound) -> bool {
    SIZE_KEYS.iter().all(|key| nbt::contains(tag, key, TagKind::Short))
        && matches!(nbt::tag(tag, "version"), Some(NbtTag::Byte(1)))
        && nbt::contains_list(tag, "palette", TagKind::Compound)
        && nbt::contains(tag, "blocks", TagKind::IntArray)
        && read_size(tag).is_size_valid()
}

pub fn create_default_container(size: BlockPos) -> Result<BlockContainer> {
    BlockContainer::array(size, 8)
}

fn metadata_from_tag(tag: &NbtCompound, size: BlockPos, data_version: i32) -> SchematicMetadata {
    let mut meta = nbt::get_compound(tag, "Metadata")
        .map(SchematicMetadata::from_tag)
        .unwrap_or_default();
    if let Some(name) = nbt::get_str(tag, "name") {
        meta.name = name.to_string();
    }
    meta.schematic_version = CURRENT_VERSION;
    meta.enclosing_size = size;
    meta.total_volume = size.volume() as i64;
    meta.minecraft_version = MinecraftVersion::from_data_version(data_version);

    let origin = nbt::get_compound(tag, "optional_data")
        .and_then(|o| nbt::get_compound(o, "structurize"))
        .and_then(|s| nbt::read_block_pos_tag(s, "primary_offset"));
    if origin.is_some() {
        meta.original_origin = origin;
    }
    meta
}

pub fn read_metadata(tag: &NbtCompound) -> Option<SchematicMetadata> {
    if !is_valid_data(tag) {
        return None;
    }
    let data_version = nbt::get_i32_or(tag, "mcversion", -1);
    let mut meta = metadata_from_tag(tag, read_size(tag), data_version);
    meta.region_count = 1;
    meta.entity_count = nbt::get_list(tag, "entities").map_or(0, |l| l.len() as i32);
    meta.block_entity_count = nbt::get_list(tag, "tile_entities").map_or(0, |l| l.len() as i64);
    Some(meta)
}

pub fn read(tag: &NbtCompound) -> Result<Schematic> {
    if !is_valid_data(tag) {
        return Err(SchematicError::InvalidData("Not a Structurize blueprint".into()));
    }
    let size = read_size(tag);
    let data_version = nbt::get_i32_or(tag, "mcversion", -1);
    if data_version > CURRENT_MINECRAFT_DATA_VERSION {
        warn!(
            "Blueprint data version {} is newer than the supported {}",
            data_version, CURRENT_MINECRAFT_DATA_VERSION
        );
    }
    let metadata = metadata_from_tag(tag, size, data_version);

    let palette = common::read_palette_list(
        nbt::get_list(tag, "palette").ok_or_else(|| SchematicError::missing("palette"))?,
    )?;
    let blocks = nbt::get_int_array(tag, "blocks").ok_or_else(|| SchematicError::missing("blocks"))?;
    let container = decode_block_data(size, palette, blocks)?;

    let empty = NbtList::new();
    let (block_entities, skipped_block_entities) =
        common::read_block_entities(nbt::get_list(tag, "tile_entities").unwrap_or(&empty));
    let (entities, skipped_entities) =
        common::read_entities(nbt::get_list(tag, "entities").unwrap_or(&empty));
    common::warn_skipped("block entities", skipped_block_entities, block_entities.len(), None);
    common::warn_skipped("entities", skipped_entities, entities.len(), None);

    let region = SchematicRegion::new(BlockPos::ORIGIN, size, BlockContainer::Array(container))
        .with_block_entities(block_entities)
        .with_entities(entities)
        .with_data_version(data_version);

    let mut schematic = Schematic::new(SchematicFormat::Structurize);
    schematic.regions.insert(REGION_NAME.to_string(), region);
    schematic.metadata = metadata;
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.format_data = FormatData::Structurize {
        metadata_tag: nbt::get_compound(tag, "Metadata").cloned().unwrap_or_default(),
        optional_data: nbt::get_compound(tag, "optional_data").cloned().unwrap_or_default(),
        required_mods: nbt::get_list(tag, "required_mods")
            .map(|list| {
                list.iter()
                    .filter_map(|t| match t {
                        NbtTag::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
    };
    schematic.read_report = ReadReport {
        skipped_block_entities,
        skipped_entities,
        ..ReadReport::default()
    };
    Ok(schematic)
}

/// Unpacks the short pairs into aligned storage. The trailing half of an odd
/// volume is padding.
pub fn decode_block_data(
    size: BlockPos,
    mapping: Vec<BlockState>,
    blocks: &[i32],
) -> Result<ArrayBlockContainer> {
    let volume = common::checked_volume(size, "Structurize block storage")?;
    let expected = volume.div_ceil(2);
    if blocks.len() != expected {
        return Err(SchematicError::ArrayLengthMismatch {
            what: "blocks",
            expected,
            found: blocks.len(),
        });
    }

    let bits = required_bit_width(mapping.len());
    let mut storage = PackedIntArray::new(PackedLayout::Aligned, bits, volume as u64)?;
    let mut counts = vec![0u64; mapping.len()];

    for index in 0..volume {
        let pair = blocks[index / 2] as u32;
        let id = if index % 2 == 0 { pair >> 16 } else { pair & ID_MASK };
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

pub fn encode_block_data(container: &ArrayBlockContainer) -> Result<Vec<i32>> {
    let palette_len = container.palette().len();
    if palette_len > ID_MASK as usize + 1 {
        return Err(SchematicError::CapacityExceeded {
            what: "Structurize palette",
            requested: palette_len as u64,
            limit: ID_MASK as u64 + 1,
        });
    }
    let storage = container.storage();
    let volume = storage.size();
    let length = volume.div_ceil(2);
    if length > i32::MAX as u64 {
        return Err(SchematicError::CapacityExceeded {
            what: "Structurize block data",
            requested: length,
            limit: i32::MAX as u64,
        });
    }

    let mut out = Vec::with_capacity(length as usize);
    let mut index = 0;
    while index + 1 < volume {
        out.push(((storage.get(index) << 16) | storage.get(index + 1)) as i32);
        index += 2;
    }
    if volume % 2 == 1 {
        out.push((storage.get(index) << 16) as i32);
    }
    Ok(out)
}

pub fn write(schematic: &Schematic) -> Result<NbtCompound> {
    let (_, region) = schematic.single_region()?.ok_or(SchematicError::NoRegions)?;
    let dims = common::short_size(schematic.enclosing_size)?;
    let container = region.block_container().to_array(PackedLayout::Aligned)?;
    let blocks = encode_block_data(&container)?;

    let (original_meta, optional_data, required_mods) = match &schematic.format_data {
        FormatData::Structurize {
            metadata_tag,
            optional_data,
            required_mods,
        } => (metadata_tag.clone(), optional_data.clone(), required_mods.as_slice()),
        _ => (NbtCompound::new(), NbtCompound::new(), &[][..]),
    };
    let mut metadata = schematic.metadata.clone();
    metadata.schematic_version = CURRENT_VERSION;
    let mut meta_tag = original_meta;
    metadata.write_into(&mut meta_tag);

    let mut root = NbtCompound::new();
    root.insert("version", NbtTag::Byte(CURRENT_VERSION as i8));
    root.insert("mcversion", NbtTag::Int(schematic.data_version));
    root.insert("size_x", NbtTag::Short(dims[0]));
    root.insert("size_y", NbtTag::Short(dims[1]));
    root.insert("size_z", NbtTag::Short(dims[2]));
    root.insert("name", NbtTag::String(metadata.name.clone()));
    root.insert("Metadata", NbtTag::Compound(meta_tag));
    root.insert("optional_data", NbtTag::Compound(optional_data));
    root.insert("required_mods", NbtTag::List(nbt::string_list(required_mods)));
    root.insert(
        "palette",
        NbtTag::List(common::palette_to_list(container.palette().mapping())),
    );
    root.insert("entities", NbtTag::List(common::entities_to_list(region.entities())));
    root.insert(
        "tile_entities",
        NbtTag::List(common::block_entities_to_list(region.block_entities())),
    );
    root.insert("blocks", NbtTag::IntArray(blocks));
    Ok(root)
}

pub fn from_regions(regions: BTreeMap<String, SchematicRegion>) -> Result<Schematic> {
    let (_, region) = schematic::single_region(&regions)?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    let data_version = region.data_version();

    let mut schematic = Schematic::new(SchematicFormat::Structurize);
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
    read(&root)
}

pub fn to_bytes(schematic: &Schematic) -> Result<Vec<u8>> {
    crate::io::write_nbt_bytes(&write(schematic)?, "")
}
