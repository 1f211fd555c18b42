//! Indev world saves (`.dat`), read and written as a single region.
//!
//! Blocks are byte ids with the meta value in the upper nibble of `Data`
//! (the lower nibble is light). Tile entity positions are packed into one int.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::warn;

use super::common;
use crate::block_state::BlockState;
use crate::container::{required_bit_width, ArrayBlockContainer, BlockContainer};
use crate::entity::EntityData;
use crate::error::{ReadReport, Result, SchematicError};
use crate::legacy::{self, LegacyBlockRegistry};
use crate::math::BlockPos;
use crate::metadata::{MinecraftVersion, SchematicMetadata, DEFAULT_NAME};
use crate::nbt::{self, TagKind};
use crate::region::SchematicRegion;
use crate::schematic::{self, FormatData, Schematic, SchematicFormat};

pub const FILE_EXTENSION: &str = "dat";

pub const MAX_SIZE: BlockPos = BlockPos::new(1024, 128, 1024);
pub const DEFAULT_SPAWN: [i16; 3] = [64, 64, 64];

const NAMESPACE: &str = "minecraft:";
const PLAYER_ID: &str = "LocalPlayer";
const POS_MASK: i32 = 0x3FF;
const METAS_PER_BLOCK: usize = 16;
const MAX_BLOCK_ID: u16 = 255;

fn read_size(tag: &NbtCompound) -> BlockPos {
    let Some(map) = nbt::get_compound(tag, "Map") else {
        return BlockPos::ORIGIN;
    };
    let short = |key| match nbt::tag(map, key) {
        Some(NbtTag::Short(v)) => *v as i32,
        _ => 0,
    };
    BlockPos::new(short("Width"), short("Height"), short("Length"))
}

pub fn is_valid_data(tag: &NbtCompound) -> bool {
    if !nbt::contains(tag, "Environment", TagKind::Compound) {
        return false;
    }
    let Some(map) = nbt::get_compound(tag, "Map") else {
        return false;
    };
    ["Width", "Height", "Length"]
        .iter()
        .all(|key| nbt::contains(map, key, TagKind::Short))
        && nbt::contains(map, "Blocks", TagKind::ByteArray)
        && read_size(tag).is_size_valid()
}

pub fn create_default_container(size: BlockPos) -> Result<BlockContainer> {
    BlockContainer::array(size, 8)
}

pub fn read_metadata(tag: &NbtCompound) -> Option<SchematicMetadata> {
    if !is_valid_data(tag) {
        return None;
    }
    let size = read_size(tag);
    let mut meta = SchematicMetadata::default();
    meta.enclosing_size = size;
    meta.total_volume = size.volume() as i64;
    meta.region_count = 1;
    meta.entity_count = nbt::get_list(tag, "Entities").map_or(0, |l| l.len() as i32);
    meta.block_entity_count = nbt::get_list(tag, "TileEntities").map_or(0, |l| l.len() as i64);

    if let Some(about) = nbt::get_compound(tag, "About") {
        meta.time_created = nbt::get_i64_or(about, "CreatedOn", meta.time_created);
        meta.author = nbt::get_string_or(about, "Author", "");
        meta.name = nbt::get_string_or(about, "Name", DEFAULT_NAME);
    }
    Some(meta)
}

pub fn read(tag: &NbtCompound) -> Result<Schematic> {
    if !is_valid_data(tag) {
        return Err(SchematicError::InvalidData("Not an Indev world".into()));
    }
    let size = read_size(tag);
    let map = nbt::required_compound(tag, "Map")?;
    let registry = legacy::legacy_registry();
    let mut report = ReadReport::default();
    let container = read_blocks(map, size, registry, &mut report)?;

    let empty = NbtList::new();
    let (block_entities, skipped_block_entities) =
        read_block_entities(nbt::get_list(tag, "TileEntities").unwrap_or(&empty));
    let (entities, local_player, skipped_entities) =
        read_entities(nbt::get_list(tag, "Entities").unwrap_or(&empty));
    common::warn_skipped("block entities", skipped_block_entities, block_entities.len(), None);
    common::warn_skipped("entities", skipped_entities, entities.len(), None);
    report.skipped_block_entities = skipped_block_entities;
    report.skipped_entities = skipped_entities;

    let spawn = nbt::get_list(map, "Spawn").and_then(read_spawn);
    let metadata = read_metadata(tag).unwrap_or_default();
    let data_version = nbt::get_i32_or(tag, "DataVersion", metadata.minecraft_version.data_version);

    let region = SchematicRegion::new(BlockPos::ORIGIN, size, BlockContainer::Array(container))
        .with_block_entities(block_entities)
        .with_entities(entities)
        .with_data_version(data_version);

    let mut schematic = Schematic::new(SchematicFormat::IndevWorld);
    schematic.regions.insert(metadata.name.clone(), region);
    schematic.metadata = metadata;
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.format_data = FormatData::IndevWorld {
        environment: nbt::get_compound(tag, "Environment").cloned().unwrap_or_default(),
        spawn,
        local_player,
    };
    schematic.read_report = report;
    Ok(schematic)
}

fn read_spawn(list: &NbtList) -> Option<[i16; 3]> {
    let values: Vec<i16> = list
        .iter()
        .filter_map(|t| match t {
            NbtTag::Short(v) => Some(*v),
            _ => None,
        })
        .collect();
    values.try_into().ok()
}

fn read_blocks(
    map: &NbtCompound,
    size: BlockPos,
    registry: &dyn LegacyBlockRegistry,
    report: &mut ReadReport,
) -> Result<ArrayBlockContainer> {
    let volume = common::checked_volume(size, "Indev block array")?;
    let blocks = nbt::get_byte_array(map, "Blocks").ok_or_else(|| SchematicError::missing("Blocks"))?;
    let data = nbt::get_byte_array(map, "Data").ok_or_else(|| SchematicError::missing("Data"))?;
    for (what, array) in [("Blocks", blocks), ("Data", data)] {
        if array.len() != volume {
            return Err(SchematicError::ArrayLengthMismatch {
                what,
                expected: volume,
                found: array.len(),
            });
        }
    }

    let mapping = legacy::registry_id_mapping(registry);
    let bits = required_bit_width(mapping.len() * METAS_PER_BLOCK);
    let mut container = ArrayBlockContainer::new(size, bits)?;
    let mut resolved: FxHashMap<(u16, u8), BlockState> = FxHashMap::default();
    let mut errors = 0;
    let mut index = 0;

    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                let id = blocks[index] as u8 as u16;
                let meta = ((data[index] as u8) >> 4) & 0x0F;
                index += 1;

                let key = (id, meta);
                if !resolved.contains_key(&key) {
                    if let Some(block) = mapping.get(&id) {
                        resolved.insert(key, registry.state_from_meta(block, meta));
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

fn unpack_pos(packed: i32) -> BlockPos {
    BlockPos::new(
        packed & POS_MASK,
        (packed >> 10) & POS_MASK,
        (packed >> 20) & POS_MASK,
    )
}

fn pack_pos(pos: BlockPos) -> i32 {
    ((pos.z & POS_MASK) << 20) | ((pos.y & POS_MASK) << 10) | (pos.x & POS_MASK)
}

/// `Chest` becomes `minecraft:chest`.
fn namespaced_id(id: &str) -> String {
    format!("{NAMESPACE}{}", id.to_lowercase())
}

/// `minecraft:chest` becomes `Chest`. Ids from other namespaces are kept.
fn indev_id(id: &str) -> String {
    let Some(path) = id.strip_prefix(NAMESPACE) else {
        return id.to_string();
    };
    let mut chars = path.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn read_block_entities(list: &NbtList) -> (BTreeMap<BlockPos, NbtCompound>, usize) {
    let mut map = BTreeMap::new();
    let mut errors = 0;
    for data in list.iter() {
        let NbtTag::Compound(data) = data else {
            errors += 1;
            continue;
        };
        let packed = match nbt::tag(data, "Pos") {
            Some(NbtTag::Int(v)) if !data.is_empty() => *v,
            _ => {
                errors += 1;
                continue;
            }
        };
        let mut data = data.clone();
        nbt::remove(&mut data, "Pos");
        let id = namespaced_id(&nbt::get_string_or(&data, "id", ""));
        data.insert("id", NbtTag::String(id));
        map.insert(unpack_pos(packed), data);
    }
    (map, errors)
}

/// Entities plus the preserved player record.
fn read_entities(list: &NbtList) -> (Vec<EntityData>, Option<NbtCompound>, usize) {
    let mut entities = Vec::new();
    let mut player = None;
    let mut errors = 0;
    for data in list.iter() {
        let NbtTag::Compound(data) = data else {
            errors += 1;
            continue;
        };
        let Some(pos) = nbt::get_list(data, "Pos").filter(|l| nbt::list_of_kind(l, TagKind::Float))
        else {
            errors += 1;
            continue;
        };
        let id = nbt::get_string_or(data, "id", "");
        if id == PLAYER_ID {
            player = Some(data.clone());
            continue;
        }
        let Some(position) = nbt::vec3d_from_list(pos) else {
            errors += 1;
            continue;
        };
        let mut data = data.clone();
        data.insert("id", NbtTag::String(namespaced_id(&id)));
        entities.push(EntityData::new(position, data));
    }
    (entities, player, errors)
}

fn default_environment() -> NbtCompound {
    let mut env = NbtCompound::new();
    env.insert("CloudColor", NbtTag::Int(16_777_215));
    env.insert("CloudHeight", NbtTag::Short(66));
    env.insert("FogColor", NbtTag::Int(16_777_215));
    env.insert("SkyBrightness", NbtTag::Byte(15));
    env.insert("SkyColor", NbtTag::Int(10_079_487));
    env.insert("SurroundingGroundHeight", NbtTag::Short(23));
    env.insert("SurroundingGroundType", NbtTag::Byte(2));
    env.insert("SurroundingWaterHeight", NbtTag::Short(32));
    env.insert("SurroundingWaterType", NbtTag::Byte(8));
    env.insert("TimeOfDay", NbtTag::Short(0));
    env
}

/// `Blocks` and `Data` arrays plus the number of cells written as air for
/// lack of a byte id.
fn write_blocks(
    container: &BlockContainer,
    size: BlockPos,
    registry: &dyn LegacyBlockRegistry,
) -> (Vec<i8>, Vec<i8>, usize) {
    let volume = size.volume() as usize;
    let mut ids = Vec::with_capacity(volume);
    let mut metas = Vec::with_capacity(volume);
    let mut encoded: FxHashMap<&BlockState, Option<(u8, u8)>> = FxHashMap::default();
    let mut errors = 0;

    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                let state = container.get_block_state(x, y, z);
                let entry = *encoded.entry(state).or_insert_with(|| {
                    registry
                        .legacy_id(state)
                        .filter(|&id| id <= MAX_BLOCK_ID)
                        .map(|id| (id as u8, registry.meta_from_state(state) & 0x0F))
                });
                let (id, meta) = entry.unwrap_or_else(|| {
                    errors += 1;
                    (0, 0)
                });
                ids.push(id as i8);
                metas.push((meta << 4) as i8);
            }
        }
    }
    (ids, metas, errors)
}

fn block_entities_to_list(block_entities: &BTreeMap<BlockPos, NbtCompound>) -> NbtList {
    let mut list = NbtList::new();
    for (pos, data) in block_entities {
        let mut tag = data.clone();
        let id = indev_id(&nbt::get_string_or(&tag, "id", ""));
        tag.insert("id", NbtTag::String(id));
        tag.insert("Pos", NbtTag::Int(pack_pos(*pos)));
        list.push(NbtTag::Compound(tag));
    }
    list
}

fn entities_to_list(entities: &[EntityData], local_player: Option<&NbtCompound>) -> NbtList {
    let mut list = NbtList::new();
    if let Some(player) = local_player {
        list.push(NbtTag::Compound(player.clone()));
    }
    for entity in entities {
        let mut tag = entity.data.clone();
        let id = indev_id(&nbt::get_string_or(&tag, "id", ""));
        tag.insert("id", NbtTag::String(id));
        tag.insert("Pos", NbtTag::List(nbt::vec3d_to_float_list(entity.position)));
        list.push(NbtTag::Compound(tag));
    }
    list
}

fn spawn_list(spawn: [i16; 3]) -> NbtList {
    let mut list = NbtList::new();
    for value in spawn {
        list.push(NbtTag::Short(value));
    }
    list
}

pub fn write(schematic: &Schematic) -> Result<NbtCompound> {
    let (_, region) = schematic.single_region()?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    if size.x > MAX_SIZE.x || size.y > MAX_SIZE.y || size.z > MAX_SIZE.z {
        return Err(SchematicError::TooLarge {
            x: size.x,
            y: size.y,
            z: size.z,
            max_x: MAX_SIZE.x,
            max_y: MAX_SIZE.y,
            max_z: MAX_SIZE.z,
        });
    }

    let (environment, spawn, local_player) = match &schematic.format_data {
        FormatData::IndevWorld {
            environment,
            spawn,
            local_player,
        } => (
            Some(environment).filter(|env| !env.is_empty()).cloned(),
            *spawn,
            local_player.as_ref(),
        ),
        _ => (None, None, None),
    };

    let (blocks, data, errors) =
        write_blocks(region.block_container(), size, legacy::legacy_registry());
    if errors > 0 {
        warn!("{errors} blocks have no Indev block id and were written as air");
    }

    let mut map = NbtCompound::new();
    map.insert("Width", NbtTag::Short(size.x as i16));
    map.insert("Height", NbtTag::Short(size.y as i16));
    map.insert("Length", NbtTag::Short(size.z as i16));
    map.insert("Spawn", NbtTag::List(spawn_list(spawn.unwrap_or(DEFAULT_SPAWN))));
    map.insert("Blocks", NbtTag::ByteArray(blocks));
    map.insert("Data", NbtTag::ByteArray(data));

    let meta = &schematic.metadata;
    let mut about = NbtCompound::new();
    about.insert("Author", NbtTag::String(meta.author.clone()));
    about.insert("CreatedOn", NbtTag::Long(meta.time_created));
    about.insert("Name", NbtTag::String(meta.name.clone()));

    let mut root = NbtCompound::new();
    root.insert(
        "Environment",
        NbtTag::Compound(environment.unwrap_or_else(default_environment)),
    );
    root.insert("About", NbtTag::Compound(about));
    root.insert("Map", NbtTag::Compound(map));
    root.insert(
        "TileEntities",
        NbtTag::List(block_entities_to_list(region.block_entities())),
    );
    root.insert(
        "Entities",
        NbtTag::List(entities_to_list(region.entities(), local_player)),
    );
    Ok(root)
}

pub fn from_regions(regions: BTreeMap<String, SchematicRegion>) -> Result<Schematic> {
    let (_, region) = schematic::single_region(&regions)?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    let data_version = region.data_version();

    let mut schematic = Schematic::new(SchematicFormat::IndevWorld);
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
    crate::io::write_nbt_bytes(&write(schematic)?, "")
}
