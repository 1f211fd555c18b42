//! The game's own structure file (`.nbt`).
//!
//! Blocks are stored as a flat list of `{pos, state, nbt?}` records against a
//! palette, so the decoded region always uses a sparse container.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;

use super::common;
use crate::block_state::BlockState;
use crate::container::{BlockContainer, NonResizingPalette, SparseBlockContainer};
use crate::entity::EntityData;
use crate::error::{ReadReport, Result, SchematicError};
use crate::math::BlockPos;
use crate::metadata::{MinecraftVersion, SchematicMetadata};
use crate::nbt::{self, TagKind};
use crate::region::SchematicRegion;
use crate::schematic::{self, Schematic, SchematicFormat};

pub const FILE_EXTENSION: &str = "nbt";

/// Dense containers at least this large are written without their air cells.
pub const AIR_SKIP_VOLUME: u64 = 100_000;

fn read_size(tag: &NbtCompound) -> BlockPos {
    nbt::get_list(tag, "size")
        .and_then(nbt::block_pos_from_list)
        .unwrap_or(BlockPos::ORIGIN)
}

pub fn is_valid_data(tag: &NbtCompound) -> bool {
    nbt::contains_list(tag, "blocks", TagKind::Compound)
        && nbt::contains_list(tag, "palette", TagKind::Compound)
        && nbt::contains_list(tag, "size", TagKind::Int)
        && read_size(tag).is_size_valid()
}

pub fn create_default_container(size: BlockPos) -> Result<BlockContainer> {
    Ok(BlockContainer::sparse(size))
}

pub fn read_metadata(tag: &NbtCompound) -> Option<SchematicMetadata> {
    if !is_valid_data(tag) {
        return None;
    }
    let size = read_size(tag);
    let mut meta = nbt::get_compound(tag, "Metadata")
        .map(SchematicMetadata::from_tag)
        .unwrap_or_default();
    if meta.author.is_empty() {
        meta.author = nbt::get_string_or(tag, "author", "");
    }
    if meta.minecraft_version.data_version <= 0 {
        meta.minecraft_version =
            MinecraftVersion::from_data_version(nbt::get_i32_or(tag, "DataVersion", -1));
    }
    meta.enclosing_size = size;
    meta.total_volume = size.volume() as i64;
    meta.region_count = 1;
    meta.entity_count = nbt::get_list(tag, "entities").map_or(0, |l| l.len() as i32);
    Some(meta)
}

pub fn read(tag: &NbtCompound) -> Result<Schematic> {
    if !is_valid_data(tag) {
        return Err(SchematicError::InvalidData("Not a structure file".into()));
    }
    let size = read_size(tag);
    let metadata = read_metadata(tag).unwrap_or_default();
    let data_version = nbt::get_i32_or(tag, "DataVersion", metadata.minecraft_version.data_version);

    let palette = common::read_palette_list(
        nbt::get_list(tag, "palette").ok_or_else(|| SchematicError::missing("palette"))?,
    )?;
    let empty = NbtList::new();
    let mut container = SparseBlockContainer::new(size);
    let mut block_entities = BTreeMap::new();
    let skipped_blocks = read_blocks(
        nbt::get_list(tag, "blocks").unwrap_or(&empty),
        &palette,
        &mut container,
        &mut block_entities,
    );
    let (entities, skipped_entities) =
        read_entities(nbt::get_list(tag, "entities").unwrap_or(&empty));
    common::warn_skipped(
        "blocks",
        skipped_blocks,
        container.total_block_count() as usize,
        None,
    );
    common::warn_skipped("entities", skipped_entities, entities.len(), None);

    let region = SchematicRegion::new(BlockPos::ORIGIN, size, BlockContainer::Sparse(container))
        .with_block_entities(block_entities)
        .with_entities(entities)
        .with_data_version(data_version);

    let mut schematic = Schematic::new(SchematicFormat::Vanilla);
    schematic.regions.insert(metadata.name.clone(), region);
    schematic.metadata = metadata;
    schematic.enclosing_size = size;
    schematic.data_version = data_version;
    schematic.read_report = ReadReport {
        skipped_blocks,
        skipped_entities,
        ..ReadReport::default()
    };
    Ok(schematic)
}

/// Returns the number of records skipped. Ids missing from the palette read as air.
fn read_blocks(
    list: &NbtList,
    palette: &[BlockState],
    container: &mut SparseBlockContainer,
    block_entities: &mut BTreeMap<BlockPos, NbtCompound>,
) -> usize {
    let size = container.size();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(block) = tag else {
            errors += 1;
            continue;
        };
        let pos = nbt::get_list(block, "pos").and_then(nbt::block_pos_from_list);
        let Some(pos) = pos.filter(|p| {
            p.x >= 0 && p.y >= 0 && p.z >= 0 && p.x < size.x && p.y < size.y && p.z < size.z
        }) else {
            errors += 1;
            continue;
        };
        let state = nbt::get_i32(block, "state")
            .and_then(|id| usize::try_from(id).ok())
            .and_then(|id| palette.get(id))
            .unwrap_or(&crate::block_state::AIR);
        container.set_block_state(pos.x, pos.y, pos.z, state);

        if let Some(data) = nbt::get_compound(block, "nbt") {
            block_entities.insert(pos, data.clone());
        }
    }
    errors
}

fn read_entities(list: &NbtList) -> (Vec<EntityData>, usize) {
    let mut entities = Vec::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(record) = tag else {
            errors += 1;
            continue;
        };
        let pos = nbt::get_list(record, "pos").and_then(nbt::vec3d_from_list);
        match (pos, nbt::get_compound(record, "nbt")) {
            (Some(pos), Some(data)) => entities.push(EntityData::new(pos, data.clone())),
            _ => errors += 1,
        }
    }
    (entities, errors)
}

fn block_record(
    pos: BlockPos,
    state_id: u32,
    block_entities: &BTreeMap<BlockPos, NbtCompound>,
) -> NbtTag {
    let mut tag = NbtCompound::new();
    tag.insert("pos", NbtTag::List(nbt::block_pos_to_list(pos)));
    tag.insert("state", NbtTag::Int(state_id as i32));
    if let Some(data) = block_entities.get(&pos) {
        tag.insert("nbt", NbtTag::Compound(data.clone()));
    }
    NbtTag::Compound(tag)
}

/// Block records plus the palette they index, with ids assigned in write order.
fn write_blocks(
    container: &BlockContainer,
    block_entities: &BTreeMap<BlockPos, NbtCompound>,
) -> (NbtList, NbtList) {
    let mut palette = NonResizingPalette::new();
    let mut blocks = NbtList::new();

    match container {
        BlockContainer::Sparse(sparse) => {
            let mut cells: Vec<_> = sparse.iter_blocks().collect();
            cells.sort_by_key(|(pos, _)| (pos.y, pos.z, pos.x));
            for (pos, state) in cells {
                blocks.push(block_record(pos, palette.id_for(state), block_entities));
            }
        }
        BlockContainer::Array(array) => {
            let size = array.size();
            let skip_air = array.total_volume() >= AIR_SKIP_VOLUME;
            for y in 0..size.y {
                for z in 0..size.z {
                    for x in 0..size.x {
                        let state = array.get_block_state(x, y, z);
                        if skip_air && state.is_air() {
                            continue;
                        }
                        let pos = BlockPos::new(x, y, z);
                        blocks.push(block_record(pos, palette.id_for(state), block_entities));
                    }
                }
            }
        }
    }
    (blocks, common::palette_to_list(palette.mapping()))
}

fn write_entities(entities: &[EntityData]) -> NbtList {
    let mut list = NbtList::new();
    for entity in entities {
        let mut data = entity.data.clone();
        nbt::remove(&mut data, "Pos");

        let mut tag = NbtCompound::new();
        tag.insert("pos", NbtTag::List(nbt::vec3d_to_list(entity.position)));
        tag.insert(
            "blockpos",
            NbtTag::List(nbt::block_pos_to_list(BlockPos::containing(entity.position))),
        );
        tag.insert("nbt", NbtTag::Compound(data));
        list.push(NbtTag::Compound(tag));
    }
    list
}

pub fn write(schematic: &Schematic) -> Result<NbtCompound> {
    let (_, region) = schematic.single_region()?.ok_or(SchematicError::NoRegions)?;

    let mut root = NbtCompound::new();
    root.insert("Metadata", NbtTag::Compound(schematic.metadata.to_tag()));
    root.insert("author", NbtTag::String(schematic.metadata.author.clone()));
    root.insert("DataVersion", NbtTag::Int(schematic.data_version));
    root.insert(
        "size",
        NbtTag::List(nbt::block_pos_to_list(schematic.enclosing_size)),
    );

    let (blocks, palette) = write_blocks(region.block_container(), region.block_entities());
    root.insert("palette", NbtTag::List(palette));
    root.insert("blocks", NbtTag::List(blocks));
    root.insert("entities", NbtTag::List(write_entities(region.entities())));
    Ok(root)
}

pub fn from_regions(regions: BTreeMap<String, SchematicRegion>) -> Result<Schematic> {
    let (_, region) = schematic::single_region(&regions)?.ok_or(SchematicError::NoRegions)?;
    let size = region.size().abs();
    let data_version = region.data_version();

    let mut schematic = Schematic::new(SchematicFormat::Vanilla);
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
