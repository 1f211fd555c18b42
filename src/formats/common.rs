//! Record readers and writers shared by several formats.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;
use tracing::warn;

use crate::block_state::BlockState;
use crate::entity::EntityData;
use crate::error::{Result, SchematicError};
use crate::math::BlockPos;
use crate::nbt;

/// Block entity tags carrying their position as `x`, `y`, `z` int siblings.
/// Returns the map and the number of entries skipped.
pub fn read_block_entities(list: &NbtList) -> (BTreeMap<BlockPos, NbtCompound>, usize) {
    let mut map = BTreeMap::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(compound) = tag else {
            errors += 1;
            continue;
        };
        let mut data = compound.clone();
        let pos = nbt::read_block_pos_strict(&data);
        for key in ["x", "y", "z"] {
            nbt::remove(&mut data, key);
        }
        match pos {
            Some(pos) if !data.is_empty() => {
                map.insert(pos, data);
            }
            _ => errors += 1,
        }
    }
    (map, errors)
}

/// Entity tags carrying their position in a `Pos` double list.
pub fn read_entities(list: &NbtList) -> (Vec<EntityData>, usize) {
    let mut entities = Vec::new();
    let mut errors = 0;
    for tag in list.iter() {
        let NbtTag::Compound(compound) = tag else {
            errors += 1;
            continue;
        };
        let pos = nbt::get_list(compound, "Pos").and_then(nbt::vec3d_from_list);
        match pos {
            Some(pos) if !compound.is_empty() => {
                entities.push(EntityData::new(pos, compound.clone()));
            }
            _ => errors += 1,
        }
    }
    (entities, errors)
}

pub fn block_entities_to_list(block_entities: &BTreeMap<BlockPos, NbtCompound>) -> NbtList {
    let mut list = NbtList::new();
    for (pos, data) in block_entities {
        let mut tag = data.clone();
        nbt::put_block_pos(&mut tag, *pos);
        list.push(NbtTag::Compound(tag));
    }
    list
}

pub fn entities_to_list(entities: &[EntityData]) -> NbtList {
    let mut list = NbtList::new();
    for entity in entities {
        list.push(NbtTag::Compound(entity.to_tag_with_pos()));
    }
    list
}

/// A list of `{Name, Properties}` entries, indexed by id.
pub fn read_palette_list(list: &NbtList) -> Result<Vec<BlockState>> {
    list.iter()
        .map(|tag| match tag {
            NbtTag::Compound(c) => BlockState::from_nbt(c),
            _ => Err(SchematicError::InvalidPalette(
                "Palette entry is not a compound".into(),
            )),
        })
        .collect()
}

pub fn palette_to_list(mapping: &[BlockState]) -> NbtList {
    let mut list = NbtList::new();
    for state in mapping {
        list.push(state.to_nbt());
    }
    list
}

/// One aggregate warning per record category.
pub fn warn_skipped(what: &str, skipped: usize, kept: usize, region: Option<&str>) {
    if skipped == 0 {
        return;
    }
    match region {
        Some(region) => warn!(
            "Skipped {skipped} invalid {what} in region '{region}', {kept} read successfully"
        ),
        None => warn!("Skipped {skipped} invalid {what}, {kept} read successfully"),
    }
}

/// Size read from three numeric tags, rejected unless every axis is positive.
pub fn read_valid_size(compound: &NbtCompound, keys: [&str; 3]) -> Result<BlockPos> {
    let size = BlockPos::new(
        nbt::required_i32(compound, keys[0])?,
        nbt::required_i32(compound, keys[1])?,
        nbt::required_i32(compound, keys[2])?,
    );
    if !size.is_size_valid() {
        return Err(SchematicError::InvalidSize {
            x: size.x,
            y: size.y,
            z: size.z,
        });
    }
    Ok(size)
}

/// Volume as an array length, failing beyond the signed 32-bit limit.
pub fn checked_volume(size: BlockPos, what: &'static str) -> Result<usize> {
    let volume = size.volume();
    if volume > i32::MAX as u64 {
        return Err(SchematicError::CapacityExceeded {
            what,
            requested: volume,
            limit: i32::MAX as u64,
        });
    }
    Ok(volume as usize)
}

/// Dimensions stored as NBT shorts, failing when an axis exceeds `i16::MAX`.
pub fn short_size(size: BlockPos) -> Result<[i16; 3]> {
    let too_large = || SchematicError::TooLarge {
        x: size.x,
        y: size.y,
        z: size.z,
        max_x: i16::MAX as i32,
        max_y: i16::MAX as i32,
        max_z: i16::MAX as i32,
    };
    Ok([
        i16::try_from(size.x).map_err(|_| too_large())?,
        i16::try_from(size.y).map_err(|_| too_large())?,
        i16::try_from(size.z).map_err(|_| too_large())?,
    ])
}
