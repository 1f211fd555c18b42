//! Lookup helpers over quartz_nbt compounds.
//!
//! Every schematic format checks tag kinds before trusting them and most
//! numeric fields are accepted in any numeric width, so these helpers wrap
//! the raw map access with those rules.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};

use crate::error::{Result, SchematicError};
use crate::math::{BlockPos, Vec3d};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ByteArray,
    String,
    List,
    Compound,
    IntArray,
    LongArray,
    /// Any of the six numeric kinds.
    AnyNumeric,
}

impl TagKind {
    pub fn name(self) -> &'static str {
        match self {
            TagKind::Byte => "byte",
            TagKind::Short => "short",
            TagKind::Int => "int",
            TagKind::Long => "long",
            TagKind::Float => "float",
            TagKind::Double => "double",
            TagKind::ByteArray => "byte array",
            TagKind::String => "string",
            TagKind::List => "list",
            TagKind::Compound => "compound",
            TagKind::IntArray => "int array",
            TagKind::LongArray => "long array",
            TagKind::AnyNumeric => "number",
        }
    }

    pub fn matches(self, tag: &NbtTag) -> bool {
        matches!(
            (self, tag),
            (TagKind::Byte, NbtTag::Byte(_))
                | (TagKind::Short, NbtTag::Short(_))
                | (TagKind::Int, NbtTag::Int(_))
                | (TagKind::Long, NbtTag::Long(_))
                | (TagKind::Float, NbtTag::Float(_))
                | (TagKind::Double, NbtTag::Double(_))
                | (TagKind::ByteArray, NbtTag::ByteArray(_))
                | (TagKind::String, NbtTag::String(_))
                | (TagKind::List, NbtTag::List(_))
                | (TagKind::Compound, NbtTag::Compound(_))
                | (TagKind::IntArray, NbtTag::IntArray(_))
                | (TagKind::LongArray, NbtTag::LongArray(_))
        ) || (self == TagKind::AnyNumeric && as_f64(tag).is_some())
    }
}

pub fn tag<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a NbtTag> {
    compound.inner().get(key)
}

pub fn contains(compound: &NbtCompound, key: &str, kind: TagKind) -> bool {
    tag(compound, key).is_some_and(|t| kind.matches(t))
}

/// True when `key` is a list whose elements are of `element`. Empty lists match any kind.
pub fn contains_list(compound: &NbtCompound, key: &str, element: TagKind) -> bool {
    get_list(compound, key).is_some_and(|list| list_of_kind(list, element))
}

pub fn list_of_kind(list: &NbtList, element: TagKind) -> bool {
    list.iter().next().map_or(true, |first| element.matches(first))
}

pub fn as_f64(tag: &NbtTag) -> Option<f64> {
    match *tag {
        NbtTag::Byte(v) => Some(v as f64),
        NbtTag::Short(v) => Some(v as f64),
        NbtTag::Int(v) => Some(v as f64),
        NbtTag::Long(v) => Some(v as f64),
        NbtTag::Float(v) => Some(v as f64),
        NbtTag::Double(v) => Some(v),
        _ => None,
    }
}

pub fn as_i64(tag: &NbtTag) -> Option<i64> {
    match *tag {
        NbtTag::Byte(v) => Some(v as i64),
        NbtTag::Short(v) => Some(v as i64),
        NbtTag::Int(v) => Some(v as i64),
        NbtTag::Long(v) => Some(v),
        NbtTag::Float(v) => Some(v as i64),
        NbtTag::Double(v) => Some(v as i64),
        _ => None,
    }
}

pub fn get_i64(compound: &NbtCompound, key: &str) -> Option<i64> {
    tag(compound, key).and_then(as_i64)
}

pub fn get_i32(compound: &NbtCompound, key: &str) -> Option<i32> {
    get_i64(compound, key).map(|v| v as i32)
}

pub fn get_f64(compound: &NbtCompound, key: &str) -> Option<f64> {
    tag(compound, key).and_then(as_f64)
}

pub fn get_i32_or(compound: &NbtCompound, key: &str, default: i32) -> i32 {
    get_i32(compound, key).unwrap_or(default)
}

pub fn get_i64_or(compound: &NbtCompound, key: &str, default: i64) -> i64 {
    get_i64(compound, key).unwrap_or(default)
}

pub fn get_str<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a str> {
    match tag(compound, key) {
        Some(NbtTag::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

pub fn get_string_or(compound: &NbtCompound, key: &str, default: &str) -> String {
    get_str(compound, key).unwrap_or(default).to_string()
}

pub fn get_compound<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a NbtCompound> {
    match tag(compound, key) {
        Some(NbtTag::Compound(c)) => Some(c),
        _ => None,
    }
}

pub fn get_list<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a NbtList> {
    match tag(compound, key) {
        Some(NbtTag::List(l)) => Some(l),
        _ => None,
    }
}

pub fn get_byte_array<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a [i8]> {
    match tag(compound, key) {
        Some(NbtTag::ByteArray(a)) => Some(a.as_slice()),
        _ => None,
    }
}

pub fn get_int_array<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a [i32]> {
    match tag(compound, key) {
        Some(NbtTag::IntArray(a)) => Some(a.as_slice()),
        _ => None,
    }
}

pub fn get_long_array<'a>(compound: &'a NbtCompound, key: &str) -> Option<&'a [i64]> {
    match tag(compound, key) {
        Some(NbtTag::LongArray(a)) => Some(a.as_slice()),
        _ => None,
    }
}

/// Compound elements of a list, skipping anything else.
pub fn compounds(list: &NbtList) -> impl Iterator<Item = &NbtCompound> {
    list.iter().filter_map(|t| match t {
        NbtTag::Compound(c) => Some(c),
        _ => None,
    })
}

pub fn required_compound<'a>(compound: &'a NbtCompound, key: &str) -> Result<&'a NbtCompound> {
    match tag(compound, key) {
        Some(NbtTag::Compound(c)) => Ok(c),
        Some(_) => Err(SchematicError::mistyped(key, "compound")),
        None => Err(SchematicError::missing(key)),
    }
}

pub fn required_i32(compound: &NbtCompound, key: &str) -> Result<i32> {
    match tag(compound, key) {
        Some(t) => as_i64(t)
            .map(|v| v as i32)
            .ok_or_else(|| SchematicError::mistyped(key, "number")),
        None => Err(SchematicError::missing(key)),
    }
}

pub fn remove(compound: &mut NbtCompound, key: &str) -> Option<NbtTag> {
    compound.inner_mut().remove(key)
}

/// Reads `x`, `y`, `z` numeric siblings.
pub fn read_block_pos(compound: &NbtCompound) -> Option<BlockPos> {
    Some(BlockPos::new(
        get_i32(compound, "x")?,
        get_i32(compound, "y")?,
        get_i32(compound, "z")?,
    ))
}

/// Like [`read_block_pos`] but requires the three tags to be ints.
pub fn read_block_pos_strict(compound: &NbtCompound) -> Option<BlockPos> {
    let int = |key: &str| match tag(compound, key) {
        Some(NbtTag::Int(v)) => Some(*v),
        _ => None,
    };
    Some(BlockPos::new(int("x")?, int("y")?, int("z")?))
}

pub fn put_block_pos(compound: &mut NbtCompound, pos: BlockPos) {
    compound.insert("x", NbtTag::Int(pos.x));
    compound.insert("y", NbtTag::Int(pos.y));
    compound.insert("z", NbtTag::Int(pos.z));
}

/// An `{x, y, z}` compound.
pub fn block_pos_compound(pos: BlockPos) -> NbtCompound {
    let mut compound = NbtCompound::new();
    put_block_pos(&mut compound, pos);
    compound
}

pub fn read_block_pos_tag(compound: &NbtCompound, key: &str) -> Option<BlockPos> {
    get_compound(compound, key).and_then(read_block_pos)
}

pub fn block_pos_from_int_array(values: &[i32]) -> Option<BlockPos> {
    match values {
        [x, y, z] => Some(BlockPos::new(*x, *y, *z)),
        _ => None,
    }
}

pub fn block_pos_to_int_array(pos: BlockPos) -> NbtTag {
    NbtTag::IntArray(vec![pos.x, pos.y, pos.z])
}

pub fn block_pos_from_list(list: &NbtList) -> Option<BlockPos> {
    if list.len() != 3 {
        return None;
    }
    let mut it = list.iter().map(|t| match t {
        NbtTag::Int(v) => Some(*v),
        _ => None,
    });
    Some(BlockPos::new(it.next()??, it.next()??, it.next()??))
}

pub fn block_pos_to_list(pos: BlockPos) -> NbtList {
    let mut list = NbtList::new();
    list.push(NbtTag::Int(pos.x));
    list.push(NbtTag::Int(pos.y));
    list.push(NbtTag::Int(pos.z));
    list
}

/// A three element list of doubles (or floats, which older formats use).
pub fn vec3d_from_list(list: &NbtList) -> Option<Vec3d> {
    if list.len() != 3 {
        return None;
    }
    let mut it = list.iter().map(|t| match *t {
        NbtTag::Double(v) => Some(v),
        NbtTag::Float(v) => Some(v as f64),
        _ => None,
    });
    Some(Vec3d::new(it.next()??, it.next()??, it.next()??))
}

pub fn vec3d_to_list(pos: Vec3d) -> NbtList {
    let mut list = NbtList::new();
    list.push(NbtTag::Double(pos.x));
    list.push(NbtTag::Double(pos.y));
    list.push(NbtTag::Double(pos.z));
    list
}

pub fn vec3d_to_float_list(pos: Vec3d) -> NbtList {
    let mut list = NbtList::new();
    list.push(NbtTag::Float(pos.x as f32));
    list.push(NbtTag::Float(pos.y as f32));
    list.push(NbtTag::Float(pos.z as f32));
    list
}

/// `x`, `y`, `z` double siblings.
pub fn read_vec3d_siblings(compound: &NbtCompound) -> Option<Vec3d> {
    let double = |key: &str| match tag(compound, key) {
        Some(NbtTag::Double(v)) => Some(*v),
        _ => None,
    };
    Some(Vec3d::new(double("x")?, double("y")?, double("z")?))
}

pub fn string_list(values: &[String]) -> NbtList {
    let mut list = NbtList::new();
    for value in values {
        list.push(NbtTag::String(value.clone()));
    }
    list
}
