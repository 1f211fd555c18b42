use quartz_nbt::{NbtCompound, NbtTag};

use crate::math::Vec3d;
use crate::nbt;

/// An entity captured with a position relative to its region's origin.
///
/// `data` is the entity's full tag. Codecs add or strip their own position
/// and id keys when moving between formats.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityData {
    pub position: Vec3d,
    pub data: NbtCompound,
}

impl EntityData {
    pub fn new(position: Vec3d, data: NbtCompound) -> Self {
        EntityData { position, data }
    }

    /// The entity id, read from `id`.
    pub fn id(&self) -> Option<&str> {
        nbt::get_str(&self.data, "id")
    }

    /// A copy of the tag carrying the position as a `Pos` double list.
    pub fn to_tag_with_pos(&self) -> NbtCompound {
        let mut tag = self.data.clone();
        tag.insert("Pos", NbtTag::List(nbt::vec3d_to_list(self.position)));
        tag
    }
}
