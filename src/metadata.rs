//! Descriptive and statistical header shared by all schematic formats.

use quartz_nbt::{NbtCompound, NbtTag};
use serde::{Deserialize, Serialize};

use crate::math::BlockPos;
use crate::nbt;

pub const DEFAULT_NAME: &str = "<no name>";

/// Marker for counts, versions and times that were never set.
pub const UNSET: i64 = -1;

/// Time after creation during which edits don't count as modifications.
const MODIFICATION_GRACE_MILLIS: i64 = 10 * 60 * 1000;

/// Known release for each world data version.
const KNOWN_VERSIONS: &[(i32, &str)] = &[
    (1343, "1.12.2"),
    (1631, "1.13.2"),
    (1976, "1.14.4"),
    (2230, "1.15.2"),
    (2586, "1.16.5"),
    (2730, "1.17.1"),
    (2975, "1.18.2"),
    (3120, "1.19.2"),
    (3337, "1.19.4"),
    (3465, "1.20.1"),
    (3700, "1.20.4"),
    (3953, "1.21"),
    (4189, "1.21.4"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinecraftVersion {
    pub data_version: i32,
    pub name: String,
}

impl MinecraftVersion {
    pub fn unknown() -> Self {
        MinecraftVersion {
            data_version: -1,
            name: "unknown".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.data_version < 0
    }

    /// Resolves a data version to its release name, or an unnamed version for
    /// releases not in the table.
    pub fn from_data_version(data_version: i32) -> Self {
        if data_version < 0 {
            return Self::unknown();
        }
        let name = KNOWN_VERSIONS
            .iter()
            .find(|(dv, _)| *dv == data_version)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("data version {data_version}"));
        MinecraftVersion { data_version, name }
    }
}

impl Default for MinecraftVersion {
    fn default() -> Self {
        Self::unknown()
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchematicMetadata {
    pub name: String,
    pub author: String,
    pub description: String,
    pub enclosing_size: BlockPos,
    pub minecraft_version: MinecraftVersion,
    pub original_origin: Option<BlockPos>,
    pub time_created: i64,
    pub time_modified: i64,
    pub schematic_version: i32,
    pub region_count: i32,
    pub entity_count: i32,
    pub total_volume: i64,
    pub total_blocks: i64,
    pub block_entity_count: i64,
    pub block_tick_count: i64,
    pub preview_image: Option<Vec<i32>>,
}

impl Default for SchematicMetadata {
    fn default() -> Self {
        SchematicMetadata {
            name: DEFAULT_NAME.to_string(),
            author: String::new(),
            description: String::new(),
            enclosing_size: BlockPos::ORIGIN,
            minecraft_version: MinecraftVersion::unknown(),
            original_origin: None,
            time_created: UNSET,
            time_modified: UNSET,
            schematic_version: UNSET as i32,
            region_count: UNSET as i32,
            entity_count: UNSET as i32,
            total_volume: UNSET,
            total_blocks: UNSET,
            block_entity_count: UNSET,
            block_tick_count: UNSET,
            preview_image: None,
        }
    }
}

impl SchematicMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_modified(&self) -> bool {
        self.time_modified > 0 && self.time_modified != self.time_created
    }

    pub fn set_time_modified_to_now(&mut self) {
        self.time_modified = now_millis();
    }

    /// Marks a modification unless the schematic was created in the last ten minutes.
    pub fn set_time_modified_to_now_if_not_recently_created(&mut self) {
        self.touch_at(now_millis());
    }

    fn touch_at(&mut self, now: i64) {
        if now - self.time_created > MODIFICATION_GRACE_MILLIS {
            self.time_modified = now;
        }
    }

    pub fn copy_from(&mut self, other: &SchematicMetadata) {
        self.clone_from(other);
    }

    pub fn read(&mut self, tag: &NbtCompound) {
        self.name = nbt::get_string_or(tag, "Name", DEFAULT_NAME);
        self.author = nbt::get_string_or(tag, "Author", "");
        self.description = nbt::get_string_or(tag, "Description", "");
        self.enclosing_size =
            nbt::read_block_pos_tag(tag, "EnclosingSize").unwrap_or(BlockPos::ORIGIN);

        self.time_created = nbt::get_i64_or(tag, "TimeCreated", UNSET);
        self.time_modified = nbt::get_i64_or(tag, "TimeModified", UNSET);
        self.schematic_version = nbt::get_i32_or(tag, "SchematicVersion", UNSET as i32);
        self.minecraft_version =
            MinecraftVersion::from_data_version(nbt::get_i32_or(tag, "McDataVersion", -1));

        self.region_count = nbt::get_i32_or(tag, "RegionCount", UNSET as i32);
        self.entity_count = nbt::get_i32_or(tag, "EntityCount", UNSET as i32);
        self.total_volume = nbt::get_i64_or(tag, "TotalVolume", UNSET);
        self.total_blocks = nbt::get_i64_or(tag, "TotalBlocks", UNSET);
        self.block_entity_count = nbt::get_i64_or(tag, "BlockEntityCount", UNSET);
        self.block_tick_count = nbt::get_i64_or(tag, "BlockTickCount", UNSET);

        self.preview_image = nbt::get_int_array(tag, "PreviewImageData").map(<[i32]>::to_vec);
        self.original_origin = nbt::read_block_pos_tag(tag, "Origin");
    }

    pub fn from_tag(tag: &NbtCompound) -> Self {
        let mut metadata = Self::default();
        metadata.read(tag);
        metadata
    }

    /// Adds the metadata keys to `tag`, keeping whatever else it holds.
    pub fn write_into(&self, tag: &mut NbtCompound) {
        tag.insert("Name", NbtTag::String(self.name.clone()));
        if !self.author.is_empty() {
            tag.insert("Author", NbtTag::String(self.author.clone()));
        }
        if !self.description.is_empty() {
            tag.insert("Description", NbtTag::String(self.description.clone()));
        }
        if self.schematic_version >= 0 {
            tag.insert("SchematicVersion", NbtTag::Int(self.schematic_version));
        }

        tag.insert("TimeCreated", NbtTag::Long(self.time_created));
        if self.was_modified() {
            tag.insert("TimeModified", NbtTag::Long(self.time_modified));
        }

        tag.insert(
            "EnclosingSize",
            NbtTag::Compound(nbt::block_pos_compound(self.enclosing_size)),
        );
        tag.insert(
            "McDataVersion",
            NbtTag::Int(self.minecraft_version.data_version),
        );
        tag.insert(
            "McVersion",
            NbtTag::String(self.minecraft_version.name.clone()),
        );

        tag.insert("RegionCount", NbtTag::Int(self.region_count));
        if self.entity_count >= 0 {
            tag.insert("EntityCount", NbtTag::Int(self.entity_count));
        }
        tag.insert("TotalVolume", NbtTag::Long(self.total_volume));
        if self.total_blocks >= 0 {
            tag.insert("TotalBlocks", NbtTag::Long(self.total_blocks));
        }
        if self.block_entity_count >= 0 {
            tag.insert("BlockEntityCount", NbtTag::Long(self.block_entity_count));
        }
        if self.block_tick_count >= 0 {
            tag.insert("BlockTickCount", NbtTag::Long(self.block_tick_count));
        }

        if let Some(origin) = self.original_origin {
            tag.insert("Origin", NbtTag::Compound(nbt::block_pos_compound(origin)));
        }
        if let Some(pixels) = &self.preview_image {
            tag.insert("PreviewImageData", NbtTag::IntArray(pixels.clone()));
        }
    }

    pub fn to_tag(&self) -> NbtCompound {
        let mut tag = NbtCompound::new();
        self.write_into(&mut tag);
        tag
    }
}
