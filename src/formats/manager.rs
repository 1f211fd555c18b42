//! Schematic type descriptors and the process-wide registry used for
//! format sniffing.
//!
//! Built-in types are registered on first use. Downstream code may append
//! its own types at startup, before any lookup that should see them.

use quartz_nbt::NbtCompound;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};
use tracing::debug;

use super::{indev, litematic, schematica, sponge, structurize, vanilla};
use crate::container::BlockContainer;
use crate::error::{Result, SchematicError};
use crate::math::BlockPos;
use crate::metadata::{SchematicMetadata, UNSET};
use crate::region::SchematicRegion;
use crate::schematic::Schematic;

/// One on-disk format: its sniffing rules and conversion entry points.
#[derive(Clone, Copy)]
pub struct SchematicType {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Canonical lower-case file extension, without the dot.
    pub extension: &'static str,
    pub container_factory: fn(BlockPos) -> Result<BlockContainer>,
    pub from_data: fn(&NbtCompound) -> Result<Schematic>,
    pub from_regions: fn(BTreeMap<String, SchematicRegion>) -> Result<Schematic>,
    pub metadata_from_data: fn(&NbtCompound) -> Option<SchematicMetadata>,
    pub data_validator: fn(&NbtCompound) -> bool,
    /// Receives the lower-cased extension of a file name.
    pub extension_validator: fn(&str) -> bool,
    pub savable_versions: &'static [i32],
    pub default_save_version: i32,
    pub has_name: bool,
    pub supports_multiple_regions: bool,
    /// Root tag name required on write, empty when any name is accepted.
    pub root_tag_name: &'static str,
}

impl SchematicType {
    pub fn is_valid_extension(&self, extension: &str) -> bool {
        (self.extension_validator)(extension)
    }

    pub fn is_valid_data(&self, tag: &NbtCompound) -> bool {
        (self.data_validator)(tag)
    }

    pub fn create_container(&self, size: BlockPos) -> Result<BlockContainer> {
        (self.container_factory)(size)
    }

    pub fn create_schematic_from_data(&self, tag: &NbtCompound) -> Result<Schematic> {
        (self.from_data)(tag)
    }

    pub fn create_schematic_from_regions(
        &self,
        regions: BTreeMap<String, SchematicRegion>,
    ) -> Result<Schematic> {
        (self.from_regions)(regions)
    }

    pub fn create_metadata_from_data(&self, tag: &NbtCompound) -> Option<SchematicMetadata> {
        (self.metadata_from_data)(tag)
    }
}

impl PartialEq for SchematicType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SchematicType {}

impl fmt::Debug for SchematicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchematicType")
            .field("id", &self.id)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

pub const LITEMATIC: SchematicType = SchematicType {
    id: "litematic",
    display_name: "Litematica",
    extension: litematic::FILE_EXTENSION,
    container_factory: litematic::create_default_container,
    from_data: litematic::read,
    from_regions: litematic::from_regions,
    metadata_from_data: litematic::read_metadata,
    data_validator: litematic::is_valid_data,
    extension_validator: |ext| ext.eq_ignore_ascii_case(litematic::FILE_EXTENSION),
    savable_versions: &[],
    default_save_version: litematic::CURRENT_VERSION,
    has_name: true,
    supports_multiple_regions: true,
    root_tag_name: "",
};

pub const SPONGE: SchematicType = SchematicType {
    id: "sponge",
    display_name: "Sponge",
    extension: sponge::FILE_EXTENSION,
    container_factory: sponge::create_default_container,
    from_data: sponge::read,
    from_regions: sponge::from_regions,
    metadata_from_data: sponge::read_metadata,
    data_validator: sponge::is_valid_data,
    extension_validator: |ext| ext.eq_ignore_ascii_case(sponge::FILE_EXTENSION),
    savable_versions: sponge::SAVABLE_VERSIONS,
    default_save_version: sponge::CURRENT_VERSION,
    has_name: false,
    supports_multiple_regions: false,
    root_tag_name: "",
};

pub const SCHEMATICA: SchematicType = SchematicType {
    id: "schematica",
    display_name: "Schematica",
    extension: schematica::FILE_EXTENSION,
    container_factory: schematica::create_default_container,
    from_data: schematica::read,
    from_regions: schematica::from_regions,
    metadata_from_data: schematica::read_metadata,
    data_validator: schematica::is_valid_data,
    extension_validator: |ext| ext.eq_ignore_ascii_case(schematica::FILE_EXTENSION),
    savable_versions: &[],
    default_save_version: UNSET as i32,
    has_name: false,
    supports_multiple_regions: false,
    root_tag_name: schematica::ROOT_TAG_NAME,
};

pub const VANILLA: SchematicType = SchematicType {
    id: "vanilla",
    display_name: "Vanilla Structure",
    extension: vanilla::FILE_EXTENSION,
    container_factory: vanilla::create_default_container,
    from_data: vanilla::read,
    from_regions: vanilla::from_regions,
    metadata_from_data: vanilla::read_metadata,
    data_validator: vanilla::is_valid_data,
    extension_validator: |ext| ext.eq_ignore_ascii_case(vanilla::FILE_EXTENSION),
    savable_versions: &[],
    default_save_version: UNSET as i32,
    has_name: false,
    supports_multiple_regions: false,
    root_tag_name: "",
};

pub const STRUCTURIZE: SchematicType = SchematicType {
    id: "structurize",
    display_name: "Structurize",
    extension: structurize::FILE_EXTENSION,
    container_factory: structurize::create_default_container,
    from_data: structurize::read,
    from_regions: structurize::from_regions,
    metadata_from_data: structurize::read_metadata,
    data_validator: structurize::is_valid_data,
    extension_validator: |ext| ext.eq_ignore_ascii_case(structurize::FILE_EXTENSION),
    savable_versions: &[],
    default_save_version: structurize::CURRENT_VERSION,
    has_name: true,
    supports_multiple_regions: false,
    root_tag_name: "",
};

pub const INDEV_WORLD: SchematicType = SchematicType {
    id: "indev_world",
    display_name: "Indev World",
    extension: indev::FILE_EXTENSION,
    container_factory: indev::create_default_container,
    from_data: indev::read,
    from_regions: indev::from_regions,
    metadata_from_data: indev::read_metadata,
    data_validator: indev::is_valid_data,
    extension_validator: |ext| ext.eq_ignore_ascii_case(indev::FILE_EXTENSION),
    savable_versions: &[],
    default_save_version: UNSET as i32,
    has_name: true,
    supports_multiple_regions: false,
    root_tag_name: "",
};

/// Lower-cased text after the last dot, or empty.
pub fn file_name_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// The common types, always offered for saving, and the extra ones, which
/// are readable but only offered when asked for.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    common: Vec<SchematicType>,
    extra: Vec<SchematicType>,
}

impl TypeRegistry {
    pub fn empty() -> Self {
        TypeRegistry {
            common: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn with_builtin_types() -> Self {
        TypeRegistry {
            common: vec![LITEMATIC, SPONGE, SCHEMATICA, VANILLA, STRUCTURIZE],
            extra: vec![INDEV_WORLD],
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.common.iter().chain(&self.extra).any(|t| t.id == id)
    }

    /// Returns false when a type with the same id is already registered.
    pub fn register_common_type(&mut self, schematic_type: SchematicType) -> bool {
        if self.contains(schematic_type.id) {
            return false;
        }
        self.common.push(schematic_type);
        true
    }

    pub fn register_extra_type(&mut self, schematic_type: SchematicType) -> bool {
        if self.contains(schematic_type.id) {
            return false;
        }
        self.extra.push(schematic_type);
        true
    }

    pub fn all_types(&self) -> Vec<SchematicType> {
        self.common.iter().chain(&self.extra).copied().collect()
    }

    pub fn savable_types(&self, show_extra: bool) -> Vec<SchematicType> {
        if show_extra {
            self.all_types()
        } else {
            self.common.clone()
        }
    }

    pub fn type_by_id(&self, id: &str) -> Option<SchematicType> {
        self.common.iter().chain(&self.extra).find(|t| t.id == id).copied()
    }

    pub fn type_by_extension(&self, extension: &str) -> Option<SchematicType> {
        let extension = extension.to_lowercase();
        self.common
            .iter()
            .chain(&self.extra)
            .find(|t| t.is_valid_extension(&extension))
            .copied()
    }

    pub fn possible_types_from_file_name(&self, file_name: &str) -> Vec<SchematicType> {
        let extension = file_name_extension(file_name);
        self.common
            .iter()
            .chain(&self.extra)
            .filter(|t| t.is_valid_extension(&extension))
            .copied()
            .collect()
    }

    /// Types matching the file extension first, then every other type in
    /// registration order.
    pub fn all_types_sorted_by_probability(&self, file_name: &str) -> Vec<SchematicType> {
        let mut types = self.possible_types_from_file_name(file_name);
        for t in self.common.iter().chain(&self.extra) {
            if !types.contains(t) {
                types.push(*t);
            }
        }
        types
    }

    /// First type, in probability order, whose structural check accepts `tag`.
    pub fn type_from_data(&self, file_name: &str, tag: &NbtCompound) -> Option<SchematicType> {
        self.all_types_sorted_by_probability(file_name)
            .into_iter()
            .find(|t| t.is_valid_data(tag))
    }

    /// Reads `tag` with the first accepting type that decodes it. The last
    /// decode error is returned when every accepting type failed.
    pub fn create_schematic_from_data(&self, file_name: &str, tag: &NbtCompound) -> Result<Schematic> {
        let mut last_error = None;
        for t in self.all_types_sorted_by_probability(file_name) {
            if !t.is_valid_data(tag) {
                continue;
            }
            match t.create_schematic_from_data(tag) {
                Ok(schematic) => return Ok(schematic),
                Err(err) => {
                    debug!("{} rejected '{}': {}", t.display_name, file_name, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(SchematicError::UnrecognizedFormat))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}

static REGISTRY: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

fn registry() -> &'static RwLock<TypeRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(TypeRegistry::with_builtin_types()))
}

fn with_registry<T>(f: impl FnOnce(&TypeRegistry) -> T) -> T {
    let guard = registry().read().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
}

/// Registers the built-in types. Safe to call more than once.
pub fn init() {
    registry();
}

pub fn register_common_type(schematic_type: SchematicType) -> bool {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_common_type(schematic_type)
}

pub fn register_extra_type(schematic_type: SchematicType) -> bool {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_extra_type(schematic_type)
}

pub fn all_types() -> Vec<SchematicType> {
    with_registry(TypeRegistry::all_types)
}

pub fn savable_types(show_extra: bool) -> Vec<SchematicType> {
    with_registry(|r| r.savable_types(show_extra))
}

pub fn type_by_id(id: &str) -> Option<SchematicType> {
    with_registry(|r| r.type_by_id(id))
}

pub fn type_by_extension(extension: &str) -> Option<SchematicType> {
    with_registry(|r| r.type_by_extension(extension))
}

pub fn possible_types_from_file_name(file_name: &str) -> Vec<SchematicType> {
    with_registry(|r| r.possible_types_from_file_name(file_name))
}

pub fn all_types_sorted_by_probability(file_name: &str) -> Vec<SchematicType> {
    with_registry(|r| r.all_types_sorted_by_probability(file_name))
}

pub fn type_from_data(file_name: &str, tag: &NbtCompound) -> Option<SchematicType> {
    with_registry(|r| r.type_from_data(file_name, tag))
}

pub fn create_schematic_from_data(file_name: &str, tag: &NbtCompound) -> Result<Schematic> {
    // Copy the candidates out so decoding runs without holding the lock.
    let registry = with_registry(TypeRegistry::clone);
    registry.create_schematic_from_data(file_name, tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = TypeRegistry::with_builtin_types();
        let ids: Vec<_> = registry.all_types().iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            ["litematic", "sponge", "schematica", "vanilla", "structurize", "indev_world"]
        );
        assert_eq!(registry.savable_types(false).len(), 5);
        assert_eq!(registry.savable_types(true).len(), 6);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut registry = TypeRegistry::empty();
        assert!(registry.register_common_type(SPONGE));
        assert!(!registry.register_common_type(SPONGE));
        assert!(!registry.register_extra_type(SPONGE));
        assert_eq!(registry.all_types().len(), 1);
    }

    #[test]
    fn test_extension_matching() {
        let registry = TypeRegistry::with_builtin_types();
        assert_eq!(file_name_extension("House.LITEMATIC"), "litematic");
        assert_eq!(file_name_extension("no_extension"), "");
        assert_eq!(
            registry.possible_types_from_file_name("castle.SCHEM"),
            vec![SPONGE]
        );
        let sorted = registry.all_types_sorted_by_probability("level.dat");
        assert_eq!(sorted[0], INDEV_WORLD);
        assert_eq!(sorted[1], LITEMATIC);
        assert_eq!(sorted.len(), 6);
        assert_eq!(registry.type_by_extension("Blueprint"), Some(STRUCTURIZE));
    }

    #[test]
    fn test_unrecognized_data() {
        let registry = TypeRegistry::with_builtin_types();
        let tag = NbtCompound::new();
        assert!(registry.type_from_data("x.litematic", &tag).is_none());
        assert!(matches!(
            registry.create_schematic_from_data("x.litematic", &tag),
            Err(SchematicError::UnrecognizedFormat)
        ));
    }
}
