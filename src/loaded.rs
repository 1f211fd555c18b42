use crate::error::Result;
use crate::formats::manager;
use crate::schematic::Schematic;

/// A schematic opened from a file, with its unsaved-changes flag.
#[derive(Debug, Clone)]
pub struct LoadedSchematic {
    pub schematic: Schematic,
    pub file_name: Option<String>,
    modified_since_saved: bool,
}

impl LoadedSchematic {
    pub fn new(schematic: Schematic, file_name: Option<String>) -> Self {
        LoadedSchematic {
            schematic,
            file_name,
            modified_since_saved: false,
        }
    }

    /// Decompresses `bytes`, sniffs the type (extension matches first) and reads it.
    pub fn try_load(bytes: &[u8], file_name: &str) -> Result<Self> {
        let (root, _) = crate::io::read_nbt_bytes(bytes)?;
        let schematic = manager::create_schematic_from_data(file_name, &root)?;
        Ok(Self::new(schematic, Some(file_name.to_string())))
    }

    pub fn was_modified_since_saved(&self) -> bool {
        self.modified_since_saved
    }

    pub fn set_modified_since_saved(&mut self) {
        self.modified_since_saved = true;
    }

    pub fn clear_modified_since_saved(&mut self) {
        self.modified_since_saved = false;
    }
}
