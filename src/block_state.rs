use quartz_nbt::{NbtCompound, NbtTag};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Result, SchematicError};

pub const AIR_NAME: &str = "minecraft:air";

/// Shared air state, returned for reads outside a container.
pub static AIR: BlockState = BlockState::AIR;

/// A block id plus its property values.
///
/// Properties are kept sorted by key so that two states with the same
/// values compare and hash equal regardless of the order they were read in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockState {
    pub name: SmolStr,
    pub properties: Vec<(SmolStr, SmolStr)>,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            write!(f, "[")?;
            for (i, (key, value)) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl Hash for BlockState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        for (k, v) in &self.properties {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl Default for BlockState {
    fn default() -> Self {
        BlockState::AIR
    }
}

impl BlockState {
    pub const AIR: BlockState = BlockState {
        name: SmolStr::new_inline(AIR_NAME),
        properties: Vec::new(),
    };

    pub fn new(name: impl Into<SmolStr>) -> Self {
        BlockState {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn air() -> Self {
        BlockState::AIR
    }

    pub fn is_air(&self) -> bool {
        self.name == AIR_NAME
    }

    pub fn get_name(&self) -> &str {
        self.name.as_str()
    }

    /// The state without any properties, i.e. the block's registry entry.
    pub fn block(&self) -> BlockState {
        BlockState::new(self.name.clone())
    }

    pub fn with_property(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        let key = key.into();
        let value = value.into();
        match self.properties.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => self.properties[i].1 = value,
            Err(i) => self.properties.insert(i, (key, value)),
        }
    }

    pub fn remove_property(&mut self, key: &str) {
        self.properties.retain(|(k, _)| k != key);
    }

    pub fn get_property(&self, key: &str) -> Option<&SmolStr> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Parses the `name[key=value,...]` form used by Sponge palettes and by `Display`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (name, props) = match text.find('[') {
            Some(open) => {
                let close = text
                    .rfind(']')
                    .filter(|&close| close > open && close == text.len() - 1)
                    .ok_or_else(|| {
                        SchematicError::InvalidPalette(format!("Unterminated block state '{text}'"))
                    })?;
                (&text[..open], Some(&text[open + 1..close]))
            }
            None => (text, None),
        };
        if name.is_empty() {
            return Err(SchematicError::InvalidPalette(format!(
                "Block state '{text}' has no name"
            )));
        }

        let mut state = BlockState::new(name);
        for pair in props.into_iter().flat_map(|p| p.split(',')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                SchematicError::InvalidPalette(format!("Bad property '{pair}' in '{text}'"))
            })?;
            state.set_property(key.trim(), value.trim());
        }
        Ok(state)
    }

    pub fn to_nbt(&self) -> NbtTag {
        let mut compound = NbtCompound::new();
        compound.insert("Name", self.name.to_string());

        if !self.properties.is_empty() {
            let mut properties = NbtCompound::new();
            for (key, value) in &self.properties {
                properties.insert(key.to_string(), value.to_string());
            }
            compound.insert("Properties", properties);
        }

        NbtTag::Compound(compound)
    }

    /// Reads a `{Name, Properties}` palette entry.
    pub fn from_nbt(compound: &NbtCompound) -> Result<Self> {
        let name = compound
            .get::<_, &str>("Name")
            .map_err(|_| SchematicError::InvalidPalette("Palette entry has no Name".into()))?;

        let mut state = BlockState::new(name);
        if let Ok(props) = compound.get::<_, &NbtCompound>("Properties") {
            for (key, value) in props.inner() {
                if let NbtTag::String(value_str) = value {
                    state.set_property(key.as_str(), value_str.as_str());
                }
            }
        }

        Ok(state)
    }
}
