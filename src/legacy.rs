//! Numeric block ids of the pre-flattening formats.
//!
//! Legacy-id files store a byte (or 12-bit) id plus a 4-bit meta value per
//! cell. Translating those to block states needs a registry; the built-in one
//! knows the 1.12 id table and the meta variants of the common colour and
//! stone families. Embedders with a live game registry can install their own.

use rustc_hash::FxHashMap;
use std::sync::OnceLock;

use crate::block_state::BlockState;

pub trait LegacyBlockRegistry: Send + Sync {
    /// Default state of a known block.
    fn block_by_name(&self, name: &str) -> Option<BlockState>;

    /// Numeric id of the state's block.
    fn legacy_id(&self, state: &BlockState) -> Option<u16>;

    /// State of `block` for a meta value. Unknown metas give the default state.
    fn state_from_meta(&self, block: &BlockState, meta: u8) -> BlockState;

    fn meta_from_state(&self, state: &BlockState) -> u8;

    /// Default states of every block that has a numeric id.
    fn registered_blocks(&self) -> Vec<BlockState>;
}

const NAMESPACE: &str = "minecraft:";

#[rustfmt::skip]
const BLOCK_NAMES: [&str; 256] = [
    "air", "stone", "grass", "dirt", "cobblestone", "planks", "sapling", "bedrock",
    "flowing_water", "water", "flowing_lava", "lava", "sand", "gravel", "gold_ore", "iron_ore",
    "coal_ore", "log", "leaves", "sponge", "glass", "lapis_ore", "lapis_block", "dispenser",
    "sandstone", "noteblock", "bed", "golden_rail", "detector_rail", "sticky_piston", "web",
    "tallgrass", "deadbush", "piston", "piston_head", "wool", "piston_extension",
    "yellow_flower", "red_flower", "brown_mushroom", "red_mushroom", "gold_block",
    "iron_block", "double_stone_slab", "stone_slab", "brick_block", "tnt", "bookshelf",
    "mossy_cobblestone", "obsidian", "torch", "fire", "mob_spawner", "oak_stairs", "chest",
    "redstone_wire", "diamond_ore", "diamond_block", "crafting_table", "wheat", "farmland",
    "furnace", "lit_furnace", "standing_sign", "wooden_door", "ladder", "rail", "stone_stairs",
    "wall_sign", "lever", "stone_pressure_plate", "iron_door", "wooden_pressure_plate",
    "redstone_ore", "lit_redstone_ore", "unlit_redstone_torch", "redstone_torch",
    "stone_button", "snow_layer", "ice", "snow", "cactus", "clay", "reeds", "jukebox", "fence",
    "pumpkin", "netherrack", "soul_sand", "glowstone", "portal", "lit_pumpkin", "cake",
    "unpowered_repeater", "powered_repeater", "stained_glass", "trapdoor", "monster_egg",
    "stonebrick", "brown_mushroom_block", "red_mushroom_block", "iron_bars", "glass_pane",
    "melon_block", "pumpkin_stem", "melon_stem", "vine", "fence_gate", "brick_stairs",
    "stone_brick_stairs", "mycelium", "waterlily", "nether_brick", "nether_brick_fence",
    "nether_brick_stairs", "nether_wart", "enchanting_table", "brewing_stand", "cauldron",
    "end_portal", "end_portal_frame", "end_stone", "dragon_egg", "redstone_lamp",
    "lit_redstone_lamp", "double_wooden_slab", "wooden_slab", "cocoa", "sandstone_stairs",
    "emerald_ore", "ender_chest", "tripwire_hook", "tripwire", "emerald_block",
    "spruce_stairs", "birch_stairs", "jungle_stairs", "command_block", "beacon",
    "cobblestone_wall", "flower_pot", "carrots", "potatoes", "wooden_button", "skull", "anvil",
    "trapped_chest", "light_weighted_pressure_plate", "heavy_weighted_pressure_plate",
    "unpowered_comparator", "powered_comparator", "daylight_detector", "redstone_block",
    "quartz_ore", "hopper", "quartz_block", "quartz_stairs", "activator_rail", "dropper",
    "stained_hardened_clay", "stained_glass_pane", "leaves2", "log2", "acacia_stairs",
    "dark_oak_stairs", "slime", "barrier", "iron_trapdoor", "prismarine", "sea_lantern",
    "hay_block", "carpet", "hardened_clay", "coal_block", "packed_ice", "double_plant",
    "standing_banner", "wall_banner", "daylight_detector_inverted", "red_sandstone",
    "red_sandstone_stairs", "double_stone_slab2", "stone_slab2", "spruce_fence_gate",
    "birch_fence_gate", "jungle_fence_gate", "dark_oak_fence_gate", "acacia_fence_gate",
    "spruce_fence", "birch_fence", "jungle_fence", "dark_oak_fence", "acacia_fence",
    "spruce_door", "birch_door", "jungle_door", "acacia_door", "dark_oak_door", "end_rod",
    "chorus_plant", "chorus_flower", "purpur_block", "purpur_pillar", "purpur_stairs",
    "purpur_double_slab", "purpur_slab", "end_bricks", "beetroots", "grass_path",
    "end_gateway", "repeating_command_block", "chain_command_block", "frosted_ice", "magma",
    "nether_wart_block", "red_nether_brick", "bone_block", "structure_void", "observer",
    "white_shulker_box", "orange_shulker_box", "magenta_shulker_box", "light_blue_shulker_box",
    "yellow_shulker_box", "lime_shulker_box", "pink_shulker_box", "gray_shulker_box",
    "silver_shulker_box", "cyan_shulker_box", "purple_shulker_box", "blue_shulker_box",
    "brown_shulker_box", "green_shulker_box", "red_shulker_box", "black_shulker_box",
    "white_glazed_terracotta", "orange_glazed_terracotta", "magenta_glazed_terracotta",
    "light_blue_glazed_terracotta", "yellow_glazed_terracotta", "lime_glazed_terracotta",
    "pink_glazed_terracotta", "gray_glazed_terracotta", "silver_glazed_terracotta",
    "cyan_glazed_terracotta", "purple_glazed_terracotta", "blue_glazed_terracotta",
    "brown_glazed_terracotta", "green_glazed_terracotta", "red_glazed_terracotta",
    "black_glazed_terracotta", "concrete", "concrete_powder", "", "", "structure_block",
];

const COLORS: &[&str] = &[
    "white", "orange", "magenta", "light_blue", "yellow", "lime", "pink", "gray", "silver",
    "cyan", "purple", "blue", "brown", "green", "red", "black",
];

/// Blocks whose meta selects a value of one property.
const META_PROPERTIES: &[(&str, &str, &[&str])] = &[
    (
        "stone",
        "variant",
        &[
            "stone",
            "granite",
            "smooth_granite",
            "diorite",
            "smooth_diorite",
            "andesite",
            "smooth_andesite",
        ],
    ),
    ("dirt", "variant", &["dirt", "coarse_dirt", "podzol"]),
    (
        "planks",
        "variant",
        &["oak", "spruce", "birch", "jungle", "acacia", "dark_oak"],
    ),
    ("sand", "variant", &["sand", "red_sand"]),
    ("wool", "color", COLORS),
    ("stained_glass", "color", COLORS),
    ("stained_hardened_clay", "color", COLORS),
    ("stained_glass_pane", "color", COLORS),
    ("carpet", "color", COLORS),
    ("concrete", "color", COLORS),
    ("concrete_powder", "color", COLORS),
];

/// The 1.12 numeric id table.
#[derive(Debug)]
pub struct BuiltinLegacyRegistry {
    ids: FxHashMap<String, u16>,
}

impl Default for BuiltinLegacyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinLegacyRegistry {
    pub fn new() -> Self {
        let ids = BLOCK_NAMES
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(id, name)| (format!("{NAMESPACE}{name}"), id as u16))
            .collect();
        BuiltinLegacyRegistry { ids }
    }

    fn meta_property(name: &str) -> Option<(&'static str, &'static [&'static str])> {
        let path = name.strip_prefix(NAMESPACE)?;
        META_PROPERTIES
            .iter()
            .find(|(block, _, _)| *block == path)
            .map(|(_, key, values)| (*key, *values))
    }
}

impl LegacyBlockRegistry for BuiltinLegacyRegistry {
    fn block_by_name(&self, name: &str) -> Option<BlockState> {
        self.ids
            .contains_key(name)
            .then(|| BlockState::new(name))
    }

    fn legacy_id(&self, state: &BlockState) -> Option<u16> {
        self.ids.get(state.get_name()).copied()
    }

    fn state_from_meta(&self, block: &BlockState, meta: u8) -> BlockState {
        let base = block.block();
        match Self::meta_property(block.get_name()) {
            Some((key, values)) => match values.get(meta as usize) {
                Some(value) => base.with_property(key, *value),
                None => base,
            },
            None => base,
        }
    }

    fn meta_from_state(&self, state: &BlockState) -> u8 {
        Self::meta_property(state.get_name())
            .and_then(|(key, values)| {
                let value = state.get_property(key)?;
                values.iter().position(|v| *v == value.as_str())
            })
            .map_or(0, |meta| meta as u8)
    }

    fn registered_blocks(&self) -> Vec<BlockState> {
        BLOCK_NAMES
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| BlockState::new(format!("{NAMESPACE}{name}")))
            .collect()
    }
}

static REGISTRY: OnceLock<Box<dyn LegacyBlockRegistry>> = OnceLock::new();

/// The process-wide legacy registry, the built-in table unless one was installed.
pub fn legacy_registry() -> &'static dyn LegacyBlockRegistry {
    REGISTRY
        .get_or_init(|| Box::new(BuiltinLegacyRegistry::new()))
        .as_ref()
}

/// Installs a registry. Fails, handing it back, once any lookup already ran.
pub fn set_legacy_registry(
    registry: Box<dyn LegacyBlockRegistry>,
) -> Result<(), Box<dyn LegacyBlockRegistry>> {
    REGISTRY.set(registry)
}

/// Id → default state for every numeric id the registry knows.
pub fn registry_id_mapping(registry: &dyn LegacyBlockRegistry) -> FxHashMap<u16, BlockState> {
    registry
        .registered_blocks()
        .into_iter()
        .filter_map(|block| registry.legacy_id(&block).map(|id| (id, block)))
        .collect()
}
