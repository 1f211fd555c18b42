use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;

use schematic_core::block_state::AIR;
use schematic_core::formats::{indev, litematic, schematica, sponge, structurize, vanilla};
use schematic_core::{
    BlockContainer, BlockPos, BlockState, EntityData, Schematic, SchematicError,
    SchematicFormat, SchematicRegion, ScheduledBlockTick, Vec3d,
};

/// Shows codec warnings in test output; set `RUST_LOG` for more.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

fn state(text: &str) -> BlockState {
    BlockState::parse(text).unwrap()
}

fn chest() -> NbtCompound {
    let mut data = NbtCompound::new();
    data.insert("id", NbtTag::String("minecraft:chest".into()));
    data.insert("CustomName", NbtTag::String("loot".into()));
    data
}

fn zombie() -> NbtCompound {
    let mut data = NbtCompound::new();
    data.insert("id", NbtTag::String("minecraft:zombie".into()));
    data.insert("Health", NbtTag::Float(20.0));
    data
}

/// One region at the origin holding the given cells, a chest and a zombie.
fn sample_region(size: BlockPos, cells: &[(i32, i32, i32, BlockState)]) -> SchematicRegion {
    let mut container = BlockContainer::array(size, 2).unwrap();
    for (x, y, z, s) in cells {
        container.set_block_state(*x, *y, *z, s).unwrap();
    }
    let mut block_entities = BTreeMap::new();
    block_entities.insert(BlockPos::new(0, 0, 0), chest());
    SchematicRegion::new(BlockPos::ORIGIN, size, container)
        .with_block_entities(block_entities)
        .with_entities(vec![EntityData::new(Vec3d::new(1.5, 0.0, 0.5), zombie())])
}

fn regions_of(region: SchematicRegion) -> BTreeMap<String, SchematicRegion> {
    let mut regions = BTreeMap::new();
    regions.insert("main".to_string(), region);
    regions
}

/// Same size and the same state in every cell.
fn assert_same_blocks(expected: &SchematicRegion, actual: &SchematicRegion) {
    let size = expected.size().abs();
    assert_eq!(actual.size().abs(), size, "region size");
    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                assert_eq!(
                    actual.block_container().get_block_state(x, y, z),
                    expected.block_container().get_block_state(x, y, z),
                    "cell ({x}, {y}, {z})"
                );
            }
        }
    }
    assert_eq!(
        actual.block_container().total_block_count(),
        expected.block_container().total_block_count()
    );
}

fn only_region(schematic: &Schematic) -> &SchematicRegion {
    let (_, region) = schematic.single_region().unwrap().expect("one region");
    region
}

/// A 2x2x2 litematic with one block in a corner survives a save and load.
#[test]
fn test_native_corner_block() {
    let stone = state("minecraft:stone");
    let mut container = BlockContainer::array(BlockPos::new(2, 2, 2), 2).unwrap();
    container.set_block_state(1, 1, 1, &stone).unwrap();
    let region = SchematicRegion::new(BlockPos::ORIGIN, BlockPos::new(2, 2, 2), container);

    let schematic = litematic::from_regions(regions_of(region)).unwrap();
    let bytes = schematic.to_bytes().unwrap();
    let loaded = litematic::from_bytes(&bytes).unwrap();

    assert_eq!(loaded.total_block_count(), 1);
    assert_eq!(loaded.enclosing_size(), BlockPos::new(2, 2, 2));
    let container = loaded.region("main").unwrap().block_container();
    for y in 0..2 {
        for z in 0..2 {
            for x in 0..2 {
                let expected = if (x, y, z) == (1, 1, 1) { &stone } else { &AIR };
                assert_eq!(container.get_block_state(x, y, z), expected, "cell ({x}, {y}, {z})");
            }
        }
    }
}

/// Several regions with ticks, negative sizes and metadata.
#[test]
fn test_litematic_multi_region_round_trip() {
    let lever = state("minecraft:lever[face=wall,facing=north,powered=false]");
    let mut first = sample_region(
        BlockPos::new(3, 2, 2),
        &[(0, 0, 0, state("minecraft:chest[facing=west]")), (2, 1, 1, lever.clone())],
    );
    let mut ticks = BTreeMap::new();
    ticks.insert(
        BlockPos::new(2, 1, 1),
        ScheduledBlockTick::new("minecraft:lever", 1, 4, 17),
    );
    first = first.with_block_ticks(ticks);

    let mut second_container = BlockContainer::array(BlockPos::new(2, 1, 1), 2).unwrap();
    second_container.set_block_state(1, 0, 0, &state("minecraft:glass")).unwrap();
    let second =
        SchematicRegion::new(BlockPos::new(5, 0, 0), BlockPos::new(-2, 1, 1), second_container);

    let mut regions = regions_of(first);
    regions.insert("annex".to_string(), second);
    let mut schematic = litematic::from_regions(regions).unwrap();
    schematic.metadata_mut().name = "Workshop".into();
    schematic.metadata_mut().author = "builder".into();

    let loaded = litematic::from_bytes(&litematic::to_bytes(&schematic).unwrap()).unwrap();

    assert_eq!(loaded.metadata().name, "Workshop");
    assert_eq!(loaded.metadata().author, "builder");
    assert_eq!(loaded.metadata().region_count, 2);
    assert_eq!(loaded.metadata().total_blocks, 3);
    assert_eq!(loaded.regions().len(), 2);
    assert!(loaded.read_report().is_clean());

    for (name, region) in schematic.regions() {
        let actual = loaded.region(name).unwrap();
        assert_eq!(actual.position(), region.position(), "{name} position");
        assert_eq!(actual.size(), region.size(), "{name} keeps its signed size");
        assert_same_blocks(region, actual);
        assert_eq!(actual.block_entities(), region.block_entities());
        assert_eq!(actual.block_ticks(), region.block_ticks());
    }
    let main = loaded.region("main").unwrap();
    assert_eq!(main.entities().len(), 1);
    assert_eq!(main.entities()[0].position, Vec3d::new(1.5, 0.0, 0.5));
    assert_eq!(main.entities()[0].id(), Some("minecraft:zombie"));
}

/// Ten good block entities and three broken ones: the read keeps ten and
/// reports three.
#[test]
fn test_malformed_block_entities_are_skipped() {
    init_logging();
    let size = BlockPos::new(5, 1, 2);
    let mut block_entities = BTreeMap::new();
    for i in 0..10 {
        block_entities.insert(BlockPos::new(i % 5, 0, i / 5), chest());
    }
    let region = SchematicRegion::new(BlockPos::ORIGIN, size, BlockContainer::array(size, 2).unwrap())
        .with_block_entities(block_entities);
    let schematic = litematic::from_regions(regions_of(region)).unwrap();
    let mut root = litematic::write(&schematic).unwrap();

    let mut missing_y = chest();
    missing_y.insert("x", NbtTag::Int(1));
    missing_y.insert("z", NbtTag::Int(1));
    let mut position_only = NbtCompound::new();
    for key in ["x", "y", "z"] {
        position_only.insert(key, NbtTag::Int(0));
    }
    let tile_entities = tile_entities_of(&mut root, "main");
    tile_entities.push(NbtTag::Compound(missing_y));
    tile_entities.push(NbtTag::Compound(position_only));
    tile_entities.push(NbtTag::Int(7));

    let loaded = litematic::read(&root).unwrap();
    assert_eq!(loaded.region("main").unwrap().block_entities().len(), 10);
    assert_eq!(loaded.read_report().skipped_block_entities, 3);
    assert_eq!(loaded.read_report().total_skipped(), 3);
}

fn tile_entities_of<'a>(root: &'a mut NbtCompound, name: &str) -> &'a mut NbtList {
    let Some(NbtTag::Compound(regions)) = root.inner_mut().get_mut("Regions") else {
        panic!("no Regions compound");
    };
    let Some(NbtTag::Compound(region)) = regions.inner_mut().get_mut(name) else {
        panic!("no region {name}");
    };
    match region.inner_mut().get_mut("TileEntities") {
        Some(NbtTag::List(list)) => list,
        _ => panic!("no TileEntities list"),
    }
}

/// Every savable Sponge version reads back what was written.
#[test]
fn test_sponge_versions_round_trip() {
    init_logging();
    let cells = [
        (0, 0, 0, state("minecraft:chest[facing=west]")),
        (1, 0, 1, state("minecraft:oak_log[axis=x]")),
        (2, 1, 0, state("minecraft:stone")),
    ];
    let region = sample_region(BlockPos::new(3, 2, 2), &cells);

    for version in sponge::SAVABLE_VERSIONS {
        let mut schematic = sponge::from_regions(regions_of(region.clone())).unwrap();
        schematic.metadata_mut().schematic_version = *version;
        schematic.metadata_mut().name = format!("v{version}");

        let loaded = sponge::from_bytes(&schematic.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.metadata().schematic_version, *version);
        assert_eq!(loaded.metadata().name, format!("v{version}"));
        assert_eq!(loaded.enclosing_size(), BlockPos::new(3, 2, 2));

        let actual = only_region(&loaded);
        assert_same_blocks(&region, actual);
        assert_eq!(actual.block_entities(), region.block_entities(), "version {version}");
        assert_eq!(actual.entities().len(), 1, "version {version}");
        assert_eq!(actual.entities()[0].position, Vec3d::new(1.5, 0.0, 0.5));
        assert_eq!(actual.entities()[0].id(), Some("minecraft:zombie"));
    }
}

#[test]
fn test_sponge_rejects_unsavable_version() {
    let region = sample_region(BlockPos::new(1, 1, 1), &[]);
    let mut schematic = sponge::from_regions(regions_of(region)).unwrap();
    schematic.metadata_mut().schematic_version = 4;
    assert!(schematic.write().is_err());
}

/// The high nibble of an add byte belongs to the even index.
#[test]
fn test_legacy_add_nibbles() {
    let ids = schematica::decode_block_ids(&[0x01, 0x02], Some(&[0xF0u8 as i8][..])).unwrap();
    assert_eq!(ids[0], 0x01 | ((0xF0 & 0xF0) << 4));
    assert_eq!(ids[1], 0x02 | ((0xF0 & 0x0F) << 8));
    assert_eq!(ids, vec![0xF01, 0x002]);
}

/// States with a legacy id and meta survive the numeric round trip.
#[test]
fn test_schematica_round_trip() {
    let cells = [
        (0, 0, 0, state("minecraft:chest")),
        (1, 0, 0, state("minecraft:wool[color=red]")),
        (1, 1, 1, state("minecraft:stone[variant=granite]")),
        (0, 1, 0, state("minecraft:glass")),
    ];
    let region = sample_region(BlockPos::new(2, 2, 2), &cells);
    let schematic = schematica::from_regions(regions_of(region.clone())).unwrap();

    let loaded = schematica::from_bytes(&schematic.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded.format(), SchematicFormat::Schematica);
    let actual = only_region(&loaded);
    assert_same_blocks(&region, actual);
    assert_eq!(actual.block_entities(), region.block_entities());
    assert_eq!(actual.entities()[0].id(), Some("minecraft:zombie"));
    assert!(loaded.read_report().is_clean());
}

#[test]
fn test_vanilla_round_trip() {
    let cells = [
        (0, 0, 0, state("minecraft:chest[facing=west]")),
        (3, 2, 1, state("minecraft:stone")),
    ];
    let region = sample_region(BlockPos::new(4, 3, 2), &cells);
    let mut schematic = vanilla::from_regions(regions_of(region.clone())).unwrap();
    schematic.metadata_mut().author = "someone".into();

    let loaded = vanilla::from_bytes(&schematic.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded.metadata().author, "someone");
    let actual = only_region(&loaded);
    assert!(actual.block_container().as_sparse().is_some());
    assert_same_blocks(&region, actual);
    assert_eq!(actual.block_entities(), region.block_entities());
    assert_eq!(actual.entities().len(), 1);
    assert_eq!(actual.entities()[0].position, Vec3d::new(1.5, 0.0, 0.5));
}

#[test]
fn test_structurize_round_trip() {
    let cells = [
        (0, 0, 0, state("minecraft:chest[facing=west]")),
        (1, 2, 0, state("minecraft:oak_planks")),
        (2, 1, 1, state("minecraft:glass")),
    ];
    let region = sample_region(BlockPos::new(3, 3, 2), &cells);
    let mut schematic = structurize::from_regions(regions_of(region.clone())).unwrap();
    schematic.metadata_mut().name = "hut".into();

    let loaded = structurize::from_bytes(&schematic.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded.metadata().name, "hut");
    assert_eq!(loaded.enclosing_size(), BlockPos::new(3, 3, 2));
    let actual = only_region(&loaded);
    assert_same_blocks(&region, actual);
    assert_eq!(actual.block_entities().len(), 1);
}

#[test]
fn test_indev_round_trip() {
    let cells = [
        (0, 0, 0, state("minecraft:glass")),
        (1, 0, 2, state("minecraft:wool[color=lime]")),
        (3, 1, 1, state("minecraft:stone[variant=andesite]")),
    ];
    let size = BlockPos::new(4, 2, 3);
    let mut container = BlockContainer::array(size, 2).unwrap();
    for (x, y, z, s) in &cells {
        container.set_block_state(*x, *y, *z, s).unwrap();
    }
    let region = SchematicRegion::new(BlockPos::ORIGIN, size, container);
    let schematic = indev::from_regions(regions_of(region.clone())).unwrap();

    let loaded = indev::from_bytes(&schematic.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded.format(), SchematicFormat::IndevWorld);
    assert_same_blocks(&region, only_region(&loaded));
    assert!(loaded.read_report().is_clean());
}

/// Converting a multi-region litematic to a single-region format fails cleanly.
#[test]
fn test_single_region_formats_reject_several_regions() {
    let mut regions = regions_of(sample_region(BlockPos::new(1, 1, 1), &[]));
    regions.insert("other".to_string(), sample_region(BlockPos::new(1, 1, 1), &[]));
    assert!(sponge::from_regions(regions.clone()).is_err());
    assert!(vanilla::from_regions(regions.clone()).is_err());
    assert!(litematic::from_regions(regions).is_ok());
}

/// A 40000 block wide region with one block at the far end.
fn wide_regions() -> BTreeMap<String, SchematicRegion> {
    let size = BlockPos::new(40_000, 1, 1);
    let mut container = BlockContainer::sparse(size);
    container.set_block_state(39_999, 0, 0, &state("minecraft:glass")).unwrap();
    regions_of(SchematicRegion::new(BlockPos::ORIGIN, size, container))
}

fn assert_too_large(result: schematic_core::Result<NbtCompound>) {
    match result {
        Err(SchematicError::TooLarge { x: 40_000, max_x: 32_767, .. }) => {}
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[test]
fn test_sponge_rejects_width_beyond_short() {
    assert_too_large(sponge::write(&sponge::from_regions(wide_regions()).unwrap()));
}

#[test]
fn test_schematica_rejects_width_beyond_short() {
    assert_too_large(schematica::write(&schematica::from_regions(wide_regions()).unwrap()));
}

#[test]
fn test_structurize_rejects_width_beyond_short() {
    let schematic = structurize::from_regions(wide_regions()).unwrap();
    assert_too_large(structurize::write(&schematic));
    assert!(schematic.to_bytes().is_err());
}
