use schematic_core::container::required_bit_width;
use schematic_core::{
    ArrayBlockContainer, BlockContainer, BlockPos, BlockState, PackedIntArray, PackedLayout,
};

fn wool(color: usize) -> BlockState {
    const COLORS: [&str; 16] = [
        "white", "orange", "magenta", "light_blue", "yellow", "lime", "pink", "gray",
        "light_gray", "cyan", "purple", "blue", "brown", "green", "red", "black",
    ];
    BlockState::new(format!("minecraft:{}_wool", COLORS[color % COLORS.len()]))
}

/// Cheap deterministic scatter over a cube, used instead of an RNG.
fn scatter(count: usize, edge: i32) -> Vec<(i32, i32, i32)> {
    let mut seed = 7u32;
    (0..count)
        .map(|_| {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let v = (seed >> 8) as i32;
            (v % edge, (v / edge) % edge, (v / (edge * edge)) % edge)
        })
        .collect()
}

/// Every cell keeps its value while the palette grows from 2 to 5 bits.
#[test]
fn test_palette_growth_preserves_cells() {
    let size = BlockPos::new(6, 6, 6);
    let mut container = ArrayBlockContainer::new(size, 2).unwrap();
    let mut expected = Vec::new();

    for i in 0..20usize {
        let x = (i % 6) as i32;
        let z = (i / 6) as i32;
        let state = if i < 16 {
            wool(i)
        } else {
            BlockState::new(format!("minecraft:block_{i}"))
        };
        container.set_block_state(x, 1, z, &state).unwrap();
        expected.push((x, z, state));
    }

    assert_eq!(container.palette().bits(), 5, "21 palette entries need 5 bits");
    assert_eq!(container.storage().bits_per_entry(), 5);
    for (x, z, state) in &expected {
        assert_eq!(container.get_block_state(*x, 1, *z), state, "cell ({x}, 1, {z})");
    }
    assert!(container.get_block_state(0, 0, 0).is_air());
    assert_eq!(container.total_block_count(), 20);
}

/// A full palette reuses an id whose last cell was overwritten.
#[test]
fn test_free_id_reuse_keeps_bit_width() {
    let mut container = ArrayBlockContainer::new(BlockPos::new(4, 1, 1), 2).unwrap();
    for x in 0..3 {
        container.set_block_state(x, 0, 0, &wool(x as usize)).unwrap();
    }
    assert_eq!(container.palette().len(), 4);

    container.set_block_state(0, 0, 0, &wool(1)).unwrap();
    container.set_block_state(3, 0, 0, &wool(9)).unwrap();

    assert_eq!(container.palette().bits(), 2, "freed id is reused before growing");
    assert_eq!(container.get_id(3, 0, 0), Some(1));
    assert_eq!(container.get_block_state(3, 0, 0), &wool(9));
    assert_eq!(container.get_block_state(0, 0, 0), &wool(1));
    assert_eq!(container.get_block_state(2, 0, 0), &wool(2));
}

/// Containers made through `BlockContainer` reuse freed ids too.
#[test]
fn test_block_container_reuses_freed_id_by_default() {
    let mut container = BlockContainer::array(BlockPos::new(4, 1, 1), 2).unwrap();
    for x in 0..3 {
        container.set_block_state(x, 0, 0, &wool(x as usize)).unwrap();
    }
    // the only wool(2) cell now holds wool(0)
    container.set_block_state(2, 0, 0, &wool(0)).unwrap();
    container.set_block_state(3, 0, 0, &wool(11)).unwrap();

    let BlockContainer::Array(array) = &container else {
        panic!("expected an array container");
    };
    assert_eq!(array.palette().bits(), 2);
    assert_eq!(array.storage().bits_per_entry(), 2);
    assert_eq!(array.get_id(3, 0, 0), Some(3));
    assert_eq!(container.get_block_state(3, 0, 0), &wool(11));
    assert_eq!(container.get_block_state(2, 0, 0), &wool(0));
    assert_eq!(container.total_block_count(), 4);
}

/// Turning free id checks off makes the same sequence grow the palette.
#[test]
fn test_growth_when_freed_id_checks_are_off() {
    let mut container = ArrayBlockContainer::new(BlockPos::new(4, 1, 1), 2).unwrap();
    container.set_check_for_freed_ids(false);
    for x in 0..3 {
        container.set_block_state(x, 0, 0, &wool(x as usize)).unwrap();
    }
    container.set_block_state(0, 0, 0, &wool(1)).unwrap();
    container.set_block_state(3, 0, 0, &wool(9)).unwrap();

    assert_eq!(container.palette().bits(), 3);
    assert_eq!(container.get_id(3, 0, 0), Some(4));
}

/// Sparse and array containers agree on every cell and on the block count.
#[test]
fn test_sparse_and_array_agree() {
    let size = BlockPos::new(12, 12, 12);
    let mut array = BlockContainer::array(size, 2).unwrap();
    let mut sparse = BlockContainer::sparse(size);

    for (i, (x, y, z)) in scatter(300, 12).into_iter().enumerate() {
        let state = if i % 7 == 0 { BlockState::air() } else { wool(i) };
        array.set_block_state(x, y, z, &state).unwrap();
        sparse.set_block_state(x, y, z, &state).unwrap();
    }

    for y in 0..12 {
        for z in 0..12 {
            for x in 0..12 {
                assert_eq!(
                    array.get_block_state(x, y, z),
                    sparse.get_block_state(x, y, z),
                    "cell ({x}, {y}, {z})"
                );
            }
        }
    }
    assert_eq!(array.total_block_count(), sparse.total_block_count());
    assert_eq!(array.block_counts_map().get(&wool(3)), sparse.block_counts_map().get(&wool(3)));
}

/// Converting a sparse container to an array keeps every stored block.
#[test]
fn test_sparse_to_array() {
    let size = BlockPos::new(5, 3, 5);
    let mut sparse = BlockContainer::sparse(size);
    sparse.set_block_state(4, 2, 4, &wool(5)).unwrap();
    sparse.set_block_state(0, 0, 0, &wool(6)).unwrap();

    let array = sparse.to_array(PackedLayout::Tight).unwrap();
    assert_eq!(array.storage().layout(), PackedLayout::Tight);
    assert_eq!(array.get_block_state(4, 2, 4), &wool(5));
    assert_eq!(array.get_block_state(0, 0, 0), &wool(6));
    assert_eq!(array.total_block_count(), 2);
    assert_eq!(array.storage().bits_per_entry(), required_bit_width(array.palette().len()));
}

/// Tight and aligned storage hold the same values in a different word layout.
#[test]
fn test_tight_and_aligned_hold_same_values() {
    let bits = 5;
    let len = 100u64;
    let mut aligned = PackedIntArray::new(PackedLayout::Aligned, bits, len).unwrap();
    let mut tight = PackedIntArray::new(PackedLayout::Tight, bits, len).unwrap();

    for i in 0..len {
        let value = ((i * 13 + 7) % 32) as u32;
        aligned.set(i, value);
        tight.set(i, value);
    }

    assert_eq!(aligned.words().len(), 9, "12 five-bit entries per aligned word");
    assert_eq!(tight.words().len(), 8, "500 bits fill 8 tight words");
    for i in 0..len {
        assert_eq!(aligned.get(i), tight.get(i), "index {i}");
    }
    assert_eq!(aligned.with_layout(PackedLayout::Tight).unwrap(), tight);
}

/// Containers created with different layouts behave the same.
#[test]
fn test_tight_container_matches_aligned_container() {
    let size = BlockPos::new(7, 3, 5);
    let mut tight = BlockContainer::tight_array(size, 3).unwrap();
    let mut aligned = BlockContainer::array(size, 3).unwrap();
    for (i, (x, y, z)) in scatter(60, 3).into_iter().enumerate() {
        tight.set_block_state(x, y, z, &wool(i)).unwrap();
        aligned.set_block_state(x, y, z, &wool(i)).unwrap();
    }
    for y in 0..3 {
        for z in 0..5 {
            for x in 0..7 {
                assert_eq!(tight.get_block_state(x, y, z), aligned.get_block_state(x, y, z));
            }
        }
    }
}

/// Reads and writes outside the bounds are no-ops.
#[test]
fn test_out_of_bounds_access() {
    for mut container in [
        BlockContainer::array(BlockPos::new(2, 2, 2), 2).unwrap(),
        BlockContainer::sparse(BlockPos::new(2, 2, 2)),
    ] {
        container.set_block_state(2, 0, 0, &wool(1)).unwrap();
        container.set_block_state(-1, 0, 0, &wool(1)).unwrap();
        assert!(container.get_block_state(2, 0, 0).is_air());
        assert!(container.get_block_state(0, -1, 0).is_air());
        assert_eq!(container.total_block_count(), 0);
    }
}
