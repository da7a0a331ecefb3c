//! End-to-end scenarios exercising [`foster_btree::BTree`] through its
//! public API only, across enough keys to force multiple splits,
//! merges, rebalances, and root promotions.

use foster_btree::{BTree, BytesKey, Error, PairKey, U64Key};

/// Best-effort `tracing` init so a failing test prints its spans;
/// `try_init` is used (not `init`) since every test in the binary
/// calls this and only the first call may succeed.
fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[test]
fn s1_sequential_inserts_survive_many_splits() {
    init_tracing();
    let mut t: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    for k in 0..2000u64 {
        t.put(U64Key::new(k), k.to_le_bytes().to_vec()).unwrap();
    }
    for k in 0..2000u64 {
        assert_eq!(t.get(&U64Key::new(k)), Some(k.to_le_bytes().to_vec()), "key {k}");
    }
}

#[test]
fn s2_duplicate_put_is_rejected_and_leaves_original_value() {
    init_tracing();
    let mut t: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    for k in 0..500u64 {
        t.put(U64Key::new(k), vec![1u8]).unwrap();
    }
    assert_eq!(t.put(U64Key::new(250), vec![2u8]), Err(Error::Duplicate));
    assert_eq!(t.get(&U64Key::new(250)), Some(vec![1u8]));
}

#[test]
fn s3_reverse_order_inserts_also_force_splits_and_stay_reachable() {
    init_tracing();
    let mut t: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    for k in (0..1500u64).rev() {
        t.put(U64Key::new(k), vec![k as u8]).unwrap();
    }
    for k in 0..1500u64 {
        assert_eq!(t.get(&U64Key::new(k)), Some(vec![k as u8]), "key {k}");
    }
}

#[test]
fn s4_narrow_pmnk_collisions_still_resolve_to_the_right_value() {
    init_tracing();
    // A 16-bit PMNK only covers the top two bytes of these keys, so
    // every key here collides on PMNK and must be disambiguated by the
    // full stored key.
    let mut t: BTree<U64Key<u16>, Vec<u8>> = BTree::new();
    let base = 0x0001_0000_0000_0000u64;
    for i in 0..300u64 {
        t.put(U64Key::new(base + i), i.to_le_bytes().to_vec()).unwrap();
    }
    for i in 0..300u64 {
        assert_eq!(t.get(&U64Key::new(base + i)), Some(i.to_le_bytes().to_vec()), "offset {i}");
    }
}

#[test]
fn s5_variable_length_keys_scan_in_lexicographic_order() {
    init_tracing();
    let mut t: BTree<BytesKey<u16>, Vec<u8>> = BTree::new();
    let words = ["pear", "apple", "grape", "fig", "banana", "kiwi", "date", "apricot"];
    for (i, w) in words.iter().enumerate() {
        t.put(BytesKey::from_str(w), vec![i as u8]).unwrap();
    }
    let got: Vec<String> = t.scan(None, None).map(|(k, _)| String::from_utf8(k.0).unwrap()).collect();
    let mut expected: Vec<&str> = words.to_vec();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
fn s6_tuple_keys_order_by_first_field_then_second() {
    init_tracing();
    let mut t: BTree<PairKey<u32>, Vec<u8>> = BTree::new();
    let pairs = [(b"b".to_vec(), 2u64), (b"a".to_vec(), 9), (b"a".to_vec(), 1), (b"b".to_vec(), 1)];
    for (a, b) in &pairs {
        t.put(PairKey::new(a.clone(), *b), vec![0u8]).unwrap();
    }
    let got: Vec<(Vec<u8>, u64)> = t.scan(None, None).map(|(k, _)| (k.a, k.b)).collect();
    assert_eq!(got, vec![(b"a".to_vec(), 1), (b"a".to_vec(), 9), (b"b".to_vec(), 1), (b"b".to_vec(), 2)]);
}

#[test]
fn s7_bulk_delete_then_range_scan_only_sees_survivors() {
    init_tracing();
    let mut t: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    for k in 0..1000u64 {
        t.put(U64Key::new(k), vec![0u8]).unwrap();
    }
    for k in (0..1000u64).filter(|k| k % 3 == 0) {
        t.remove(&U64Key::new(k)).unwrap();
    }
    let lo = U64Key::new(100);
    let hi = U64Key::new(110);
    let got: Vec<u64> = t.scan(Some(&lo), Some(&hi)).map(|(k, _)| k.0).collect();
    let expected: Vec<u64> = (100..110).filter(|k| k % 3 != 0).collect();
    assert_eq!(got, expected);
}

#[test]
fn s8_insert_remove_reinsert_cycles_do_not_corrupt_the_tree() {
    init_tracing();
    let mut t: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    for round in 0..5u64 {
        for k in 0..300u64 {
            t.put(U64Key::new(k), vec![round as u8]).unwrap();
        }
        for k in 0..300u64 {
            assert_eq!(t.get(&U64Key::new(k)), Some(vec![round as u8]));
            t.remove(&U64Key::new(k)).unwrap();
        }
        for k in 0..300u64 {
            assert_eq!(t.get(&U64Key::new(k)), None);
        }
    }
}
