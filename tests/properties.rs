//! Randomized model-based tests: a long sequence of put/remove/get/scan
//! operations is replayed against both [`foster_btree::BTree`] and a
//! plain `BTreeMap` oracle, with a fixed seed per case so a failure is
//! always reproducible.

use std::collections::BTreeMap;

use foster_btree::{BTree, U64Key};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Put(u64, u8),
    Remove(u64),
    Get(u64),
}

fn gen_ops(seed: u64, count: usize, key_space: u64) -> Vec<Op> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let key = rng.gen_range(0..key_space);
            match rng.gen_range(0..10) {
                0..=5 => Op::Put(key, rng.gen()),
                6..=8 => Op::Get(key),
                _ => Op::Remove(key),
            }
        })
        .collect()
}

fn run_against_oracle(ops: &[Op]) {
    let mut tree: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    let mut oracle: BTreeMap<u64, u8> = BTreeMap::new();

    for op in ops {
        match *op {
            Op::Put(k, v) => {
                let result = tree.put(U64Key::new(k), vec![v]);
                if oracle.contains_key(&k) {
                    assert!(result.is_err(), "tree accepted a duplicate put for key {k}");
                } else {
                    result.unwrap_or_else(|e| panic!("put({k}) failed unexpectedly: {e:?}"));
                    oracle.insert(k, v);
                }
            }
            Op::Remove(k) => {
                let result = tree.remove(&U64Key::new(k));
                assert_eq!(result.is_ok(), oracle.remove(&k).is_some(), "remove({k}) disagreed with the oracle");
            }
            Op::Get(k) => {
                let expected = oracle.get(&k).map(|v| vec![*v]);
                assert_eq!(tree.get(&U64Key::new(k)), expected, "get({k}) disagreed with the oracle");
            }
        }
    }

    for (k, v) in &oracle {
        assert_eq!(tree.get(&U64Key::new(*k)), Some(vec![*v]), "final state missing key {k}");
    }
    let scanned: Vec<(u64, u8)> = tree.scan(None, None).map(|(k, v)| (k.0, v[0])).collect();
    let expected: Vec<(u64, u8)> = oracle.iter().map(|(&k, &v)| (k, v)).collect();
    assert_eq!(scanned, expected, "full scan disagreed with the oracle's ascending order");
}

#[test]
fn property_small_key_space_forces_heavy_pmnk_collision() {
    init_tracing();
    for seed in 0..4u64 {
        run_against_oracle(&gen_ops(seed, 2000, 64));
    }
}

#[test]
fn property_medium_key_space_exercises_splits_merges_and_rebalances() {
    init_tracing();
    for seed in 0..4u64 {
        run_against_oracle(&gen_ops(seed + 100, 4000, 5000));
    }
}

#[test]
fn property_large_key_space_is_mostly_inserts() {
    init_tracing();
    for seed in 0..2u64 {
        run_against_oracle(&gen_ops(seed + 200, 3000, 1_000_000));
    }
}

#[test]
fn property_repeated_full_drain_and_refill() {
    init_tracing();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let mut tree: BTree<U64Key<u32>, Vec<u8>> = BTree::new();
    for round in 0..6u64 {
        let mut keys: Vec<u64> = (0..500u64).collect();
        for i in (1..keys.len()).rev() {
            let j = rng.gen_range(0..=i);
            keys.swap(i, j);
        }
        for &k in &keys {
            tree.put(U64Key::new(k), vec![round as u8]).unwrap();
        }
        for &k in &keys {
            assert_eq!(tree.get(&U64Key::new(k)), Some(vec![round as u8]));
            tree.remove(&U64Key::new(k)).unwrap();
        }
    }
    assert_eq!(tree.scan(None, None).count(), 0);
}
