//! Criterion benchmarks for the belt simulation.
//!
//! Two benchmark groups:
//! - `long_chain`: one 200-belt chain under steady feed -- measures the
//!   per-tick cost of movement and carry-over down a deep dependency chain.
//! - `many_chains`: 100 independent 8-belt chains -- measures tick cost when
//!   the update order spans many small groups.

use beltline_core::system::BeltSystem;
use beltline_core::test_utils::*;
use criterion::{criterion_group, criterion_main, Criterion};

// ===========================================================================
// Factory builders
// ===========================================================================

/// One deep chain, pre-loaded with an item every other belt.
fn build_long_chain(belts: usize) -> BeltSystem {
    let mut system = BeltSystem::new();
    let ids = chain(&mut system, belts, 1024, 256);
    for pair in ids.chunks(2) {
        system
            .insert_item(pair[0], iron(), 300)
            .expect("seed item fits");
    }
    system
}

/// Many short independent chains, each with a couple of items in flight.
fn build_many_chains(chains: usize, belts_per_chain: usize) -> BeltSystem {
    let mut system = BeltSystem::new();
    for _ in 0..chains {
        let ids = chain(&mut system, belts_per_chain, 1024, 256);
        system
            .insert_item(ids[0], iron(), 200)
            .expect("seed item fits");
        system
            .insert_item(ids[belts_per_chain / 2], copper(), 600)
            .expect("seed item fits");
    }
    system
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_long_chain(c: &mut Criterion) {
    let mut system = build_long_chain(200);
    c.bench_function("long_chain_tick", |b| {
        b.iter(|| {
            // Keep the head fed so carry-over stays on the hot path.
            let head = system.update_order().last().copied().unwrap();
            let _ = system.append_item(head, iron());
            system.tick();
        })
    });
}

fn bench_many_chains(c: &mut Criterion) {
    let mut system = build_many_chains(100, 8);
    c.bench_function("many_chains_tick", |b| {
        b.iter(|| system.tick())
    });
}

criterion_group!(benches, bench_long_chain, bench_many_chains);
criterion_main!(benches);
