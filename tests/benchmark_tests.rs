//! Performance benchmarks for the hot paths of claim handling

use assert_approx_eq::assert_approx_eq;
use client::reconciler::{ClientGrid, LocalIdentity};
use server::grid::GridStore;
use shared::{color_for, hue_for, Cell, CellKey, COLS, GOLDEN_ANGLE_DEG, ROWS};
use std::time::Instant;

/// Benchmarks conflict-checked grid writes
#[test]
fn benchmark_grid_apply() {
    let mut grid = GridStore::new(ROWS, COLS);
    let iterations = 100_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        let key = CellKey::new((i as usize) % ROWS, (i as usize / ROWS) % COLS);
        grid.apply(key, Cell::claimed(key, "bench", "#123456", i + 1));
    }

    let duration = start.elapsed();
    println!(
        "Grid apply: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(grid.claimed_count(), ROWS * COLS);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks color derivation for fresh identities
#[test]
fn benchmark_color_derivation() {
    let ids: Vec<String> = (0..10_000).map(|i| format!("participant-{}", i)).collect();
    let start = Instant::now();

    for id in &ids {
        let _ = color_for(id);
    }

    let duration = start.elapsed();
    println!(
        "Color derivation: {} ids in {:?} ({:.2} ns/id)",
        ids.len(),
        duration,
        duration.as_nanos() as f64 / ids.len() as f64
    );

    assert_approx_eq!(
        hue_for(&ids[0]),
        (shared::fnv1a(&ids[0]) as f64 * GOLDEN_ANGLE_DEG) % 360.0,
        1e-9
    );
    assert!(duration.as_millis() < 500);
}

/// Benchmarks snapshot building on a fully claimed grid
#[test]
fn benchmark_snapshot() {
    let mut grid = GridStore::new(ROWS, COLS);
    for row in 0..ROWS {
        for col in 0..COLS {
            let key = CellKey::new(row, col);
            grid.apply(key, Cell::claimed(key, "owner", "#654321", 1));
        }
    }

    let iterations = 1_000;
    let start = Instant::now();
    let mut total = 0;
    for _ in 0..iterations {
        total += grid.get_all().len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(total, iterations * ROWS * COLS);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client-side reconciliation of pushed updates
#[test]
fn benchmark_client_reconcile() {
    let mut grid = ClientGrid::new(ROWS, COLS, LocalIdentity::provisional("bench"));
    let iterations = 100_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        let key = CellKey::new((i as usize) % ROWS, (i as usize * 7) % COLS);
        grid.apply_update(Cell::claimed(key, "remote", "#abcdef", i));
    }

    let duration = start.elapsed();
    println!(
        "Client reconcile: {} updates in {:?} ({:.2} ns/update)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
