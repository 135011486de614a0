//! Shared helpers for multi-rank integration tests.
//!
//! Tests run as SPMD bodies over the in-process `LocalComm` backend: one
//! thread per rank, collectives meeting at the world barrier. Assertions
//! happen on the collected per-rank results where possible, so a failing
//! rank does not leave the others stuck on a barrier.
#![allow(dead_code)]

use std::sync::Arc;
use std::thread;

use cellflow::comm::{LocalComm, LocalWorld};
use cellflow::partition::{
    make_partitioner, CornerShift, NoParticles, Partitioner, PartitionerKind,
};

/// Run `f` as the SPMD body on `ranks` in-process ranks; results are
/// indexed by rank.
pub fn run_spmd<T, F>(ranks: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(LocalComm) -> T + Send + Sync + 'static,
{
    let world = LocalWorld::new(ranks);
    let f = Arc::new(f);
    let handles: Vec<_> = world
        .communicators()
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            thread::spawn(move || (*f)(comm))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}

/// Factory-built partitioner over a cubic box with unit minimum cell.
pub fn build_partitioner(comm: LocalComm, box_len: f64) -> Box<dyn Partitioner> {
    make_partitioner(
        PartitionerKind::GridPointShift,
        Arc::new(comm),
        [box_len; 3],
        1.0,
        Arc::new(NoParticles),
    )
    .expect("partitioner construction failed")
}

/// Concrete grid-based partitioner, for tests that inspect the corner state.
pub fn build_corner_shift(comm: LocalComm, box_len: f64) -> CornerShift {
    CornerShift::new(Arc::new(comm), [box_len; 3], 1.0, Arc::new(NoParticles))
        .expect("partitioner construction failed")
}

/// Ghost exchange descriptors with local indices translated back to global
/// cell ids, so they can be compared across ranks.
pub fn boundary_in_global_ids(p: &dyn Partitioner) -> Vec<(usize, Vec<usize>, Vec<usize>)> {
    p.boundary_info()
        .iter()
        .map(|e| {
            (
                e.dest,
                e.send.iter().map(|&i| p.global_cell(i)).collect(),
                e.recv.iter().map(|&i| p.global_cell(i)).collect(),
            )
        })
        .collect()
}

/// Midpoint of global cell `g`, reconstructed from the public geometry.
pub fn midpoint(p: &dyn Partitioner, g: usize) -> [f64; 3] {
    let grid = p.grid_size();
    let cs = p.cell_size();
    let c = [(g / grid[2]) / grid[1], (g / grid[2]) % grid[1], g % grid[2]];
    [
        (c[0] as f64 + 0.5) * cs[0],
        (c[1] as f64 + 0.5) * cs[1],
        (c[2] as f64 + 0.5) * cs[2],
    ]
}

/// Global ids of the local cells of `p`, in local index order.
pub fn local_cells(p: &dyn Partitioner) -> Vec<usize> {
    (0..p.n_local_cells()).map(|i| p.global_cell(i)).collect()
}
