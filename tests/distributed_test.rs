//! MPI-backed partitioner tests.
//!
//! These tests require MPI and the `distributed` feature flag.
//! Run with: mpirun -n 1 cargo test --features distributed --test distributed_test
//!
//! Without MPI installed, these tests are excluded from the default build.

#![cfg(feature = "distributed")]

use std::sync::Arc;

use cellflow::comm::mpi::MpiComm;
use cellflow::comm::Communicator;
use cellflow::partition::{make_partitioner, NoParticles, PartitionerKind};

#[test]
fn mpi_single_rank_decomposition() {
    // Run as a single MPI rank to verify the MPI backend works in the
    // degenerate single-process case.
    let _universe = mpi::initialize().expect("MPI init failed");
    let comm = MpiComm::new();
    assert_eq!(comm.size(), 1);

    let mut p = make_partitioner(
        PartitionerKind::GridPointShift,
        Arc::new(comm),
        [4.0, 4.0, 4.0],
        1.0,
        Arc::new(NoParticles),
    )
    .expect("construction failed");

    assert_eq!(p.n_local_cells(), 64);
    assert_eq!(p.n_ghost_cells(), 0);
    assert_eq!(p.n_neighbors(), 0);
    assert!(p.boundary_info().is_empty());

    let n = p.n_local_cells();
    let accepted = p
        .repartition(&(move || vec![1.0; n]), &mut || {})
        .expect("repartition failed");
    assert!(accepted);
    assert_eq!(p.n_local_cells(), 64);
}
