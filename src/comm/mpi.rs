//! MPI communication backend.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//! Implements `Communicator` using `mpi::traits::*`.
//!
//! The caller must initialize MPI before constructing `MpiComm`:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```
//!
//! The neighborhood exchange uses blocking send/recv with rank-based
//! ordering (the lower-ranked process sends first) to avoid deadlock.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// MPI-based communication backend.
///
/// Wraps the MPI world communicator. Requires `mpi::initialize()` to have
/// been called before construction.
pub struct MpiComm;

impl MpiComm {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

// Qualified path: `mpi::traits` exports its own `Communicator` trait.
impl super::Communicator for MpiComm {
    fn rank(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.rank() as usize
    }

    fn size(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.size() as usize
    }

    fn allgather_point(&self, local: [f64; 3]) -> Vec<[f64; 3]> {
        let world = SimpleCommunicator::world();
        let mut flat = vec![0.0f64; 3 * world.size() as usize];
        world.all_gather_into(&local[..], &mut flat[..]);
        flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
    }

    fn allreduce_sum_i64(&self, local: i64) -> i64 {
        let world = SimpleCommunicator::world();
        let mut global = 0i64;
        world.all_reduce_into(&local, &mut global, SystemOperation::sum());
        global
    }

    fn neighbor_allgather(&self, neighbors: &[usize], local: &[f64]) -> Vec<Vec<f64>> {
        let world = SimpleCommunicator::world();
        let my_rank = world.rank();

        let mut blocks = Vec::with_capacity(neighbors.len());
        for &nbr in neighbors {
            let peer = world.process_at_rank(nbr as i32);
            let mut recv = vec![0.0f64; local.len()];

            if my_rank < nbr as i32 {
                peer.send(local);
                peer.receive_into(&mut recv[..]);
            } else {
                peer.receive_into(&mut recv[..]);
                peer.send(local);
            }
            blocks.push(recv);
        }
        blocks
    }

    fn barrier(&self) {
        let world = SimpleCommunicator::world();
        world.barrier();
    }
}
