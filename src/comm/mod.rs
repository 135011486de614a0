//! Message-passing abstraction for the SPMD partitioner.
//!
//! Provides a trait covering the collectives the partitioner needs (world
//! all-gather, sum reduction, neighborhood all-gather) and an in-process
//! multi-rank implementation. An MPI implementation is available behind the
//! `distributed` feature flag.

pub mod local;
#[cfg(feature = "distributed")]
pub mod mpi;

pub use local::{LocalComm, LocalWorld};

/// Abstraction over inter-rank communication.
///
/// All methods are collective: every rank of the world must call them in the
/// same order. Implementations: `LocalComm` (threads), `MpiComm` (via the
/// mpi crate).
pub trait Communicator: Send + Sync {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Gather one point from every rank; result is indexed by rank.
    fn allgather_point(&self, local: [f64; 3]) -> Vec<[f64; 3]>;

    /// Sum a local integer across all ranks.
    fn allreduce_sum_i64(&self, local: i64) -> i64;

    /// Exchange a fixed-size block of doubles with each rank in `neighbors`;
    /// the result holds one block per neighbor, in neighbor-list order.
    ///
    /// `neighbors` describes the (undirected, self-free) neighborhood graph
    /// for this call. Passing it per call lets the caller change the graph
    /// between repartitions without retained communicator state.
    fn neighbor_allgather(&self, neighbors: &[usize], local: &[f64]) -> Vec<Vec<f64>>;

    /// Synchronization barrier.
    fn barrier(&self);
}
