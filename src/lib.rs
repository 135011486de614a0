//! Adaptive domain decomposition for periodic 3D cell grids.
//!
//! Space is a periodic box tiled by a uniform cell grid; P ranks own the
//! cells, each holding a contiguous-ish subdomain plus a one-layer ghost
//! halo. Subdomains are shaped by eight corner grid points on a virtual
//! Cartesian process grid, and the decomposition is rebalanced at runtime
//! by displacing corners toward regions of lower load (grid-point
//! displacement after Begau and Sutmann).
//!
//! The crate is built for an SPMD message-passing model: one process (or
//! thread) per rank, collectives behind the [`comm::Communicator`] trait.
//! `comm::LocalComm` runs P ranks as threads of one process; an MPI
//! backend is available behind the `distributed` feature flag.
//!
//! Entry point: [`partition::make_partitioner`], which returns the
//! [`partition::Partitioner`] operations — cell counts, ghost exchange
//! descriptors, position resolution, and `repartition`.

pub mod comm;
pub mod command;
pub mod error;
pub mod partition;
pub mod stats;

pub use error::{CellflowError, Result};
pub use partition::{
    make_partitioner, CornerShift, GhostExchangeDesc, NoParticles, ParticleStore, Partitioner,
    PartitionerKind,
};
