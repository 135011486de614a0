//! Domain decomposition of a periodic 3D cell grid over P ranks.
//!
//! The `Partitioner` trait is the surface the surrounding simulation talks
//! to: cell counts, neighbor ranks, ghost-exchange descriptors, position
//! resolution, and runtime repartitioning. Partitioner variants implement
//! the trait and are constructed through `make_partitioner`; the grid-based
//! corner-displacement variant (`CornerShift`) is the one shipped here.

pub mod corner_shift;
pub mod globox;
pub mod hexahedron;
pub mod topology;

use std::sync::Arc;

use crate::comm::Communicator;
use crate::error::Result;

pub use corner_shift::CornerShift;
pub use globox::GlobalBox;
pub use hexahedron::Hexahedron;
pub use topology::CartesianTopology;

/// Per-neighbor ghost communication descriptor.
///
/// `send` holds local cell indices whose contents this rank sends to
/// `dest`; `recv` holds ghost indices filled from `dest`. Both are sorted
/// by global cell index before translation to local indices, so the k-th
/// entry of `send` on one side pairs with the k-th entry of `recv` on the
/// other without any index payload on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostExchangeDesc {
    pub dest: usize,
    pub send: Vec<usize>,
    pub recv: Vec<usize>,
}

/// Read-only view of the particles living on this rank; consulted only for
/// the center-of-load during repartitioning.
pub trait ParticleStore: Send + Sync {
    fn positions(&self) -> Vec<[f64; 3]>;
}

/// Particle store for cell-only simulations: always empty, which makes the
/// center of load fall back to the mean local cell midpoint.
pub struct NoParticles;

impl ParticleStore for NoParticles {
    fn positions(&self) -> Vec<[f64; 3]> {
        Vec::new()
    }
}

/// Operations a partitioner variant offers to the surrounding simulation.
pub trait Partitioner {
    fn n_local_cells(&self) -> usize;
    fn n_ghost_cells(&self) -> usize;
    fn n_neighbors(&self) -> usize;
    fn neighbor_rank(&self, i: usize) -> usize;

    /// Dense local/ghost index of the `k`-th 26-shell neighbor of local
    /// cell `cell`.
    fn cell_neighbor_index(&self, cell: usize, k: usize) -> usize;

    /// Ghost exchange descriptors, one per neighbor rank.
    fn boundary_info(&self) -> &[GhostExchangeDesc];

    /// Global cell id behind a dense local or ghost index.
    fn global_cell(&self, idx: usize) -> usize;

    fn position_to_rank(&self, pos: [f64; 3]) -> Result<usize>;
    fn position_to_cell_index(&self, pos: [f64; 3]) -> Result<usize>;
    fn position_to_neighidx(&self, pos: [f64; 3]) -> Result<usize>;

    /// Recompute the decomposition from the current load. Returns
    /// `Ok(true)` if the new grid was accepted and committed, `Ok(false)`
    /// if it was rejected and rolled back. Collective: every rank must
    /// call this with a consistent metric.
    fn repartition(
        &mut self,
        metric: &dyn Fn() -> Vec<f64>,
        exchange_start_callback: &mut dyn FnMut(),
    ) -> Result<bool>;

    fn cell_size(&self) -> [f64; 3];
    fn grid_size(&self) -> [usize; 3];

    /// Parse a runtime command (currently `mu = <float>`); unknown commands
    /// are ignored.
    fn command(&mut self, s: &str);
}

/// Partitioner variants selectable at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionerKind {
    /// Begau–Sutmann grid-point displacement over a virtual Cartesian
    /// process grid.
    GridPointShift,
}

/// Build a partitioner of the requested kind. To be called on every rank.
pub fn make_partitioner(
    kind: PartitionerKind,
    comm: Arc<dyn Communicator>,
    box_l: [f64; 3],
    min_cell_size: f64,
    particles: Arc<dyn ParticleStore>,
) -> Result<Box<dyn Partitioner>> {
    match kind {
        PartitionerKind::GridPointShift => Ok(Box::new(CornerShift::new(
            comm,
            box_l,
            min_cell_size,
            particles,
        )?)),
    }
}
