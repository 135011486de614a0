//! Grid-based adaptive partitioner.
//!
//! Every rank owns one corner grid point of a virtual Cartesian process
//! grid; a subdomain is the hexahedral region spanned by the eight corners
//! around it. Repartitioning displaces each rank's corner toward the load,
//! following C. Begau, G. Sutmann, Comp. Phys. Comm. 190 (2015), p. 51-61:
//! heavier neighbors pull the corner toward their center of load, lighter
//! ones push it away. A displaced grid that would pinch subdomains below
//! one cell of clearance is rejected collectively and rolled back.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::comm::Communicator;
use crate::command;
use crate::error::{CellflowError, Result};

use super::{
    CartesianTopology, GhostExchangeDesc, GlobalBox, Hexahedron, ParticleStore, Partitioner,
};

/// Interior grid points sit this far below the subdomain face they define,
/// so cell midpoints on the initial regular grid never coincide with a
/// subdomain face.
const CORNER_BIAS: f64 = 1e-6;

pub struct CornerShift {
    comm: Arc<dyn Communicator>,
    particles: Arc<dyn ParticleStore>,
    gbox: GlobalBox,
    topo: CartesianTopology,

    /// Corner displacement step size; runtime-tunable via `mu = <float>`.
    mu: f64,
    /// True until the first accepted repartition that actually moved a
    /// corner; enables the closed-form position resolution.
    is_regular_grid: bool,
    /// The corner grid point owned by this rank.
    gridpoint: [f64; 3],
    /// Replicated corner table of all ranks, refreshed by all-gather.
    gridpoints: Vec<[f64; 3]>,

    my_region: Hexahedron,
    neighbor_regions: Vec<Hexahedron>,

    /// Local cells first (ascending global index), then ghosts in
    /// first-discovery order.
    cells: Vec<usize>,
    global_to_local: HashMap<usize, usize>,
    n_local: usize,
    n_ghost: usize,
    exchange: Vec<GhostExchangeDesc>,
}

impl CornerShift {
    /// Build the initial regular decomposition. Collective.
    pub fn new(
        comm: Arc<dyn Communicator>,
        box_l: [f64; 3],
        min_cell_size: f64,
        particles: Arc<dyn ParticleStore>,
    ) -> Result<Self> {
        let gbox = GlobalBox::new(box_l, min_cell_size)?;
        let topo = CartesianTopology::new(comm.size(), box_l, comm.rank())?;

        let dims = topo.dims();
        let coords = topo.coords();
        let mut gridpoint = [0.0f64; 3];
        for d in 0..3 {
            gridpoint[d] = if coords[d] + 1 == dims[d] {
                box_l[d]
            } else {
                (coords[d] + 1) as f64 * box_l[d] / dims[d] as f64
            };
            if gridpoint[d] < box_l[d] {
                gridpoint[d] -= CORNER_BIAS;
            }
        }

        let gridpoints = comm.allgather_point(gridpoint);
        let my_region = region_of(&topo, &gridpoints, box_l, topo.this_rank());
        let neighbor_regions = topo
            .neighbor_ranks()
            .iter()
            .map(|&r| region_of(&topo, &gridpoints, box_l, r))
            .collect();

        let mut partitioner = Self {
            comm,
            particles,
            gbox,
            topo,
            mu: 1.0,
            is_regular_grid: true,
            gridpoint,
            gridpoints,
            my_region,
            neighbor_regions,
            cells: Vec::new(),
            global_to_local: HashMap::new(),
            n_local: 0,
            n_ghost: 0,
            exchange: Vec::new(),
        };
        partitioner.rebuild()?;

        tracing::info!(
            rank = partitioner.topo.this_rank(),
            dims = ?partitioner.topo.dims(),
            grid = ?partitioner.gbox.grid_size(),
            n_local = partitioner.n_local,
            n_ghost = partitioner.n_ghost,
            "initial decomposition built"
        );
        Ok(partitioner)
    }

    /// Current corner displacement step size.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Whether the decomposition still equals the regular axis-aligned split.
    pub fn is_regular_grid(&self) -> bool {
        self.is_regular_grid
    }

    /// This rank's corner grid point.
    pub fn gridpoint(&self) -> [f64; 3] {
        self.gridpoint
    }

    fn corner_table(&self, rank: usize) -> [[f64; 3]; 8] {
        corner_table(&self.topo, &self.gridpoints, self.gbox.box_size(), rank)
    }

    /// Rebuild the region predicates from the replicated corner table.
    fn sync_regions(&mut self) {
        self.my_region = Hexahedron::new(self.corner_table(self.topo.this_rank()));
        self.neighbor_regions = self
            .topo
            .neighbor_ranks()
            .iter()
            .map(|&r| Hexahedron::new(self.corner_table(r)))
            .collect();
    }

    /// Owner of a cell, resolved through the cell midpoint.
    fn cell_owner(&self, g: usize) -> Result<usize> {
        self.resolve_rank(self.gbox.midpoint(g))
    }

    fn resolve_rank(&self, pos: [f64; 3]) -> Result<usize> {
        // Ownership is based on cell midpoints, so resolve through the
        // midpoint of the cell containing `pos` rather than `pos` itself.
        let mp = self.gbox.midpoint(self.gbox.cell_at_pos(pos));

        if self.is_regular_grid {
            return Ok(self.topo.rank_at_regular_pos(mp, self.gbox.box_size()));
        }

        if self.my_region.contains(mp) {
            return Ok(self.topo.this_rank());
        }
        for (i, region) in self.neighbor_regions.iter().enumerate() {
            if region.contains(mp) {
                return Ok(self.topo.neighbor_ranks()[i]);
            }
        }
        Err(CellflowError::OutOfNeighborhood(pos[0], pos[1], pos[2]))
    }

    /// Recompute local cells, ghosts and exchange descriptors from the
    /// current regions. Idempotent for a fixed corner table.
    fn rebuild(&mut self) -> Result<()> {
        let rank = self.topo.this_rank();
        let _span = tracing::debug_span!("rebuild", rank).entered();

        let gbox = &self.gbox;
        let region = &self.my_region;
        self.cells = (0..gbox.ncells())
            .into_par_iter()
            .filter(|&g| region.contains(gbox.midpoint(g)))
            .collect();
        self.n_local = self.cells.len();
        if self.n_local == 0 {
            return Err(CellflowError::EmptySubdomain(rank));
        }
        self.global_to_local = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, i))
            .collect();

        self.n_ghost = 0;
        self.exchange = self
            .topo
            .neighbor_ranks()
            .iter()
            .map(|&dest| GhostExchangeDesc {
                dest,
                send: Vec::new(),
                recv: Vec::new(),
            })
            .collect();

        for i in 0..self.n_local {
            let cell = self.cells[i];
            for g in self.gbox.full_shell_neigh_without_center(cell) {
                let owner = self.cell_owner(g)?;
                if owner == rank {
                    continue;
                }

                if !self.global_to_local.contains_key(&g) {
                    self.cells.push(g);
                    self.global_to_local.insert(g, self.n_local + self.n_ghost);
                    self.n_ghost += 1;
                }

                let idx = self
                    .topo
                    .neighbor_index(owner)
                    .ok_or(CellflowError::InconsistentNeighbor(owner))?;
                let entry = &mut self.exchange[idx];
                if !entry.recv.contains(&g) {
                    entry.recv.push(g);
                }
                if !entry.send.contains(&cell) {
                    entry.send.push(cell);
                }
            }
        }

        // Canonical order: sort by global index, then translate to local
        // indices. Both sides of a link sort the same global ids, so the
        // k-th send entry here pairs with the k-th recv entry there.
        for entry in &mut self.exchange {
            if entry.recv.is_empty() || entry.send.is_empty() {
                return Err(CellflowError::InconsistentNeighbor(entry.dest));
            }
            entry.recv.sort_unstable();
            entry.send.sort_unstable();
            for v in entry.recv.iter_mut().chain(entry.send.iter_mut()) {
                *v = self.global_to_local[v];
            }
        }

        tracing::debug!(n_local = self.n_local, n_ghost = self.n_ghost, "decomposition rebuilt");
        Ok(())
    }

    /// Mean particle position of this subdomain; mean local cell midpoint
    /// when no particles exist.
    fn center_of_load(&self) -> [f64; 3] {
        let mut c = [0.0f64; 3];
        let mut n = 0usize;
        for p in self.particles.positions() {
            for d in 0..3 {
                c[d] += p[d];
            }
            n += 1;
        }
        if n == 0 {
            for &g in &self.cells[..self.n_local] {
                let mp = self.gbox.midpoint(g);
                for d in 0..3 {
                    c[d] += mp[d];
                }
                n += 1;
            }
        }
        for v in &mut c {
            *v /= n as f64;
        }
        c
    }
}

/// Corner table of `rank`'s subdomain: the grid points of the ranks at
/// coordinate offsets {0,1}^3 below it, mirrored across the periodic
/// boundary where the offset wrapped.
fn corner_table(
    topo: &CartesianTopology,
    gridpoints: &[[f64; 3]],
    box_l: [f64; 3],
    rank: usize,
) -> [[f64; 3]; 8] {
    let c = topo.coords_of(rank);
    let dims = topo.dims();
    let mut corners = [[0.0f64; 3]; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let off = [i >> 2 & 1, i >> 1 & 1, i & 1];
        let mut nc = [0i64; 3];
        let mut mirror = [0.0f64; 3];
        for d in 0..3 {
            nc[d] = c[d] as i64 - off[d] as i64;
            if nc[d] < 0 {
                nc[d] = dims[d] as i64 - 1;
                mirror[d] = -1.0;
            }
        }
        let owner = topo.rank_of(nc);
        for d in 0..3 {
            corner[d] = gridpoints[owner][d] + mirror[d] * box_l[d];
        }
    }
    corners
}

fn region_of(
    topo: &CartesianTopology,
    gridpoints: &[[f64; 3]],
    box_l: [f64; 3],
    rank: usize,
) -> Hexahedron {
    Hexahedron::new(corner_table(topo, gridpoints, box_l, rank))
}

fn dist(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

impl Partitioner for CornerShift {
    fn n_local_cells(&self) -> usize {
        self.n_local
    }

    fn n_ghost_cells(&self) -> usize {
        self.n_ghost
    }

    fn n_neighbors(&self) -> usize {
        self.topo.neighbor_ranks().len()
    }

    fn neighbor_rank(&self, i: usize) -> usize {
        self.topo.neighbor_ranks()[i]
    }

    fn cell_neighbor_index(&self, cell: usize, k: usize) -> usize {
        debug_assert!(cell < self.n_local);
        self.global_to_local[&self.gbox.neighbor(self.cells[cell], k)]
    }

    fn boundary_info(&self) -> &[GhostExchangeDesc] {
        &self.exchange
    }

    fn global_cell(&self, idx: usize) -> usize {
        self.cells[idx]
    }

    fn position_to_rank(&self, pos: [f64; 3]) -> Result<usize> {
        self.resolve_rank(pos)
    }

    fn position_to_cell_index(&self, pos: [f64; 3]) -> Result<usize> {
        if self.resolve_rank(pos)? != self.topo.this_rank() {
            return Err(CellflowError::NotLocal(pos[0], pos[1], pos[2]));
        }
        match self.global_to_local.get(&self.gbox.cell_at_pos(pos)) {
            Some(&i) if i < self.n_local => Ok(i),
            _ => Err(CellflowError::NotLocal(pos[0], pos[1], pos[2])),
        }
    }

    fn position_to_neighidx(&self, pos: [f64; 3]) -> Result<usize> {
        let rank = self.resolve_rank(pos)?;
        self.topo
            .neighbor_index(rank)
            .ok_or(CellflowError::OutOfNeighborhood(pos[0], pos[1], pos[2]))
    }

    fn repartition(
        &mut self,
        metric: &dyn Fn() -> Vec<f64>,
        exchange_start_callback: &mut dyn FnMut(),
    ) -> Result<bool> {
        let rank = self.topo.this_rank();
        let _span = tracing::debug_span!("repartition", rank).entered();

        let weights = metric();
        debug_assert_eq!(weights.len(), self.n_local);
        let lambda_p: f64 = weights.iter().sum();
        let r_p = self.center_of_load();

        // Exchange (load, center of load) over the neighborhood graph.
        // The graph carries no self-edge; this rank's own contribution is
        // appended locally, since the corner is shared with its own
        // subdomain as well.
        let neighbors = self.topo.neighbor_ranks().to_vec();
        let payload = [lambda_p, r_p[0], r_p[1], r_p[2]];
        let gathered = self.comm.neighbor_allgather(&neighbors, &payload);

        let mut lambda: Vec<f64> = gathered.iter().map(|b| b[0]).collect();
        let mut centers: Vec<[f64; 3]> = gathered.iter().map(|b| [b[1], b[2], b[3]]).collect();
        lambda.push(lambda_p);
        centers.push(r_p);

        let normalizer = lambda.iter().sum::<f64>() / lambda.len() as f64;

        let mut flow = [0.0f64; 3];
        if normalizer > 0.0 {
            for (l, r) in lambda.iter().zip(&centers) {
                let lambda_hat = l / normalizer;
                let u = [
                    r[0] - self.gridpoint[0],
                    r[1] - self.gridpoint[1],
                    r[2] - self.gridpoint[2],
                ];
                let len = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
                if len < f64::EPSILON {
                    continue;
                }
                let scale = (lambda_hat - 1.0) / len;
                for d in 0..3 {
                    flow[d] += scale * u[d];
                }
            }
        }

        // Corners on the global upper boundary stay pinned to preserve the
        // periodic tiling; flow across that boundary is ignored.
        let coords = self.topo.coords();
        let dims = self.topo.dims();
        let old_gridpoint = self.gridpoint;
        let old_gridpoints = self.gridpoints.clone();
        for d in 0..3 {
            if coords[d] == dims[d] - 1 {
                continue;
            }
            self.gridpoint[d] += self.mu * flow[d];
        }
        tracing::debug!(old = ?old_gridpoint, new = ?self.gridpoint, "corner displacement");

        self.gridpoints = self.comm.allgather_point(self.gridpoint);

        // Validity: every pair of corners of the new local region must keep
        // at least one cell of clearance, otherwise subdomains could pinch
        // down to nothing.
        let corners = self.corner_table(rank);
        let min_edge = self.gbox.min_cell_edge();
        let mut conflicts = 0i64;
        for i in 0..8 {
            for j in i + 1..8 {
                if dist(corners[i], corners[j]) < 2.0 * min_edge {
                    conflicts += 1;
                }
            }
        }

        let global_conflicts = self.comm.allreduce_sum_i64(conflicts);
        if global_conflicts > 0 {
            tracing::info!(
                conflicts = global_conflicts,
                "grid point update rejected, rolling back"
            );
            self.gridpoint = old_gridpoint;
            self.gridpoints = old_gridpoints;
            return Ok(false);
        }

        if self.gridpoints != old_gridpoints {
            self.is_regular_grid = false;
        }
        self.sync_regions();
        exchange_start_callback();
        self.rebuild()?;
        Ok(true)
    }

    fn cell_size(&self) -> [f64; 3] {
        self.gbox.cell_size()
    }

    fn grid_size(&self) -> [usize; 3] {
        self.gbox.grid_size()
    }

    fn command(&mut self, s: &str) {
        if let Some(mu) = command::parse_mu(s) {
            self.mu = mu;
            if self.topo.this_rank() == 0 {
                tracing::info!(mu, "step size updated");
            }
        }
    }
}
