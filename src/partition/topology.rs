//! Virtual periodic 3D process grid.
//!
//! Maps ranks onto a `(Px, Py, Pz)` Cartesian grid derived from the process
//! count and the box aspect, and enumerates the deduplicated 26-neighborhood
//! of a rank. Because the process grid is periodic, a rank can appear as a
//! neighbor along several wrap directions; the public neighbor list keeps
//! each distinct rank once, in first-seen order.

use std::collections::HashMap;

use crate::error::{CellflowError, Result};

#[derive(Debug, Clone)]
pub struct CartesianTopology {
    dims: [usize; 3],
    rank: usize,
    coords: [usize; 3],
    neighbor_ranks: Vec<usize>,
    neighbor_idx: HashMap<usize, usize>,
}

impl CartesianTopology {
    /// Build the process grid for `nranks` processes over a box of extents
    /// `box_l`, from the perspective of `rank`.
    pub fn new(nranks: usize, box_l: [f64; 3], rank: usize) -> Result<Self> {
        let dims = derive_dims(nranks, box_l)?;
        debug_assert!(rank < nranks);
        let coords = [
            (rank / dims[2]) / dims[1],
            (rank / dims[2]) % dims[1],
            rank % dims[2],
        ];

        let mut topo = Self {
            dims,
            rank,
            coords,
            neighbor_ranks: Vec::new(),
            neighbor_idx: HashMap::new(),
        };
        topo.collect_neighbors();
        Ok(topo)
    }

    fn collect_neighbors(&mut self) {
        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                for dz in -1i64..=1 {
                    let r = self.rank_at_offset([dx, dy, dz]);
                    if r == self.rank {
                        continue;
                    }
                    if !self.neighbor_idx.contains_key(&r) {
                        self.neighbor_idx.insert(r, self.neighbor_ranks.len());
                        self.neighbor_ranks.push(r);
                    }
                }
            }
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn this_rank(&self) -> usize {
        self.rank
    }

    pub fn coords(&self) -> [usize; 3] {
        self.coords
    }

    /// Rank at integer coordinates, periodically wrapped per axis.
    pub fn rank_of(&self, c: [i64; 3]) -> usize {
        let mut w = [0usize; 3];
        for d in 0..3 {
            w[d] = c[d].rem_euclid(self.dims[d] as i64) as usize;
        }
        (w[0] * self.dims[1] + w[1]) * self.dims[2] + w[2]
    }

    pub fn coords_of(&self, rank: usize) -> [usize; 3] {
        [
            (rank / self.dims[2]) / self.dims[1],
            (rank / self.dims[2]) % self.dims[1],
            rank % self.dims[2],
        ]
    }

    /// Rank at this rank's coordinates shifted by `off`.
    pub fn rank_at_offset(&self, off: [i64; 3]) -> usize {
        self.rank_of([
            self.coords[0] as i64 + off[0],
            self.coords[1] as i64 + off[1],
            self.coords[2] as i64 + off[2],
        ])
    }

    /// Deduplicated 26-neighborhood of this rank, first-seen order.
    pub fn neighbor_ranks(&self) -> &[usize] {
        &self.neighbor_ranks
    }

    /// Index of `rank` in the neighbor list, if it is a neighbor.
    pub fn neighbor_index(&self, rank: usize) -> Option<usize> {
        self.neighbor_idx.get(&rank).copied()
    }

    /// Closed-form owner of a position under the regular axis-aligned split.
    pub fn rank_at_regular_pos(&self, pos: [f64; 3], box_l: [f64; 3]) -> usize {
        let mut c = [0i64; 3];
        for d in 0..3 {
            let width = box_l[d] / self.dims[d] as f64;
            c[d] = ((pos[d] / width) as i64).min(self.dims[d] as i64 - 1);
        }
        self.rank_of(c)
    }
}

/// Derive `(Px, Py, Pz)` with product `nranks`, assigning factors so that
/// longer box axes receive more processes. Deterministic on every rank.
fn derive_dims(nranks: usize, box_l: [f64; 3]) -> Result<[usize; 3]> {
    if nranks == 0 {
        return Err(CellflowError::Config("process count is zero".into()));
    }
    let mut factors = prime_factors(nranks);
    factors.sort_unstable_by(|a, b| b.cmp(a));

    let mut dims = [1usize; 3];
    for f in factors {
        // Give the factor to the axis that is currently coarsest.
        let mut best = 0;
        for d in 1..3 {
            if box_l[d] / dims[d] as f64 > box_l[best] / dims[best] as f64 {
                best = d;
            }
        }
        dims[best] *= f;
    }
    Ok(dims)
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}
