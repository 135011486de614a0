//! Uniform global cell grid over the periodic simulation box.
//!
//! The box is tiled with the largest cell count per axis that keeps the
//! cell edge at or above the caller's minimum, so cells are as small as
//! allowed. Cells carry one integer global index each; ownership decisions
//! elsewhere are always based on the cell midpoint.

use crate::error::{CellflowError, Result};

/// Static geometry of the global cell grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalBox {
    box_l: [f64; 3],
    grid: [usize; 3],
    cell_size: [f64; 3],
}

impl GlobalBox {
    /// Tile `box_l` with cells of edge at least `min_cell_size` per axis.
    pub fn new(box_l: [f64; 3], min_cell_size: f64) -> Result<Self> {
        if min_cell_size <= 0.0 {
            return Err(CellflowError::Config(format!(
                "minimum cell size must be positive, got {min_cell_size}"
            )));
        }
        let mut grid = [0usize; 3];
        let mut cell_size = [0.0f64; 3];
        for d in 0..3 {
            if box_l[d] <= 0.0 {
                return Err(CellflowError::Config(format!(
                    "box length must be positive, got {} on axis {d}",
                    box_l[d]
                )));
            }
            grid[d] = (box_l[d] / min_cell_size).floor() as usize;
            if grid[d] == 0 {
                return Err(CellflowError::Config(format!(
                    "box length {} on axis {d} cannot fit a cell of size {min_cell_size}",
                    box_l[d]
                )));
            }
            cell_size[d] = box_l[d] / grid[d] as f64;
        }
        Ok(Self {
            box_l,
            grid,
            cell_size,
        })
    }

    /// Total number of cells.
    pub fn ncells(&self) -> usize {
        self.grid[0] * self.grid[1] * self.grid[2]
    }

    pub fn grid_size(&self) -> [usize; 3] {
        self.grid
    }

    pub fn cell_size(&self) -> [f64; 3] {
        self.cell_size
    }

    pub fn box_size(&self) -> [f64; 3] {
        self.box_l
    }

    /// Smallest cell edge over the three axes.
    pub fn min_cell_edge(&self) -> f64 {
        self.cell_size[0].min(self.cell_size[1]).min(self.cell_size[2])
    }

    /// Row-major linearization of a cell coordinate triple.
    pub fn linearize(&self, c: [usize; 3]) -> usize {
        (c[0] * self.grid[1] + c[1]) * self.grid[2] + c[2]
    }

    /// Inverse of `linearize`.
    pub fn unlinearize(&self, g: usize) -> [usize; 3] {
        [
            (g / self.grid[2]) / self.grid[1],
            (g / self.grid[2]) % self.grid[1],
            g % self.grid[2],
        ]
    }

    /// Midpoint of cell `g` in world coordinates.
    pub fn midpoint(&self, g: usize) -> [f64; 3] {
        let c = self.unlinearize(g);
        [
            (c[0] as f64 + 0.5) * self.cell_size[0],
            (c[1] as f64 + 0.5) * self.cell_size[1],
            (c[2] as f64 + 0.5) * self.cell_size[2],
        ]
    }

    /// Global index of the cell containing `pos`, with periodic wrap.
    pub fn cell_at_pos(&self, pos: [f64; 3]) -> usize {
        let mut c = [0usize; 3];
        for d in 0..3 {
            let wrapped = pos[d].rem_euclid(self.box_l[d]);
            c[d] = ((wrapped / self.cell_size[d]) as usize).min(self.grid[d] - 1);
        }
        self.linearize(c)
    }

    /// The `k`-th cell of the 26-shell around `g`, periodically wrapped.
    ///
    /// Shell directions are enumerated in a fixed order: offset components
    /// run -1..=1 with x outermost and z innermost, skipping (0, 0, 0).
    pub fn neighbor(&self, g: usize, k: usize) -> usize {
        debug_assert!(k < 26);
        let e = if k < 13 { k } else { k + 1 };
        let off = [
            (e / 9) as i64 - 1,
            ((e / 3) % 3) as i64 - 1,
            (e % 3) as i64 - 1,
        ];
        let c = self.unlinearize(g);
        let mut nc = [0usize; 3];
        for d in 0..3 {
            let n = self.grid[d] as i64;
            nc[d] = (c[d] as i64 + off[d]).rem_euclid(n) as usize;
        }
        self.linearize(nc)
    }

    /// All 26 shell cells of `g` in the fixed enumeration order.
    pub fn full_shell_neigh_without_center(&self, g: usize) -> [usize; 26] {
        let mut shell = [0usize; 26];
        for (k, slot) in shell.iter_mut().enumerate() {
            *slot = self.neighbor(g, k);
        }
        shell
    }
}
