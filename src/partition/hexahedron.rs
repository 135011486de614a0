//! Point-in-region predicate for an 8-corner subdomain.
//!
//! A subdomain is the (generally non-convex, bilinearly warped) hexahedron
//! spanned by eight grid points. The predicate tetrahedralizes it around the
//! body centroid and the six face centroids: 4 tetrahedra per face, 24 in
//! total. Two regions built from the same corner table share their face
//! corner quadruples, hence the same face centroids and the same triangle
//! fans on the common face, so the union of all regions covers the box with
//! at most measure-zero overlap.
//!
//! Corner `i` carries the 3-bit offset `(ox, oy, oz)` with
//! `i = ox*4 + oy*2 + oz`; bit 1 means the lower side along that axis.

/// Relative tolerance for the signed-volume sub-tests; points this close to
/// a face count as contained on both sides.
const EPS_REL: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tetrahedron {
    verts: [[f64; 3]; 4],
    volume: f64,
}

impl Tetrahedron {
    fn new(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> Self {
        let mut verts = [a, b, c, d];
        let mut volume = orient(a, b, c, d);
        if volume < 0.0 {
            verts.swap(0, 1);
            volume = -volume;
        }
        Self { verts, volume }
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        if self.volume <= f64::MIN_POSITIVE {
            return false;
        }
        let [a, b, c, d] = self.verts;
        let tol = -EPS_REL * self.volume;
        orient(p, b, c, d) >= tol
            && orient(a, p, c, d) >= tol
            && orient(a, b, p, d) >= tol
            && orient(a, b, c, p) >= tol
    }
}

/// Signed volume (times 6) of the tetrahedron (a, b, c, d).
fn orient(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let u = sub(b, a);
    let v = sub(c, a);
    let w = sub(d, a);
    u[0] * (v[1] * w[2] - v[2] * w[1]) - u[1] * (v[0] * w[2] - v[2] * w[0])
        + u[2] * (v[0] * w[1] - v[1] * w[0])
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// One subdomain region, ready for point queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Hexahedron {
    tets: Vec<Tetrahedron>,
}

impl Hexahedron {
    pub fn new(corners: [[f64; 3]; 8]) -> Self {
        let center = centroid(&corners);

        let mut tets = Vec::with_capacity(24);
        for axis in 0..3 {
            for side in 0..2 {
                let quad = face_quad(axis, side);
                let fc = centroid(&[
                    corners[quad[0]],
                    corners[quad[1]],
                    corners[quad[2]],
                    corners[quad[3]],
                ]);
                for e in 0..4 {
                    let a = corners[quad[e]];
                    let b = corners[quad[(e + 1) % 4]];
                    tets.push(Tetrahedron::new(a, b, fc, center));
                }
            }
        }
        Self { tets }
    }

    /// Whether `p` lies inside this region. Points exactly on a shared face
    /// may be claimed by both adjacent regions.
    pub fn contains(&self, p: [f64; 3]) -> bool {
        self.tets.iter().any(|t| t.contains(p))
    }
}

/// The four corner indices of the face with `bit(axis) == side`, in cyclic
/// perimeter order. Adjacent hexahedra enumerate the same four corners for
/// their shared face.
fn face_quad(axis: usize, side: usize) -> [usize; 4] {
    let (u, w) = match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let cycle = [(0, 0), (0, 1), (1, 1), (1, 0)];
    let mut quad = [0usize; 4];
    for (slot, (bu, bw)) in quad.iter_mut().zip(cycle) {
        let mut bits = [0usize; 3];
        bits[axis] = side;
        bits[u] = bu;
        bits[w] = bw;
        *slot = bits[0] * 4 + bits[1] * 2 + bits[2];
    }
    quad
}

fn centroid<const N: usize>(pts: &[[f64; 3]; N]) -> [f64; 3] {
    let mut c = [0.0f64; 3];
    for p in pts {
        for d in 0..3 {
            c[d] += p[d];
        }
    }
    for v in &mut c {
        *v /= N as f64;
    }
    c
}
