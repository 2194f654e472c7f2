//! Delaunay triangulation of the planar projection of a point cloud.
//!
//! Built with a radial sweep: samples are inserted in order of distance
//! from a small seed triangle, each new sample lies outside the current
//! convex hull and is fanned onto the hull edges it can see, and every new
//! edge is legalized by flipping until its opposite vertices pass the
//! in-circle test. The result always covers the full convex hull.
//!
//! Point location goes through a uniform grid of triangle buckets, so both
//! construction and queries stay practical for meshes with millions of
//! vertices.

use std::collections::HashSet;

use glam::DVec2;

use crate::core::{Error, Result};

/// Relative tolerance used for point-in-triangle and area tests.
const EPSILON: f64 = 1e-10;

/// Relative error bound below which an orientation sign is not trusted.
const ORIENT_BOUND: f64 = 3.3306690738754716e-16;

/// Marks a missing half-edge or hull link.
const NONE: usize = usize::MAX;

/// Upper bound on the locator grid side.
const MAX_GRID_SIDE: usize = 2048;

/// Twice the signed area of `abc` (positive when counter-clockwise).
pub fn orient(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - a)
}

/// Orientation of `abc` evaluated around `a`, or 0 when rounding could
/// have flipped the sign.
fn orient_if_sure(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    let l = (b.x - a.x) * (c.y - a.y);
    let r = (b.y - a.y) * (c.x - a.x);
    if (l - r).abs() >= ORIENT_BOUND * (l + r).abs() {
        l - r
    } else {
        0.0
    }
}

/// Whether `abc` turns counter-clockwise, trying each vertex as the base
/// until the sign is certain.
fn is_ccw(a: DVec2, b: DVec2, c: DVec2) -> bool {
    [orient_if_sure(a, b, c), orient_if_sure(b, c, a), orient_if_sure(c, a, b)]
        .into_iter()
        .find(|d| *d != 0.0)
        .unwrap_or(0.0)
        > 0.0
}

/// Whether `p` lies strictly inside the circumcircle of the clockwise
/// triangle `abc`.
fn in_circle(a: DVec2, b: DVec2, c: DVec2, p: DVec2) -> bool {
    let (d, e, f) = (a - p, b - p, c - p);
    let (ap, bp, cp) = (d.length_squared(), e.length_squared(), f.length_squared());
    d.x * (e.y * cp - bp * f.y) - d.y * (e.x * cp - bp * f.x) + ap * (e.x * f.y - e.y * f.x) < 0.0
}

/// Squared circumradius of `abc`; infinite or NaN when collinear.
fn circumradius_sq(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    circumcenter(a, b, c).distance_squared(a)
}

fn circumcenter(a: DVec2, b: DVec2, c: DVec2) -> DVec2 {
    let (b, c) = (b - a, c - a);
    let (bl, cl) = (b.length_squared(), c.length_squared());
    let d = 0.5 / b.perp_dot(c);
    a + DVec2::new(c.y * bl - b.y * cl, b.x * cl - c.x * bl) * d
}

/// Monotone key in `[0, 1)` for the angle of `d` around the origin.
fn pseudo_angle(d: DVec2) -> f64 {
    let sum = d.x.abs() + d.y.abs();
    let p = if sum > 0.0 { d.x / sum } else { 0.0 };
    if d.y > 0.0 { (3.0 - p) / 4.0 } else { (1.0 + p) / 4.0 }
}

/// Counter-clockwise Delaunay triangulation of distinct planar points.
#[derive(Clone, Debug)]
pub struct Triangulation {
    points: Vec<DVec2>,
    sources: Vec<usize>,
    triangles: Vec<[usize; 3]>,
    locator: Locator,
}

impl Triangulation {
    /// Triangulate the given planar positions.
    ///
    /// Exact duplicates keep their first occurrence; `source(i)` maps a
    /// triangulation vertex back to its index in `positions`. Fails when
    /// fewer than three distinct, non-collinear positions remain.
    pub fn new(positions: &[DVec2]) -> Result<Self> {
        let mut seen = HashSet::with_capacity(positions.len());
        let mut points = Vec::with_capacity(positions.len());
        let mut sources = Vec::with_capacity(positions.len());

        for (i, p) in positions.iter().enumerate() {
            if !p.is_finite() {
                return Err(Error::Terrain(format!("sample {} has non-finite coordinates", i)));
            }
            if seen.insert((p.x.to_bits(), p.y.to_bits())) {
                points.push(*p);
                sources.push(i);
            }
        }

        let duplicates = positions.len() - points.len();
        if duplicates > 0 {
            log::warn!("Ignoring {} terrain samples with duplicate (x, y)", duplicates);
        }

        if points.len() < 3 {
            return Err(Error::Terrain(format!(
                "degenerate point cloud: {} distinct samples, need at least 3",
                points.len()
            )));
        }

        let triangles = Sweep::run(&points);
        if triangles.is_empty() {
            return Err(Error::Terrain(
                "degenerate point cloud: all samples are collinear".to_string(),
            ));
        }

        log::debug!(
            "Triangulated {} samples into {} triangles",
            points.len(),
            triangles.len()
        );

        let locator = Locator::new(&points, &triangles);
        Ok(Self { points, sources, triangles, locator })
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Index of the input position a vertex was created from.
    pub fn source(&self, vertex: usize) -> usize {
        self.sources[vertex]
    }

    pub fn triangle_points(&self, triangle: usize) -> [DVec2; 3] {
        self.triangles[triangle].map(|i| self.points[i])
    }

    /// Barycentric coordinates of `p` with respect to a triangle.
    pub fn barycentric(&self, triangle: usize, p: DVec2) -> [f64; 3] {
        let [a, b, c] = self.triangle_points(triangle);
        let area = orient(a, b, c);
        [
            orient(p, b, c) / area,
            orient(a, p, c) / area,
            orient(a, b, p) / area,
        ]
    }

    /// Find the triangle containing `p` (boundary inclusive).
    pub fn locate(&self, p: DVec2) -> Option<(usize, [f64; 3])> {
        self.locator.candidates(p)?.iter().find_map(|&t| {
            let [a, b, c] = self.triangle_points(t);
            if p.cmplt(a.min(b).min(c)).any() || p.cmpgt(a.max(b).max(c)).any() {
                return None;
            }
            let bary = self.barycentric(t, p);
            bary.iter().all(|&w| w >= -EPSILON).then_some((t, bary))
        })
    }
}

/// Uniform grid over the bounding box; each cell lists the triangles whose
/// bounding box overlaps it.
#[derive(Clone, Debug)]
struct Locator {
    min: DVec2,
    max: DVec2,
    cell: DVec2,
    nx: usize,
    ny: usize,
    buckets: Vec<Vec<usize>>,
}

impl Locator {
    fn new(points: &[DVec2], triangles: &[[usize; 3]]) -> Self {
        let (min, max) = points
            .iter()
            .fold((points[0], points[0]), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        let extent = (max - min).max(DVec2::splat(f64::MIN_POSITIVE));

        // Roughly two triangles per cell, with square-ish cells.
        let cells = (triangles.len() / 2).max(1) as f64;
        let side = (extent.x * extent.y / cells).sqrt();
        let nx = ((extent.x / side).ceil() as usize).clamp(1, MAX_GRID_SIDE);
        let ny = ((extent.y / side).ceil() as usize).clamp(1, MAX_GRID_SIDE);

        let mut locator = Self {
            min,
            max,
            cell: extent / DVec2::new(nx as f64, ny as f64),
            nx,
            ny,
            buckets: vec![Vec::new(); nx * ny],
        };

        for (t, tri) in triangles.iter().enumerate() {
            let [a, b, c] = tri.map(|v| points[v]);
            let (x0, y0) = locator.cell_of(a.min(b).min(c));
            let (x1, y1) = locator.cell_of(a.max(b).max(c));
            for y in y0..=y1 {
                for x in x0..=x1 {
                    locator.buckets[y * nx + x].push(t);
                }
            }
        }

        locator
    }

    fn cell_of(&self, p: DVec2) -> (usize, usize) {
        let rel = (p - self.min) / self.cell;
        let x = (rel.x.floor().max(0.0) as usize).min(self.nx - 1);
        let y = (rel.y.floor().max(0.0) as usize).min(self.ny - 1);
        (x, y)
    }

    fn candidates(&self, p: DVec2) -> Option<&[usize]> {
        if p.cmplt(self.min).any() || p.cmpgt(self.max).any() {
            return None;
        }
        let (x, y) = self.cell_of(p);
        Some(&self.buckets[y * self.nx + x])
    }
}

/// State of the radial sweep. Triangles are stored as flat vertex triples
/// in clockwise order; `halfedges[e]` is the twin of edge `e` in the
/// adjacent triangle. The hull is a doubly linked ring over vertex ids,
/// with `hull_next[v] == v` marking a vertex that left the hull.
struct Sweep<'a> {
    points: &'a [DVec2],
    center: DVec2,
    triangles: Vec<usize>,
    halfedges: Vec<usize>,
    hull_start: usize,
    hull_prev: Vec<usize>,
    hull_next: Vec<usize>,
    hull_tri: Vec<usize>,
    hull_hash: Vec<usize>,
    edge_stack: Vec<usize>,
}

impl<'a> Sweep<'a> {
    /// Counter-clockwise triangles covering the convex hull of `points`,
    /// or nothing when the points are collinear.
    fn run(points: &'a [DVec2]) -> Vec<[usize; 3]> {
        let n = points.len();
        let (min, max) = points
            .iter()
            .fold((points[0], points[0]), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        let mid = (min + max) * 0.5;

        // Seed: sample nearest the middle, its nearest neighbour, and the
        // sample completing the smallest circumcircle.
        let closest = |to: DVec2, skip: usize| {
            (0..n)
                .filter(|&i| i != skip)
                .min_by(|&a, &b| {
                    points[a].distance_squared(to).total_cmp(&points[b].distance_squared(to))
                })
                .unwrap_or(0)
        };
        let i0 = closest(mid, NONE);
        let i1 = closest(points[i0], i0);

        let mut i2 = NONE;
        let mut min_radius = f64::INFINITY;
        for i in (0..n).filter(|&i| i != i0 && i != i1) {
            let r = circumradius_sq(points[i0], points[i1], points[i]);
            if r < min_radius {
                i2 = i;
                min_radius = r;
            }
        }
        if i2 == NONE {
            return Vec::new();
        }
        let scale = (max - min).length_squared();
        if orient(points[i0], points[i1], points[i2]).abs() <= EPSILON * scale {
            return Vec::new();
        }

        let (i1, i2) = if is_ccw(points[i0], points[i1], points[i2]) { (i2, i1) } else { (i1, i2) };
        let center = circumcenter(points[i0], points[i1], points[i2]);

        let hash_size = (n as f64).sqrt().ceil() as usize;
        let mut sweep = Sweep {
            points,
            center,
            triangles: Vec::with_capacity(6 * n),
            halfedges: Vec::with_capacity(6 * n),
            hull_start: i0,
            hull_prev: vec![NONE; n],
            hull_next: vec![NONE; n],
            hull_tri: vec![NONE; n],
            hull_hash: vec![NONE; hash_size],
            edge_stack: Vec::new(),
        };

        sweep.hull_next[i0] = i1;
        sweep.hull_prev[i2] = i1;
        sweep.hull_next[i1] = i2;
        sweep.hull_prev[i0] = i2;
        sweep.hull_next[i2] = i0;
        sweep.hull_prev[i1] = i0;
        sweep.hull_tri[i0] = 0;
        sweep.hull_tri[i1] = 1;
        sweep.hull_tri[i2] = 2;
        for i in [i0, i1, i2] {
            let key = sweep.hash_key(points[i]);
            sweep.hull_hash[key] = i;
        }
        sweep.add_triangle(i0, i1, i2, NONE, NONE, NONE);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_unstable_by(|&a, &b| {
            points[a].distance_squared(center).total_cmp(&points[b].distance_squared(center))
        });

        let mut skipped = 0;
        for i in order {
            if i == i0 || i == i1 || i == i2 {
                continue;
            }
            if !sweep.insert(i) {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::debug!("{} samples could not be placed on the hull", skipped);
        }

        sweep
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[2], t[1]])
            .filter(|&[a, b, c]| orient(points[a], points[b], points[c]) > 0.0)
            .collect()
    }

    fn hash_key(&self, p: DVec2) -> usize {
        let size = self.hull_hash.len();
        ((pseudo_angle(p - self.center) * size as f64).floor() as usize) % size
    }

    /// Attach sample `i` to the hull edges it can see. Returns false when
    /// no visible edge exists, which only happens for near-duplicates.
    fn insert(&mut self, i: usize) -> bool {
        let p = self.points[i];

        // Hull vertex near the sample's angle, via the hash.
        let key = self.hash_key(p);
        let size = self.hull_hash.len();
        let mut start = NONE;
        for j in 0..size {
            let candidate = self.hull_hash[(key + j) % size];
            if candidate != NONE && candidate != self.hull_next[candidate] {
                start = candidate;
                break;
            }
        }
        if start == NONE {
            return false;
        }

        // First hull edge (e, next) visible from the sample.
        start = self.hull_prev[start];
        let mut e = start;
        loop {
            let q = self.hull_next[e];
            if is_ccw(p, self.points[e], self.points[q]) {
                break;
            }
            e = q;
            if e == start {
                return false;
            }
        }

        let t = self.add_triangle(e, i, self.hull_next[e], NONE, NONE, self.hull_tri[e]);
        self.hull_tri[i] = self.legalize(t + 2);
        self.hull_tri[e] = t;

        // Walk forward through visible edges.
        let mut next = self.hull_next[e];
        loop {
            let q = self.hull_next[next];
            if !is_ccw(p, self.points[next], self.points[q]) {
                break;
            }
            let t = self.add_triangle(next, i, q, self.hull_tri[i], NONE, self.hull_tri[next]);
            self.hull_tri[i] = self.legalize(t + 2);
            self.hull_next[next] = next;
            next = q;
        }

        // And backward, when the walk started on a visible edge.
        if e == start {
            loop {
                let q = self.hull_prev[e];
                if !is_ccw(p, self.points[q], self.points[e]) {
                    break;
                }
                let t = self.add_triangle(q, i, e, NONE, self.hull_tri[e], self.hull_tri[q]);
                self.legalize(t + 2);
                self.hull_tri[q] = t;
                self.hull_next[e] = e;
                e = q;
            }
        }

        self.hull_start = e;
        self.hull_prev[i] = e;
        self.hull_next[e] = i;
        self.hull_prev[next] = i;
        self.hull_next[i] = next;

        let key = self.hash_key(p);
        self.hull_hash[key] = i;
        let key = self.hash_key(self.points[e]);
        self.hull_hash[key] = e;
        true
    }

    fn add_triangle(&mut self, i0: usize, i1: usize, i2: usize, a: usize, b: usize, c: usize) -> usize {
        let t = self.triangles.len();
        self.triangles.extend([i0, i1, i2]);
        self.halfedges.extend([NONE; 3]);
        self.link(t, a);
        self.link(t + 1, b);
        self.link(t + 2, c);
        t
    }

    fn link(&mut self, a: usize, b: usize) {
        self.halfedges[a] = b;
        if b != NONE {
            self.halfedges[b] = a;
        }
    }

    /// Flip edge `a` and the edges it exposes until all pass the in-circle
    /// test. Returns the edge of `a`'s triangle ending at its start vertex.
    fn legalize(&mut self, mut a: usize) -> usize {
        let mut ar;
        loop {
            let b = self.halfedges[a];
            let a0 = a - a % 3;
            ar = a0 + (a + 2) % 3;

            if b == NONE {
                match self.edge_stack.pop() {
                    Some(edge) => {
                        a = edge;
                        continue;
                    }
                    None => break,
                }
            }

            let b0 = b - b % 3;
            let al = a0 + (a + 1) % 3;
            let bl = b0 + (b + 2) % 3;

            let p0 = self.triangles[ar];
            let pr = self.triangles[a];
            let pl = self.triangles[al];
            let p1 = self.triangles[bl];

            let illegal = in_circle(self.points[p0], self.points[pr], self.points[pl], self.points[p1]);
            if illegal {
                self.triangles[a] = p1;
                self.triangles[b] = p0;

                let hbl = self.halfedges[bl];
                if hbl == NONE {
                    // The flipped edge was on the hull; repoint its hull entry.
                    let mut e = self.hull_start;
                    loop {
                        if self.hull_tri[e] == bl {
                            self.hull_tri[e] = a;
                            break;
                        }
                        e = self.hull_prev[e];
                        if e == self.hull_start {
                            break;
                        }
                    }
                }

                let har = self.halfedges[ar];
                self.link(a, hbl);
                self.link(b, har);
                self.link(ar, bl);

                self.edge_stack.push(b0 + (b + 1) % 3);
            } else {
                match self.edge_stack.pop() {
                    Some(edge) => a = edge,
                    None => break,
                }
            }
        }
        ar
    }
}
