//! Queryable elevation surface reconstructed from terrain samples.
//!
//! Inside the convex hull of the samples, heights come from a
//! Clough–Tocher interpolant: every Delaunay triangle is split at its
//! centroid into three cubic Bézier patches that match the sample values
//! and per-vertex gradients, and whose derivative across each outer edge
//! varies linearly, so neighbouring triangles join with C¹ continuity.
//! Outside the hull the nearest sample's height is used instead.

use glam::{DVec2, DVec3};

use super::point_cloud::PointCloud;
use super::triangulation::{orient, Triangulation};
use crate::core::Result;

/// Smooth height function over a terrain point cloud.
#[derive(Clone, Debug)]
pub struct HeightField {
    cloud: PointCloud,
    mesh: Triangulation,
    heights: Vec<f64>,
    gradients: Vec<DVec2>,
    bounds: (DVec2, DVec2),
}

impl HeightField {
    /// Build the interpolant. Needs at least three non-collinear samples.
    pub fn new(cloud: PointCloud) -> Result<Self> {
        let planar: Vec<DVec2> = cloud.points().iter().map(|p| p.truncate()).collect();
        let mesh = Triangulation::new(&planar)?;

        let heights: Vec<f64> = (0..mesh.points().len())
            .map(|v| cloud.points()[mesh.source(v)].z)
            .collect();
        let gradients = estimate_gradients(&mesh, &heights);

        let bounds = planar
            .iter()
            .fold((planar[0], planar[0]), |(lo, hi), p| (lo.min(*p), hi.max(*p)));

        Ok(Self { cloud, mesh, heights, gradients, bounds })
    }

    /// Terrain height at `(x, y)`. Always finite.
    pub fn query(&self, x: f64, y: f64) -> f64 {
        match self.try_interpolate(x, y) {
            Some(z) => z,
            None => {
                log::trace!("({:.3}, {:.3}) outside interpolation domain, using nearest sample", x, y);
                self.nearest(x, y)
            }
        }
    }

    /// Cubic estimate, or `None` outside the convex hull of the samples.
    pub fn try_interpolate(&self, x: f64, y: f64) -> Option<f64> {
        let p = DVec2::new(x, y);
        if !p.is_finite() {
            return None;
        }
        let (triangle, bary) = self.mesh.locate(p)?;
        let z = self.clough_tocher(triangle, bary);
        z.is_finite().then_some(z)
    }

    /// Height of the sample closest to `(x, y)` in the plane.
    pub fn nearest(&self, x: f64, y: f64) -> f64 {
        let p = DVec2::new(x, y);
        let mut best = self.cloud.points()[0];
        let mut best_dist = f64::INFINITY;
        for sample in self.cloud.points() {
            let dist = sample.truncate().distance_squared(p);
            if dist < best_dist {
                best = *sample;
                best_dist = dist;
            }
        }
        best.z
    }

    /// Planar extent of the samples as `(min, max)`.
    pub fn bounds(&self) -> (DVec2, DVec2) {
        self.bounds
    }

    pub fn samples(&self) -> &[DVec3] {
        self.cloud.points()
    }

    fn clough_tocher(&self, triangle: usize, bary: [f64; 3]) -> f64 {
        let ids = self.mesh.triangles()[triangle];
        let v = ids.map(|i| self.mesh.points()[i]);
        let f = ids.map(|i| self.heights[i]);
        let g = ids.map(|i| self.gradients[i]);
        let centroid = (v[0] + v[1] + v[2]) / 3.0;

        // Ordinate next to vertex `i` on the way to point `to`.
        let towards = |i: usize, to: DVec2| f[i] + g[i].dot(to - v[i]) / 3.0;

        // Ordinate in the middle of the sub-triangle on edge (i, i+1),
        // chosen so the normal derivative along that edge is linear.
        let edge_middle: [f64; 3] = std::array::from_fn(|i| {
            let j = (i + 1) % 3;
            let edge = v[j] - v[i];
            let to_center = centroid - v[i];
            let normal = edge.perp();

            let det = edge.perp_dot(to_center);
            let beta = normal.perp_dot(to_center) / det;
            let gamma = edge.perp_dot(normal) / det;
            let alpha = -beta - gamma;

            let d0 = g[i].dot(normal) / 3.0;
            let d2 = g[j].dot(normal) / 3.0;
            let target = 0.5 * (d0 + d2);
            (target - alpha * towards(i, v[j]) - beta * towards(j, v[i])) / gamma
        });

        let spoke_outer: [f64; 3] = std::array::from_fn(|i| towards(i, centroid));
        let spoke_inner: [f64; 3] = std::array::from_fn(|i| {
            let k = (i + 2) % 3;
            (spoke_outer[i] + edge_middle[i] + edge_middle[k]) / 3.0
        });
        let center = spoke_inner.iter().sum::<f64>() / 3.0;

        // Sub-triangle (v[i], v[j], centroid) opposite the smallest weight.
        let k = (0..3)
            .min_by(|&a, &b| bary[a].total_cmp(&bary[b]))
            .unwrap_or(0);
        let i = (k + 1) % 3;
        let j = (k + 2) % 3;
        let u = bary[i] - bary[k];
        let w = bary[j] - bary[k];
        let c = 3.0 * bary[k];

        f[i] * u * u * u
            + f[j] * w * w * w
            + center * c * c * c
            + 3.0 * towards(i, v[j]) * u * u * w
            + 3.0 * spoke_outer[i] * u * u * c
            + 3.0 * towards(j, v[i]) * u * w * w
            + 3.0 * spoke_outer[j] * w * w * c
            + 3.0 * spoke_inner[i] * u * c * c
            + 3.0 * spoke_inner[j] * w * c * c
            + 6.0 * edge_middle[i] * u * w * c
    }
}

/// Area-weighted average of the planar gradients of incident triangles.
fn estimate_gradients(mesh: &Triangulation, heights: &[f64]) -> Vec<DVec2> {
    let mut sums = vec![DVec2::ZERO; mesh.points().len()];
    let mut weights = vec![0.0; mesh.points().len()];

    for (t, ids) in mesh.triangles().iter().enumerate() {
        let [a, b, c] = mesh.triangle_points(t);
        let (e1, e2) = (b - a, c - a);
        let det = orient(a, b, c);
        let dz1 = heights[ids[1]] - heights[ids[0]];
        let dz2 = heights[ids[2]] - heights[ids[0]];
        let gradient = DVec2::new(dz1 * e2.y - dz2 * e1.y, e1.x * dz2 - e2.x * dz1) / det;
        let area = 0.5 * det;

        for &v in ids {
            sums[v] += gradient * area;
            weights[v] += area;
        }
    }

    sums.into_iter()
        .zip(weights)
        .map(|(sum, weight)| if weight > 0.0 { sum / weight } else { DVec2::ZERO })
        .collect()
}
