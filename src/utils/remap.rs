use super::types::Vertex2;

/// Affine map between input coordinates and the unit square.
///
/// The scale is uniform on both axes, so orientation and in-circle relations
/// are preserved, and it never drops below 1: tiny point clouds are
/// translated, not inflated.
#[derive(Clone, Copy, Debug)]
pub struct UnitSquareMap {
    min_x: f64,
    min_y: f64,
    scale: f64,
}

impl Default for UnitSquareMap {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            scale: 1.0,
        }
    }
}

impl UnitSquareMap {
    /// Fit the map to a point cloud, so that `forward` sends every point into `[0,1]²`.
    pub fn fit(points: &[Vertex2]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for p in points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }

        Self {
            min_x,
            min_y,
            scale: (max_x - min_x).max(max_y - min_y).max(1.0),
        }
    }

    pub fn forward(&self, p: Vertex2) -> Vertex2 {
        [
            (p[0] - self.min_x) / self.scale,
            (p[1] - self.min_y) / self.scale,
        ]
    }

    pub fn inverse(&self, p: Vertex2) -> Vertex2 {
        [
            p[0] * self.scale + self.min_x,
            p[1] * self.scale + self.min_y,
        ]
    }
}
