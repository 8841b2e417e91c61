//! Geometric predicate kernel.
//!
//! Sign decisions (orientation, in-circle) use the exact predicates of
//! [robust], normalized to -1/0/+1. The raw-determinant helpers keep a
//! tolerance band for the classification tests that want one (on-edge
//! detection, degenerate-area rejection), on coordinates normalized to
//! `[0,1]`.

use nalgebra::{Matrix2, Vector2};
use robust::{incircle, orient2d, Coord};

use crate::utils::types::Vertex2;

/// Tolerance for near-zero classification on normalized coordinates.
pub const EPSILON: f64 = 1e-9;

#[inline]
fn coord(p: &Vertex2) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

/// Normalize a predicate result to its sign, so `==` compares signs.
#[inline]
fn sign_f64(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Exact orientation sign: `1` if `a, b, c` turn counter-clockwise, `-1` if
/// clockwise, `0` if collinear.
#[inline]
pub fn orient_2d(a: &Vertex2, b: &Vertex2, c: &Vertex2) -> f64 {
    sign_f64(orient2d(coord(a), coord(b), coord(c)))
}

/// Exact in-circle sign: `1` iff `p` lies strictly inside the circumcircle of
/// the counter-clockwise triangle `abc`, `0` iff exactly on it.
#[inline]
pub fn in_circle(a: &Vertex2, b: &Vertex2, c: &Vertex2, p: &Vertex2) -> f64 {
    sign_f64(incircle(coord(a), coord(b), coord(c), coord(p)))
}

/// Twice the signed area of `abc`, as plain floating point.
///
/// Only for tolerance-banded magnitude tests; sign decisions go through
/// [`orient_2d`].
#[inline]
pub fn orient_2d_raw(a: &Vertex2, b: &Vertex2, c: &Vertex2) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Barycentric coordinates of `p` with respect to the counter-clockwise
/// triangle `abc`.
///
/// `None` when the denominator is not positive beyond the tolerance band,
/// i.e. the triangle is degenerate (or misoriented) and must be skipped as a
/// containment candidate. All three weights non-negative means `p` lies in
/// the triangle, boundary included.
pub fn barycentric(a: &Vertex2, b: &Vertex2, c: &Vertex2, p: &Vertex2) -> Option<[f64; 3]> {
    let denom = orient_2d_raw(a, b, c);
    if denom <= EPSILON {
        return None;
    }

    Some([
        orient_2d_raw(p, b, c) / denom,
        orient_2d_raw(a, p, c) / denom,
        orient_2d_raw(a, b, p) / denom,
    ])
}

/// Circumcircle of `abc` as `(center, squared radius)`.
///
/// Intersects the perpendicular bisectors of `ab` and `ac` as a 2×2 linear
/// solve. `None` for (near-)degenerate triangles.
pub fn circumcircle(a: &Vertex2, b: &Vertex2, c: &Vertex2) -> Option<(Vertex2, f64)> {
    if orient_2d_raw(a, b, c).abs() < EPSILON {
        return None;
    }

    let m = Matrix2::new(b[0] - a[0], b[1] - a[1], c[0] - a[0], c[1] - a[1]);
    let rhs = Vector2::new(
        0.5 * ((b[0] * b[0] - a[0] * a[0]) + (b[1] * b[1] - a[1] * a[1])),
        0.5 * ((c[0] * c[0] - a[0] * a[0]) + (c[1] * c[1] - a[1] * a[1])),
    );

    let center = m.lu().solve(&rhs)?;
    let r2 = (a[0] - center[0]).powi(2) + (a[1] - center[1]).powi(2);

    Some(([center[0], center[1]], r2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn orientation_signs() {
        assert_eq!(orient_2d(&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]), 1.0);
        assert_eq!(orient_2d(&[0.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]), -1.0);
        assert_eq!(orient_2d(&[0.0, 0.0], &[1.0, 0.0], &[2.0, 0.0]), 0.0);
    }

    #[test]
    fn in_circle_signs() {
        let (a, b, c) = ([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]);

        assert_eq!(in_circle(&a, &b, &c, &[0.3, 0.3]), 1.0);
        assert_eq!(in_circle(&a, &b, &c, &[2.0, 2.0]), -1.0);
        // The fourth corner of the unit square is exactly co-circular.
        assert_eq!(in_circle(&a, &b, &c, &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn barycentric_of_vertices_and_centroid() {
        let (a, b, c) = ([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]);

        let at_a = barycentric(&a, &b, &c, &a).unwrap();
        assert_approx_eq!(at_a[0], 1.0, 1e-12);
        assert!(at_a[1].abs() < 1e-12 && at_a[2].abs() < 1e-12);

        let at_centroid = barycentric(&a, &b, &c, &[1.0 / 3.0, 1.0 / 3.0]).unwrap();
        for w in at_centroid {
            assert_approx_eq!(w, 1.0 / 3.0, 1e-12);
        }

        let outside = barycentric(&a, &b, &c, &[1.0, 1.0]).unwrap();
        assert!(outside.iter().any(|&w| w < 0.0));
    }

    #[test]
    fn barycentric_rejects_degenerate_triangles() {
        assert!(barycentric(&[0.0, 0.0], &[1.0, 0.0], &[2.0, 0.0], &[0.5, 0.0]).is_none());
        // Clockwise triangles are misoriented candidates.
        assert!(barycentric(&[0.0, 0.0], &[0.0, 1.0], &[1.0, 0.0], &[0.1, 0.1]).is_none());
    }

    #[test]
    fn circumcircle_of_right_triangle() {
        let (center, r2) = circumcircle(&[0.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]).unwrap();

        assert_approx_eq!(center[0], 0.5, 1e-12);
        assert_approx_eq!(center[1], 0.5, 1e-12);
        assert_approx_eq!(r2, 0.5, 1e-12);
    }

    #[test]
    fn circumcircle_of_collinear_points_is_none() {
        assert!(circumcircle(&[0.0, 0.0], &[1.0, 0.0], &[2.0, 0.0]).is_none());
    }
}
