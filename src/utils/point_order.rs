use super::types::Vertex2;

/// Spatial insertion ordering for normalized points.
///
/// Partitions `[0,1]²` into a `g × g` bin grid with `g = ceil(sqrt(N))`
/// (rounded up to even) and emits the bins bottom row first, alternating the
/// direction per row (boustrophedon). Consecutive insertions then stay
/// geometrically close, so the locate walk starts near its target.
///
/// Within a bin the incoming order is kept; the ordering only affects
/// performance, never correctness.
pub fn bin_sorted_order(points: &[Vertex2], indices_to_add: &[usize]) -> Vec<usize> {
    let n = indices_to_add.len();
    if n <= 1 {
        return indices_to_add.to_vec();
    }

    let mut g = (n as f64).sqrt().ceil() as usize;
    if g % 2 == 1 {
        g += 1; // even grid keeps the snake ends aligned
    }

    let mut bins: Vec<Vec<usize>> = vec![Vec::new(); g * g];
    for &idx in indices_to_add {
        let p = points[idx];
        let col = ((p[0] * g as f64) as usize).min(g - 1);
        let row = ((p[1] * g as f64) as usize).min(g - 1);
        // Rows are stored top-down, so row 0 of the traversal is the bottom one.
        bins[(g - 1 - row) * g + col].push(idx);
    }

    let mut curve_order = Vec::with_capacity(n);
    for row_from_bottom in 0..g {
        let base = (g - 1 - row_from_bottom) * g;
        if row_from_bottom % 2 == 0 {
            for col in 0..g {
                curve_order.extend_from_slice(&bins[base + col]);
            }
        } else {
            for col in (0..g).rev() {
                curve_order.extend_from_slice(&bins[base + col]);
            }
        }
    }

    curve_order
}
