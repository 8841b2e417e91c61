use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::{debug, error, trace};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::predicates::{self, EPSILON};
use crate::trimesh::{Edge, TriMesh, Triangle};
use crate::utils::{
    point_order::bin_sorted_order,
    remap::UnitSquareMap,
    types::{TriIdx, Triangle2, Vertex2, VertexIdx},
};

/// Corners of the bootstrap triangle, in normalized space. Wide enough to
/// enclose the unit square by a comfortable margin.
const SUPER_VERTICES: [Vertex2; 3] = [[-100.0, -100.0], [100.0, -100.0], [0.0, 100.0]];

const NO_VERTEX: VertexIdx = usize::MAX;

/// An incremental 2D Delaunay triangulation session.
///
/// One value owns one run: the deduplicated point set, the triangle arena
/// and the locality hint all live here, so independent runs can execute
/// concurrently without any shared state.
///
/// Points are normalized into the unit square for the duration of the run
/// and mapped back at finalization; triangles touching the bootstrap
/// super-triangle are pruned from every output accessor.
///
/// ```
/// use tricell::Triangulation;
///
/// let points = vec![
///     [0.0, 7.0],
///     [-5.0, 5.0],
///     [5.0, 5.0],
///     [-2.0, 3.0],
///     [3.0, 1.0],
///     [-4.0, -1.0],
///     [1.0, -2.0],
///     [-6.0, -4.0],
///     [5.0, -4.0],
/// ];
///
/// let mut triangulation = Triangulation::new();
/// triangulation.triangulate(&points).unwrap();
///
/// assert_eq!(triangulation.is_delaunay_p(), 1.0);
/// assert!(triangulation.num_triangles() > 0);
/// ```
pub struct Triangulation {
    /// Deduplicated input points, followed by the 3 super-triangle corners.
    vertices: Vec<Vertex2>,
    /// Number of real (non-super) points.
    num_points: usize,
    mesh: TriMesh,
    remap: UnitSquareMap,
    super_vertices: [VertexIdx; 3],
    last_created: TriIdx,
    time_walking: u128,
    time_inserting: u128,
    time_flipping: u128,
}

impl Default for Triangulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Triangulation {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            num_points: 0,
            mesh: TriMesh::new(),
            remap: UnitSquareMap::default(),
            super_vertices: [NO_VERTEX; 3],
            last_created: 0,
            time_walking: 0,
            time_inserting: 0,
            time_flipping: 0,
        }
    }

    /// Triangulate a point cloud.
    ///
    /// Coincident points (within [`EPSILON`] on both axes) are merged up
    /// front; fewer than 3 surviving points is not an error, the run simply
    /// produces no triangles. An all-collinear point set is an error, so
    /// callers can tell it apart from the empty case. Non-finite coordinates
    /// are rejected.
    pub fn triangulate(&mut self, points: &[Vertex2]) -> Result<()> {
        if self.mesh.num_slots() != 0 || !self.vertices.is_empty() {
            bail!("triangulation session has already run");
        }

        validate_points(points)?;
        self.vertices = dedup_points(points);
        self.num_points = self.vertices.len();

        if self.num_points < 3 {
            debug!(
                "{} unique points, not enough for a triangulation",
                self.num_points
            );
            return Ok(());
        }

        if all_collinear(&self.vertices) {
            bail!("all {} unique points are collinear", self.num_points);
        }

        self.remap = UnitSquareMap::fit(&self.vertices);
        for v in &mut self.vertices {
            *v = self.remap.forward(*v);
        }

        let now = Instant::now();
        let indices: Vec<VertexIdx> = (0..self.num_points).collect();
        let order = bin_sorted_order(&self.vertices, &indices);
        trace!("bin sort computed in {} µs", now.elapsed().as_micros());

        self.bootstrap();

        debug!("inserting {} vertices", order.len());
        for v_idx in order {
            self.insert_vertex(v_idx)
                .with_context(|| format!("inserting vertex {v_idx}"))?;
        }

        for v in &mut self.vertices {
            *v = self.remap.inverse(*v);
        }

        self.log_time();
        Ok(())
    }

    /// Push the super-triangle corners and the root triangle they span.
    fn bootstrap(&mut self) {
        let base = self.vertices.len();
        self.vertices.extend_from_slice(&SUPER_VERTICES);
        self.super_vertices = [base, base + 1, base + 2];
        self.last_created = self.mesh.push(Triangle::new(self.super_vertices, [None; 3]));
    }

    /// Insert one point: locate, split, legalize.
    fn insert_vertex(&mut self, v_idx: VertexIdx) -> Result<()> {
        let p = self.vertices[v_idx];

        let now = Instant::now();
        let t_idx = self.locate(p)?;
        self.time_walking += now.elapsed().as_micros();

        let now = Instant::now();
        let tri = *self.mesh.get(t_idx)?;
        let [a, b, c] = tri.vertices;
        let (pa, pb, pc) = (self.vertices[a], self.vertices[b], self.vertices[c]);

        let mut stack: Vec<(TriIdx, TriIdx)> = Vec::new();

        // A point within the band of an edge line splits both triangles on
        // that edge (1->4) to keep the mesh planar; otherwise the generic
        // 1->3 split applies.
        if predicates::orient_2d_raw(&pa, &pb, &p).abs() < EPSILON {
            self.split_edge(v_idx, t_idx, tri.neighbors[2], a, b, c, &mut stack)?;
        } else if predicates::orient_2d_raw(&pb, &pc, &p).abs() < EPSILON {
            self.split_edge(v_idx, t_idx, tri.neighbors[0], b, c, a, &mut stack)?;
        } else if predicates::orient_2d_raw(&pc, &pa, &p).abs() < EPSILON {
            self.split_edge(v_idx, t_idx, tri.neighbors[1], c, a, b, &mut stack)?;
        } else {
            self.split_triangle(v_idx, t_idx, &mut stack)?;
        }
        self.time_inserting += now.elapsed().as_micros();

        let now = Instant::now();
        self.legalize(&mut stack)?;
        self.time_flipping += now.elapsed().as_micros();

        Ok(())
    }

    /// Find the triangle containing `p`.
    ///
    /// Directed walk from the locality hint first; if the walk strands (it
    /// can, when the hint was consumed by a flip), fall back to scanning the
    /// live set with the barycentric containment test. Failure of both is an
    /// invariant violation: the super-triangle bound guarantees coverage.
    fn locate(&self, p: Vertex2) -> Result<TriIdx> {
        if let Some(t_idx) = self.walk_locate(p, self.last_created)? {
            return Ok(t_idx);
        }

        for (t_idx, tri) in self.mesh.iter_alive() {
            let [a, b, c] = tri.vertices;
            let bary = predicates::barycentric(
                &self.vertices[a],
                &self.vertices[b],
                &self.vertices[c],
                &p,
            );
            // Degenerate candidates yield no coordinates and are skipped.
            if let Some(bary) = bary {
                if bary.iter().all(|&w| w >= -EPSILON) {
                    return Ok(t_idx);
                }
            }
        }

        bail!(
            "mesh does not cover point [{}, {}]; the triangulation invariant is broken",
            p[0],
            p[1]
        )
    }

    /// Directed walk: step across any edge that has `p` strictly on its far
    /// side, until no edge does. `None` when the walk strands on a deleted
    /// triangle or exceeds the safety brake.
    fn walk_locate(&self, p: Vertex2, start: TriIdx) -> Result<Option<TriIdx>> {
        let mut curr = start;

        // A correct walk visits fewer triangles than the arena holds.
        for _ in 0..self.mesh.num_slots() {
            if !self.mesh.is_alive(curr) {
                return Ok(None);
            }

            let tri = self.mesh.get(curr)?;
            let [a, b, c] = tri.vertices;
            let (pa, pb, pc) = (self.vertices[a], self.vertices[b], self.vertices[c]);

            let step = if predicates::orient_2d(&pb, &pc, &p) < 0.0 {
                tri.neighbors[0]
            } else if predicates::orient_2d(&pc, &pa, &p) < 0.0 {
                tri.neighbors[1]
            } else if predicates::orient_2d(&pa, &pb, &p) < 0.0 {
                tri.neighbors[2]
            } else {
                // On or left of all three edges: inside.
                return Ok(Some(curr));
            };

            match step {
                Some(n_idx) => curr = n_idx,
                // The separating edge is on the outer boundary; this is the
                // closest triangle the mesh has.
                None => return Ok(Some(curr)),
            }
        }

        Ok(None)
    }

    /// Generic insertion: replace the containing triangle with three
    /// triangles fanning out of `p`, inheriting the outer neighbors.
    fn split_triangle(
        &mut self,
        p_idx: VertexIdx,
        t_idx: TriIdx,
        stack: &mut Vec<(TriIdx, TriIdx)>,
    ) -> Result<()> {
        let tri = *self.mesh.get(t_idx)?;
        let [a, b, c] = tri.vertices;
        let [n_a, n_b, n_c] = tri.neighbors;

        self.mesh.remove(t_idx);

        let base = self.mesh.num_slots();
        let (t1, t2, t3) = (base, base + 1, base + 2);

        self.mesh
            .push(Triangle::new([b, c, p_idx], [Some(t2), Some(t3), n_a]));
        self.mesh
            .push(Triangle::new([c, a, p_idx], [Some(t3), Some(t1), n_b]));
        self.mesh
            .push(Triangle::new([a, b, p_idx], [Some(t1), Some(t2), n_c]));
        self.last_created = t1;

        self.mesh.replace_neighbor(n_a, t_idx, t1)?;
        self.mesh.replace_neighbor(n_b, t_idx, t2)?;
        self.mesh.replace_neighbor(n_c, t_idx, t3)?;

        if let Some(n) = n_a {
            stack.push((t1, n));
        }
        if let Some(n) = n_b {
            stack.push((t2, n));
        }
        if let Some(n) = n_c {
            stack.push((t3, n));
        }
        Ok(())
    }

    /// On-edge insertion: `p` lies on the edge `(u, v)` of `t_idx`, with `o`
    /// the opposite vertex and `n_idx` the neighbor across `(u, v)`. Both
    /// incident triangles split in two, giving four where two stood.
    #[allow(clippy::too_many_arguments)]
    fn split_edge(
        &mut self,
        p_idx: VertexIdx,
        t_idx: TriIdx,
        n_idx: Option<TriIdx>,
        u: VertexIdx,
        v: VertexIdx,
        o: VertexIdx,
        stack: &mut Vec<(TriIdx, TriIdx)>,
    ) -> Result<()> {
        let tri = *self.mesh.get(t_idx)?;
        let u_slot = tri
            .vertices
            .iter()
            .position(|&x| x == u)
            .with_context(|| format!("vertex {u} is not part of triangle {t_idx}"))?;
        let v_slot = tri
            .vertices
            .iter()
            .position(|&x| x == v)
            .with_context(|| format!("vertex {v} is not part of triangle {t_idx}"))?;
        // Flank neighbors across (v, o) and (o, u).
        let n_vo = tri.neighbors[u_slot];
        let n_ou = tri.neighbors[v_slot];

        self.mesh.remove(t_idx);

        let base = self.mesh.num_slots();
        let (t1, t2) = (base, base + 1);
        self.mesh
            .push(Triangle::new([p_idx, v, o], [n_vo, Some(t2), None]));
        self.mesh
            .push(Triangle::new([u, p_idx, o], [Some(t1), n_ou, None]));
        self.last_created = t1;

        self.mesh.replace_neighbor(n_vo, t_idx, t1)?;
        self.mesh.replace_neighbor(n_ou, t_idx, t2)?;

        if let Some(n_idx) = n_idx {
            let n = *self.mesh.get(n_idx)?;
            // The neighbor traverses the shared edge as (v, u); its apex is
            // the remaining vertex.
            let nv_slot = n
                .vertices
                .iter()
                .position(|&x| x == v)
                .with_context(|| format!("vertex {v} is not part of neighbor {n_idx}"))?;
            let nu_slot = n
                .vertices
                .iter()
                .position(|&x| x == u)
                .with_context(|| format!("vertex {u} is not part of neighbor {n_idx}"))?;
            let apex = n.vertices[3 - nv_slot - nu_slot];
            let n_ua = n.neighbors[nv_slot]; // across (u, apex)
            let n_av = n.neighbors[nu_slot]; // across (apex, v)

            self.mesh.remove(n_idx);

            let base = self.mesh.num_slots();
            let (m1, m2) = (base, base + 1);
            self.mesh
                .push(Triangle::new([p_idx, u, apex], [n_ua, Some(m2), Some(t2)]));
            self.mesh
                .push(Triangle::new([v, p_idx, apex], [Some(m1), n_av, Some(t1)]));

            // Close the split edge: t1/t2 face m2/m1 across it.
            self.mesh.get_mut(t1)?.neighbors[2] = Some(m2);
            self.mesh.get_mut(t2)?.neighbors[2] = Some(m1);

            self.mesh.replace_neighbor(n_ua, n_idx, m1)?;
            self.mesh.replace_neighbor(n_av, n_idx, m2)?;

            if let Some(n) = n_ua {
                stack.push((m1, n));
            }
            if let Some(n) = n_av {
                stack.push((m2, n));
            }
        }

        if let Some(n) = n_vo {
            stack.push((t1, n));
        }
        if let Some(n) = n_ou {
            stack.push((t2, n));
        }
        Ok(())
    }

    /// Lawson legalization over an explicit LIFO work-list of
    /// (triangle, neighbor) pairs, so flip cascades of arbitrary depth never
    /// touch the call stack.
    fn legalize(&mut self, stack: &mut Vec<(TriIdx, TriIdx)>) -> Result<()> {
        while let Some((t_idx, n_idx)) = stack.pop() {
            if !self.mesh.is_alive(t_idx) || !self.mesh.is_alive(n_idx) {
                continue;
            }

            let tri = *self.mesh.get(t_idx)?;
            let n = *self.mesh.get(n_idx)?;
            // A flip elsewhere may have detached the pair; drop stale entries.
            let (Some(t_slot), Some(n_slot)) =
                (tri.neighbor_slot(n_idx), n.neighbor_slot(t_idx))
            else {
                continue;
            };

            let q = n.vertices[n_slot];
            let [a, b, c] = tri.vertices;
            let in_circle = predicates::in_circle(
                &self.vertices[a],
                &self.vertices[b],
                &self.vertices[c],
                &self.vertices[q],
            );
            // Exactly co-circular counts as legal; flipping there cycles.
            if in_circle <= 0.0 {
                continue;
            }

            self.flip(t_idx, n_idx, t_slot, n_slot)?;

            // Re-examine the four outer edges of the flipped pair.
            let tri = *self.mesh.get(t_idx)?;
            let n = *self.mesh.get(n_idx)?;
            if let Some(outer) = tri.neighbors[0] {
                stack.push((t_idx, outer));
            }
            if let Some(outer) = tri.neighbors[2] {
                stack.push((t_idx, outer));
            }
            if let Some(outer) = n.neighbors[0] {
                stack.push((n_idx, outer));
            }
            if let Some(outer) = n.neighbors[1] {
                stack.push((n_idx, outer));
            }
        }
        Ok(())
    }

    /// Replace the diagonal shared by `t_idx` and `n_idx` with the opposite
    /// one, rewriting both triangles in place and redirecting the two outer
    /// links that change sides.
    fn flip(&mut self, t_idx: TriIdx, n_idx: TriIdx, t_slot: usize, n_slot: usize) -> Result<()> {
        let tri = *self.mesh.get(t_idx)?;
        let n = *self.mesh.get(n_idx)?;

        let p = tri.vertices[t_slot];
        let u = tri.vertices[(t_slot + 1) % 3];
        let v = tri.vertices[(t_slot + 2) % 3];
        let q = n.vertices[n_slot];
        debug_assert_eq!(n.vertices[(n_slot + 1) % 3], v);
        debug_assert_eq!(n.vertices[(n_slot + 2) % 3], u);

        let n_uq = n.neighbors[(n_slot + 1) % 3]; // across (u, q)
        let n_qv = n.neighbors[(n_slot + 2) % 3]; // across (q, v)
        let t_vp = tri.neighbors[(t_slot + 1) % 3]; // across (v, p)
        let t_pu = tri.neighbors[(t_slot + 2) % 3]; // across (p, u)

        *self.mesh.get_mut(t_idx)? = Triangle::new([p, u, q], [n_uq, Some(n_idx), t_pu]);
        *self.mesh.get_mut(n_idx)? = Triangle::new([p, q, v], [n_qv, t_vp, Some(t_idx)]);

        self.mesh.replace_neighbor(n_uq, n_idx, t_idx)?;
        self.mesh.replace_neighbor(t_vp, t_idx, n_idx)?;
        self.last_created = t_idx;

        Ok(())
    }

    /// The output triangles: live and free of super-triangle corners.
    fn casual_tris(&self) -> impl Iterator<Item = (TriIdx, &Triangle)> {
        self.mesh
            .iter_alive()
            .filter(|(_, tri)| !self.super_vertices.iter().any(|&s| tri.has_vertex(s)))
    }

    /// The deduplicated input points, in original coordinates.
    pub fn points(&self) -> &[Vertex2] {
        &self.vertices[..self.num_points]
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// The output triangles as indices into [`Self::points`], counter-clockwise.
    pub fn triangle_indices(&self) -> Vec<[VertexIdx; 3]> {
        self.casual_tris().map(|(_, tri)| tri.vertices).collect()
    }

    /// The output triangles as coordinate triples, counter-clockwise.
    pub fn triangles(&self) -> Vec<Triangle2> {
        self.triangle_indices()
            .into_iter()
            .map(|[a, b, c]| [self.vertices[a], self.vertices[b], self.vertices[c]])
            .collect()
    }

    pub fn num_triangles(&self) -> usize {
        self.casual_tris().count()
    }

    /// Per-point mesh adjacency, derived from the output triangles so it can
    /// never disagree with them.
    pub fn vertex_adjacency(&self) -> VertexAdjacency {
        let tris = self.triangle_indices();

        let mut edges: HashSet<Edge> = HashSet::new();
        let mut incident_tris = vec![Vec::new(); self.num_points];
        for (pos, t) in tris.iter().enumerate() {
            edges.insert(Edge::new(t[0], t[1]));
            edges.insert(Edge::new(t[1], t[2]));
            edges.insert(Edge::new(t[2], t[0]));
            for &v in t {
                incident_tris[v].push(pos);
            }
        }

        let mut neighbors = vec![Vec::new(); self.num_points];
        for edge in edges {
            let (a, b) = edge.endpoints();
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
        }

        VertexAdjacency {
            neighbors,
            incident_tris,
        }
    }

    /// The Voronoi dual of the output: one node per triangle, carrying its
    /// circumcenter and the ids of the edge-sharing triangles. Degenerate
    /// (flat) triangles have no circumcenter and are skipped.
    pub fn dual_graph(&self) -> Vec<DualNode> {
        let tris = self.triangle_indices();

        let mut by_edge: HashMap<Edge, Vec<usize>> = HashMap::new();
        for (id, t) in tris.iter().enumerate() {
            for edge in [
                Edge::new(t[0], t[1]),
                Edge::new(t[1], t[2]),
                Edge::new(t[2], t[0]),
            ] {
                by_edge.entry(edge).or_default().push(id);
            }
        }

        tris.iter()
            .enumerate()
            .filter_map(|(id, t)| {
                let (circumcenter, _) = predicates::circumcircle(
                    &self.vertices[t[0]],
                    &self.vertices[t[1]],
                    &self.vertices[t[2]],
                )?;

                let mut neighbors = Vec::new();
                for edge in [
                    Edge::new(t[0], t[1]),
                    Edge::new(t[1], t[2]),
                    Edge::new(t[2], t[0]),
                ] {
                    if let Some(ids) = by_edge.get(&edge) {
                        neighbors.extend(ids.iter().copied().filter(|&other| other != id));
                    }
                }
                neighbors.sort_unstable();

                Some(DualNode {
                    id,
                    circumcenter,
                    neighbors,
                })
            })
            .collect()
    }

    /// Check the empty-circumcircle property of every output triangle against
    /// every triangulated point.
    ///
    /// Returns whether the mesh is Delaunay and the fraction of unviolated
    /// triangles.
    pub fn is_delaunay(&self) -> (bool, f64) {
        let tris = self.triangle_indices();
        if tris.is_empty() {
            return (true, 1.0);
        }

        let num_violated = tris.iter().filter(|t| self.is_tri_violated(t)).count();

        (
            num_violated == 0,
            1.0 - num_violated as f64 / tris.len() as f64,
        )
    }

    /// Checks the Delaunay property in a parallel manner using `rayon`s `par_iter()`.
    ///
    /// This can significantly reduce the runtime of this predicate.
    #[must_use]
    pub fn is_delaunay_p(&self) -> f64 {
        let tris = self.triangle_indices();
        if tris.is_empty() {
            return 1.0;
        }
        let num_tris = tris.len();

        let num_violated: f64 = tris
            .into_par_iter()
            .map(|t| if self.is_tri_violated(&t) { 1.0 } else { 0.0 })
            .sum();

        1.0 - num_violated / num_tris as f64
    }

    fn is_tri_violated(&self, t: &[VertexIdx; 3]) -> bool {
        let (a, b, c) = (
            &self.vertices[t[0]],
            &self.vertices[t[1]],
            &self.vertices[t[2]],
        );

        if predicates::orient_2d(a, b, c) <= 0.0 {
            error!("flat or misoriented triangle {t:?}");
            return true;
        }

        (0..self.num_points).any(|v_idx| {
            // A triangle's own vertices sit exactly on its circumcircle.
            !t.contains(&v_idx) && predicates::in_circle(a, b, c, &self.vertices[v_idx]) > 0.0
        })
    }

    /// Check the structural consistency of the mesh.
    pub fn is_sound(&self) -> bool {
        let sound = self.mesh.is_sound();
        if !sound {
            error!("triangulation mesh is not sound");
        }
        sound
    }

    fn log_time(&self) {
        debug!("-------------------------------------------");
        debug!("Time elapsed:");
        debug!("Walks computed in {} µs", self.time_walking);
        debug!("Inserts computed in {} µs", self.time_inserting);
        debug!("Flips computed in {} µs", self.time_flipping);
    }
}

/// Per-point adjacency of an output mesh.
#[derive(Debug, Clone)]
pub struct VertexAdjacency {
    /// For each point, the points it shares an edge with, sorted ascending.
    pub neighbors: Vec<Vec<VertexIdx>>,
    /// For each point, positions into `triangle_indices()` of its incident
    /// triangles.
    pub incident_tris: Vec<Vec<usize>>,
}

/// A node of the Voronoi dual graph: one output triangle, its circumcenter
/// (a Voronoi vertex) and the triangles across its edges.
#[derive(Debug, Clone)]
pub struct DualNode {
    pub id: usize,
    pub circumcenter: Vertex2,
    pub neighbors: Vec<usize>,
}

fn validate_points(points: &[Vertex2]) -> Result<()> {
    for (idx, p) in points.iter().enumerate() {
        if !p[0].is_finite() || !p[1].is_finite() {
            bail!(
                "point {idx} has a non-finite coordinate: [{}, {}]",
                p[0],
                p[1]
            );
        }
    }
    Ok(())
}

/// Merge coincident points: sort with an epsilon band on x to bring
/// candidates together, then keep the first point of each cluster.
fn dedup_points(points: &[Vertex2]) -> Vec<Vertex2> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|p, q| {
        if (p[0] - q[0]).abs() > EPSILON {
            p[0].partial_cmp(&q[0]).unwrap_or(Ordering::Equal)
        } else {
            p[1].partial_cmp(&q[1]).unwrap_or(Ordering::Equal)
        }
    });

    let mut unique: Vec<Vertex2> = Vec::with_capacity(sorted.len());
    for p in sorted {
        match unique.last() {
            Some(prev)
                if (p[0] - prev[0]).abs() <= EPSILON && (p[1] - prev[1]).abs() <= EPSILON => {}
            _ => unique.push(p),
        }
    }
    unique
}

fn all_collinear(points: &[Vertex2]) -> bool {
    let a = points[0];
    let Some(b) = points.iter().find(|p| **p != a) else {
        return true;
    };

    points
        .iter()
        .all(|p| predicates::orient_2d(&a, b, p) == 0.0)
}

#[cfg(test)]
mod tests {
    use approx_eq::assert_approx_eq;
    use geo::{Area, ConvexHull, MultiPoint, Point};

    use super::*;
    use crate::test_utils::sample_vertices_2d;

    const NUM_VERTICES_LIST: [usize; 7] = [3, 5, 10, 50, 100, 500, 1000];

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn run(points: &[Vertex2]) -> Triangulation {
        init();
        let mut triangulation = Triangulation::new();
        triangulation.triangulate(points).unwrap();
        triangulation
    }

    fn verify_triangulation(triangulation: &Triangulation) {
        assert_eq!(triangulation.is_delaunay_p(), 1.0);
        assert!(triangulation.is_sound());
    }

    /// Closed hull ring of a point cloud, first point repeated at the end.
    fn hull_ring(points: &[Vertex2]) -> Vec<Vertex2> {
        let multi_point = MultiPoint::from(
            points
                .iter()
                .map(|p| Point::new(p[0], p[1]))
                .collect::<Vec<_>>(),
        );
        multi_point
            .convex_hull()
            .exterior()
            .points()
            .map(|p| [p.x(), p.y()])
            .collect()
    }

    fn hull_area(points: &[Vertex2]) -> f64 {
        let multi_point = MultiPoint::from(
            points
                .iter()
                .map(|p| Point::new(p[0], p[1]))
                .collect::<Vec<_>>(),
        );
        multi_point.convex_hull().unsigned_area()
    }

    fn on_segment(a: &Vertex2, b: &Vertex2, p: &Vertex2) -> bool {
        predicates::orient_2d(a, b, p) == 0.0
            && p[0] >= a[0].min(b[0])
            && p[0] <= a[0].max(b[0])
            && p[1] >= a[1].min(b[1])
            && p[1] <= a[1].max(b[1])
    }

    /// Number of points lying on the hull boundary, collinear ones included.
    fn hull_point_count(points: &[Vertex2]) -> usize {
        let ring = hull_ring(points);
        points
            .iter()
            .filter(|p| ring.windows(2).any(|seg| on_segment(&seg[0], &seg[1], p)))
            .count()
    }

    /// Triangle count a triangulation of the full hull must have: `2n - 2 - h`.
    fn expected_num_triangles(points: &[Vertex2]) -> usize {
        2 * points.len() - 2 - hull_point_count(points)
    }

    fn total_area(triangulation: &Triangulation) -> f64 {
        triangulation
            .triangles()
            .iter()
            .map(|t| predicates::orient_2d_raw(&t[0], &t[1], &t[2]) / 2.0)
            .sum()
    }

    /// Triangles as sorted index triples, sorted, for order-free comparison.
    fn canonical_tris(triangulation: &Triangulation) -> Vec<[VertexIdx; 3]> {
        let mut tris = triangulation.triangle_indices();
        for t in &mut tris {
            t.sort_unstable();
        }
        tris.sort_unstable();
        tris
    }

    #[test]
    fn random_clouds_are_triangulated() {
        for n in NUM_VERTICES_LIST {
            let vertices = sample_vertices_2d(n, None);
            let triangulation = run(&vertices);

            verify_triangulation(&triangulation);
            assert_eq!(
                triangulation.num_triangles(),
                expected_num_triangles(triangulation.points())
            );
            assert_approx_eq!(
                total_area(&triangulation),
                hull_area(triangulation.points()),
                1e-9
            );
        }
    }

    #[test]
    fn three_points_give_one_triangle() {
        let triangulation = run(&[[0.0, 0.0], [4.0, 0.0], [0.0, 3.0]]);

        verify_triangulation(&triangulation);
        assert_eq!(triangulation.num_triangles(), 1);
        assert_eq!(canonical_tris(&triangulation), vec![[0, 1, 2]]);
    }

    #[test]
    fn square_gives_two_triangles() {
        let triangulation = run(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);

        // The corners are co-circular; either diagonal is legal.
        verify_triangulation(&triangulation);
        assert_eq!(triangulation.num_triangles(), 2);
        assert_approx_eq!(total_area(&triangulation), 1.0, 1e-12);
    }

    #[test]
    fn square_with_center_gives_four_triangles() {
        let points = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0], [0.0, 0.0]];
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        assert_eq!(triangulation.num_triangles(), 4);
        // Every triangle fans out of the center.
        let center = triangulation
            .points()
            .iter()
            .position(|p| *p == [0.0, 0.0])
            .unwrap();
        for t in triangulation.triangle_indices() {
            assert!(t.contains(&center));
        }
    }

    #[test]
    fn collinear_points_are_rejected() {
        init();
        let mut triangulation = Triangulation::new();
        let result = triangulation.triangulate(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);

        assert!(result.is_err());
    }

    #[test]
    fn too_few_points_give_an_empty_triangulation() {
        for points in [
            Vec::new(),
            vec![[1.0, 2.0]],
            vec![[1.0, 2.0], [3.0, 4.0]],
            // 3 points, but only 1 survives deduplication.
            vec![[0.0, 0.0], [0.0, 0.0], [1e-10, 0.0]],
        ] {
            init();
            let mut triangulation = Triangulation::new();
            triangulation.triangulate(&points).unwrap();

            assert_eq!(triangulation.num_triangles(), 0);
            assert!(triangulation.triangles().is_empty());
        }
    }

    #[test]
    fn duplicate_points_are_merged() {
        let points = [
            [0.0, 0.0],
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1e-12, 1e-12],
        ];
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        assert_eq!(triangulation.num_points(), 3);
        assert_eq!(triangulation.num_triangles(), 1);
    }

    #[test]
    fn point_on_an_edge_is_split_in() {
        // (1, 0) lies exactly on the segment between (0, 0) and (2, 0).
        let points = [[0.0, 0.0], [2.0, 0.0], [1.0, 2.0], [1.0, 0.0]];
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        assert_eq!(triangulation.num_triangles(), 2);
        // The on-edge point must appear in the output mesh.
        let split = triangulation
            .points()
            .iter()
            .position(|p| *p == [1.0, 0.0])
            .unwrap();
        assert!(triangulation
            .triangle_indices()
            .iter()
            .any(|t| t.contains(&split)));
    }

    #[test]
    fn grid_3x3() {
        let points: Vec<Vertex2> = (0..9)
            .map(|i| [(i % 3) as f64, (i / 3) as f64])
            .collect();
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        // h = 8 boundary points: 2 * 9 - 2 - 8.
        assert_eq!(triangulation.num_triangles(), 8);
        assert_approx_eq!(total_area(&triangulation), 4.0, 1e-12);
    }

    #[test]
    fn grid_10x10() {
        let points: Vec<Vertex2> = (0..100)
            .map(|i| [(i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1])
            .collect();
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        // h = 36 boundary points: 2 * 100 - 2 - 36.
        assert_eq!(triangulation.num_triangles(), 162);
        assert_approx_eq!(
            total_area(&triangulation),
            hull_area(triangulation.points()),
            1e-12
        );
    }

    #[test]
    fn nine_point_cloud() {
        let points = [
            [0.0, 7.0],
            [-5.0, 5.0],
            [5.0, 5.0],
            [-2.0, 3.0],
            [3.0, 1.0],
            [-4.0, -1.0],
            [1.0, -2.0],
            [-6.0, -4.0],
            [5.0, -4.0],
        ];
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        // 5 hull points: 2 * 9 - 2 - 5.
        assert_eq!(hull_point_count(triangulation.points()), 5);
        assert_eq!(triangulation.num_triangles(), 11);
    }

    #[test]
    fn runs_are_deterministic() {
        let points = sample_vertices_2d(100, None);

        let first = run(&points);
        let second = run(&points);

        assert_eq!(first.points(), second.points());
        assert_eq!(canonical_tris(&first), canonical_tris(&second));
    }

    #[test]
    fn result_is_independent_of_insertion_order() {
        let points = sample_vertices_2d(50, None);
        let mut reversed = points.clone();
        reversed.reverse();

        let forward = run(&points);
        let backward = run(&reversed);

        verify_triangulation(&forward);
        // Deduplication orders the points canonically, so the index triples
        // of two runs over the same cloud are directly comparable.
        assert_eq!(forward.points(), backward.points());
        assert_eq!(canonical_tris(&forward), canonical_tris(&backward));
    }

    #[test]
    fn far_away_clouds_keep_their_coordinates() {
        let points = [
            [1e6, 1e6],
            [1e6 + 10.0, 1e6],
            [1e6 + 10.0, 1e6 + 10.0],
            [1e6, 1e6 + 10.0],
        ];
        let triangulation = run(&points);

        verify_triangulation(&triangulation);
        assert_eq!(triangulation.num_triangles(), 2);
        for p in triangulation.points() {
            assert!(p[0] >= 1e6 && p[1] >= 1e6);
        }
        assert_approx_eq!(total_area(&triangulation), 100.0, 1e-12);
    }

    #[test]
    fn near_collinear_points_survive() {
        let points = [
            [0.0, 0.0],
            [1.0, 1e-10],
            [2.0, -1e-10],
            [3.0, 1e-10],
            [1.5, 1.0],
        ];
        init();
        let mut triangulation = Triangulation::new();
        triangulation.triangulate(&points).unwrap();

        assert!(triangulation.num_triangles() > 0);
        assert!(triangulation.is_sound());
    }

    #[test]
    fn vertex_adjacency_of_a_fan() {
        let points = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0], [0.0, 0.0]];
        let triangulation = run(&points);
        let adjacency = triangulation.vertex_adjacency();

        // Points are dedup-ordered: center lands at index 2.
        assert_eq!(triangulation.points()[2], [0.0, 0.0]);
        assert_eq!(adjacency.neighbors[2], vec![0, 1, 3, 4]);
        assert_eq!(adjacency.incident_tris[2].len(), 4);
        // A corner sees its two hull neighbors and the center.
        assert_eq!(adjacency.neighbors[0], vec![1, 2, 3]);
        assert_eq!(adjacency.incident_tris[0].len(), 2);
    }

    #[test]
    fn dual_graph_of_a_kite() {
        // All 4 points are co-circular around (5, 0), radius 5.
        let points = [[0.0, 0.0], [10.0, 0.0], [5.0, 5.0], [5.0, -5.0]];
        let triangulation = run(&points);
        let dual = triangulation.dual_graph();

        assert_eq!(dual.len(), 2);
        for node in &dual {
            assert_approx_eq!(node.circumcenter[0], 5.0, 1e-9);
            assert!(node.circumcenter[1].abs() < 1e-9);
            assert_eq!(node.neighbors, vec![1 - node.id]);
        }
    }

    #[test]
    fn a_session_runs_only_once() {
        let points = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let mut triangulation = run(&points);

        assert!(triangulation.triangulate(&points).is_err());
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        init();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut triangulation = Triangulation::new();
            let result = triangulation.triangulate(&[[0.0, 0.0], [1.0, bad], [2.0, 0.0]]);
            assert!(result.is_err());
        }
    }
}
