use anyhow::{bail, Result};
use log::error;

use crate::utils::types::{TriIdx, VertexIdx};

/// An undirected mesh edge between two vertices.
///
/// Endpoints are stored sorted, so two edges compare equal iff they connect
/// the same unordered vertex pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Edge {
    a: VertexIdx,
    b: VertexIdx,
}

impl Edge {
    pub fn new(u: VertexIdx, v: VertexIdx) -> Self {
        debug_assert_ne!(u, v, "an edge needs two distinct vertices");
        if u < v {
            Self { a: u, b: v }
        } else {
            Self { a: v, b: u }
        }
    }

    pub const fn endpoints(&self) -> (VertexIdx, VertexIdx) {
        (self.a, self.b)
    }
}

/// A triangle of the arena: three vertex indices in counter-clockwise order
/// and the neighboring triangle across each edge.
///
/// `neighbors[i]` sits across the edge opposite `vertices[i]`, i.e. the edge
/// `(vertices[i+1], vertices[i+2])`. `None` marks the outer boundary of the
/// processed region.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub vertices: [VertexIdx; 3],
    pub neighbors: [Option<TriIdx>; 3],
}

impl Triangle {
    pub const fn new(vertices: [VertexIdx; 3], neighbors: [Option<TriIdx>; 3]) -> Self {
        Self {
            vertices,
            neighbors,
        }
    }

    /// Slot of `n_idx` in the neighbor array, if the triangles are adjacent.
    pub fn neighbor_slot(&self, n_idx: TriIdx) -> Option<usize> {
        self.neighbors.iter().position(|&n| n == Some(n_idx))
    }

    pub fn has_vertex(&self, v_idx: VertexIdx) -> bool {
        self.vertices.contains(&v_idx)
    }

    /// The three edges; `edges()[i]` is the edge opposite `vertices[i]`.
    pub fn edges(&self) -> [Edge; 3] {
        let [a, b, c] = self.vertices;
        [Edge::new(b, c), Edge::new(c, a), Edge::new(a, b)]
    }
}

/// Arena of triangles with logical deletion.
///
/// Slots are never reused, so a `TriIdx` stays stable for the lifetime of a
/// triangulation run; removal is an O(1) liveness flip. The number of deleted
/// slots is tracked separately so the live count stays cheap.
#[derive(Default)]
pub struct TriMesh {
    tris: Vec<Triangle>,
    alive: Vec<bool>,
    num_deleted: usize,
}

impl TriMesh {
    pub const fn new() -> Self {
        Self {
            tris: Vec::new(),
            alive: Vec::new(),
            num_deleted: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tris: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            num_deleted: 0,
        }
    }

    /// Add a triangle and retrieve its index.
    pub fn push(&mut self, tri: Triangle) -> TriIdx {
        self.tris.push(tri);
        self.alive.push(true);
        self.tris.len() - 1
    }

    /// Logically delete a triangle. Its slot (and index) remain allocated.
    pub fn remove(&mut self, idx: TriIdx) {
        if self.is_alive(idx) {
            self.alive[idx] = false;
            self.num_deleted += 1;
        }
    }

    pub fn is_alive(&self, idx: TriIdx) -> bool {
        self.alive.get(idx).copied().unwrap_or(false)
    }

    pub fn get(&self, idx: TriIdx) -> Result<&Triangle> {
        match self.tris.get(idx) {
            Some(tri) => Ok(tri),
            None => bail!("triangle index {idx} out of bounds"),
        }
    }

    pub fn get_mut(&mut self, idx: TriIdx) -> Result<&mut Triangle> {
        match self.tris.get_mut(idx) {
            Some(tri) => Ok(tri),
            None => bail!("triangle index {idx} out of bounds"),
        }
    }

    /// Number of live triangles.
    pub fn num_tris(&self) -> usize {
        self.tris.len() - self.num_deleted
    }

    pub const fn num_deleted_tris(&self) -> usize {
        self.num_deleted
    }

    /// Number of allocated slots, live and deleted.
    pub fn num_slots(&self) -> usize {
        self.tris.len()
    }

    pub fn iter_alive(&self) -> impl Iterator<Item = (TriIdx, &Triangle)> {
        self.tris
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.alive[*idx])
    }

    /// Redirect the link of `idx` that pointed at `old` to `new`.
    ///
    /// `idx = None` (boundary) is a no-op, as is a link that no longer exists;
    /// stale links are surfaced by [`Self::is_sound`], not here.
    pub fn replace_neighbor(&mut self, idx: Option<TriIdx>, old: TriIdx, new: TriIdx) -> Result<()> {
        let Some(idx) = idx else {
            return Ok(());
        };

        let tri = self.get_mut(idx)?;
        if let Some(slot) = tri.neighbor_slot(old) {
            tri.neighbors[slot] = Some(new);
        }
        Ok(())
    }

    /// Check the structural invariants of the mesh: live triangles have three
    /// distinct vertices, neighbor links point at live triangles, link back,
    /// and agree on the shared edge.
    pub fn is_sound(&self) -> bool {
        let mut sound = true;

        for (idx, tri) in self.iter_alive() {
            let [a, b, c] = tri.vertices;
            if a == b || b == c || c == a {
                error!("triangle {idx} has repeated vertices {:?}", tri.vertices);
                sound = false;
            }

            for (slot, neighbor) in tri.neighbors.iter().enumerate() {
                let Some(n_idx) = *neighbor else { continue };

                if !self.is_alive(n_idx) {
                    error!("triangle {idx} links to deleted triangle {n_idx}");
                    sound = false;
                    continue;
                }

                let n = &self.tris[n_idx];
                match n.neighbor_slot(idx) {
                    None => {
                        error!("triangle {n_idx} does not link back to {idx}");
                        sound = false;
                    }
                    Some(n_slot) => {
                        if tri.edges()[slot] != n.edges()[n_slot] {
                            error!("triangles {idx} and {n_idx} disagree on their shared edge");
                            sound = false;
                        }
                    }
                }
            }
        }

        sound
    }
}
