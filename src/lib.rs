//! # tricell
//!
//! An implementation of 2D Delaunay triangulation via incremental insertion,
//! with Voronoi dual export.

pub use triangulation::{DualNode, Triangulation, VertexAdjacency};
pub use trimesh::{Edge, Triangle, TriMesh};
pub use utils::types::{TriIdx, Triangle2, Vertex2, VertexIdx};

pub mod predicates;
pub mod triangulation;
pub mod trimesh;
mod utils;
