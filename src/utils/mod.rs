pub mod point_order;
pub mod remap;
pub mod types;
