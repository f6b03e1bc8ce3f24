//! Coordinate projection and spatial indexing.

pub mod crs;
pub mod index;

pub use crs::{Crs, Projector};
pub use index::{StopIndex, StopNode};
