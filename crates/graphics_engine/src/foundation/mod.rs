//! Foundation utilities shared by the renderer

pub mod ids;
pub mod logging;

pub use ids::{IdAllocator, ObjectId};
