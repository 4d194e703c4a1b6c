//! Scenes: ordered draw lists and their global bindings

pub mod draw_list;
pub mod globals;
pub mod manager;

pub use draw_list::{find_insert_index, is_grouped, DrawItem, SceneDrawList};
pub use globals::{GlobalBuffers, PaddedVec3, SceneGlobals};
pub use manager::{Location, Scene, SceneId, SceneManager};
