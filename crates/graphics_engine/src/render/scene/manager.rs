//! Scene registry and the unassigned object pool

use slotmap::{new_key_type, SlotMap};

use crate::foundation::ObjectId;
use crate::render::error::{EngineError, EngineResult};
use crate::render::scene::draw_list::{DrawItem, SceneDrawList};

new_key_type! {
    /// Handle of a registered scene; stale handles never alias a newer scene
    pub struct SceneId;
}

/// Where an object currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Owned by no scene
    Unassigned,
    /// In the draw list of a scene
    Scene(SceneId),
}

/// A draw list plus the scene-wide data bound while drawing it
#[derive(Debug)]
pub struct Scene<T, G> {
    globals: G,
    draw_list: SceneDrawList<T>,
    dirty: bool,
}

impl<T: DrawItem, G> Scene<T, G> {
    /// Scene-wide bindings
    pub const fn globals(&self) -> &G {
        &self.globals
    }

    /// Ordered draw list
    pub const fn draw_list(&self) -> &SceneDrawList<T> {
        &self.draw_list
    }

    /// True when the draw list changed since the last [`mark_recorded`](Self::mark_recorded)
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record that commands now reflect the draw list
    pub fn mark_recorded(&mut self) {
        self.dirty = false;
    }
}

/// Owns every scene and every object not attached to one
///
/// An object is in exactly one place: the unassigned pool or one scene.
/// The pool is ordered like a scene, and every move between containers is a
/// remove followed by an ordered insertion, so no list is ever observable
/// out of order.
#[derive(Debug)]
pub struct SceneManager<T, G> {
    scenes: SlotMap<SceneId, Scene<T, G>>,
    unassigned: SceneDrawList<T>,
}

impl<T: DrawItem, G> Default for SceneManager<T, G> {
    fn default() -> Self {
        Self {
            scenes: SlotMap::with_key(),
            unassigned: SceneDrawList::new(),
        }
    }
}

impl<T: DrawItem, G> SceneManager<T, G> {
    /// Create a manager with no scenes
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty scene
    pub fn register_scene(&mut self, globals: G) -> SceneId {
        let id = self.scenes.insert(Scene {
            globals,
            draw_list: SceneDrawList::new(),
            dirty: true,
        });
        log::debug!("[SCENE] Registered {id:?}");
        id
    }

    /// Remove a scene, returning its objects to the unassigned pool
    pub fn deregister_scene(&mut self, scene_id: SceneId) -> EngineResult<G> {
        let mut scene = self.scenes.remove(scene_id).ok_or(EngineError::SceneNotFound)?;
        let moved = scene.draw_list.len();
        for item in scene.draw_list.drain() {
            self.unassigned.insert(item);
        }
        log::debug!("[SCENE] Deregistered {scene_id:?}, {moved} objects unassigned");
        Ok(scene.globals)
    }

    /// Put a new object in the unassigned pool
    pub fn add_unassigned(&mut self, item: T) -> EngineResult<()> {
        let object_id = item.object_id();
        if self.locate(object_id).is_some() {
            return Err(EngineError::AssignedElsewhere { object_id });
        }
        self.unassigned.insert(item);
        Ok(())
    }

    /// Move an unassigned object into a scene
    pub fn attach(&mut self, scene_id: SceneId, object_id: ObjectId) -> EngineResult<()> {
        if !self.scenes.contains_key(scene_id) {
            return Err(EngineError::SceneNotFound);
        }
        let Some(item) = self.unassigned.remove(object_id) else {
            return Err(match self.locate(object_id) {
                Some(Location::Scene(_)) => EngineError::AssignedElsewhere { object_id },
                _ => EngineError::NotFound { object_id },
            });
        };

        let scene = self.scene_entry(scene_id)?;
        scene.draw_list.insert(item);
        scene.dirty = true;
        Ok(())
    }

    /// Move an object from a scene back to the unassigned pool
    pub fn detach(&mut self, scene_id: SceneId, object_id: ObjectId) -> EngineResult<()> {
        let scene = self.scene_entry(scene_id)?;
        let item = scene
            .draw_list
            .remove(object_id)
            .ok_or(EngineError::NotFound { object_id })?;
        scene.dirty = true;
        self.unassigned.insert(item);
        Ok(())
    }

    /// Take an object out of the manager; the caller drops it to destroy it
    ///
    /// With no scene the unassigned pool is searched.
    pub fn delete(&mut self, object_id: ObjectId, scene_id: Option<SceneId>) -> EngineResult<T> {
        match scene_id {
            Some(scene_id) => {
                let scene = self.scene_entry(scene_id)?;
                let item = scene
                    .draw_list
                    .remove(object_id)
                    .ok_or(EngineError::NotFound { object_id })?;
                scene.dirty = true;
                Ok(item)
            }
            None => self
                .unassigned
                .remove(object_id)
                .ok_or(EngineError::NotFound { object_id }),
        }
    }

    /// Change an object's layer, keeping its scene ordered
    pub fn set_layer(&mut self, object_id: ObjectId, layer: i32, scene_id: Option<SceneId>) -> EngineResult<()> {
        match scene_id {
            Some(scene_id) => {
                let scene = self.scene_entry(scene_id)?;
                scene
                    .draw_list
                    .set_layer(object_id, layer)
                    .ok_or(EngineError::NotFound { object_id })?;
                scene.dirty = true;
            }
            None => {
                self.unassigned
                    .set_layer(object_id, layer)
                    .ok_or(EngineError::NotFound { object_id })?;
            }
        }
        Ok(())
    }

    /// Where `object_id` lives, if anywhere
    pub fn locate(&self, object_id: ObjectId) -> Option<Location> {
        if self.unassigned.contains(object_id) {
            return Some(Location::Unassigned);
        }
        self.scenes
            .iter()
            .find(|(_, scene)| scene.draw_list.contains(object_id))
            .map(|(id, _)| Location::Scene(id))
    }

    /// Object with `object_id`, wherever it lives
    pub fn get(&self, object_id: ObjectId) -> Option<&T> {
        self.unassigned
            .get(object_id)
            .or_else(|| self.scenes.values().find_map(|scene| scene.draw_list.get(object_id)))
    }

    /// Registered scene
    pub fn scene(&self, scene_id: SceneId) -> EngineResult<&Scene<T, G>> {
        self.scenes.get(scene_id).ok_or(EngineError::SceneNotFound)
    }

    /// Registered scene, mutable
    pub fn scene_mut(&mut self, scene_id: SceneId) -> EngineResult<&mut Scene<T, G>> {
        self.scene_entry(scene_id)
    }

    /// Ids of all registered scenes
    pub fn scene_ids(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.scenes.keys()
    }

    /// Objects owned by no scene, in draw order
    pub fn unassigned(&self) -> &[T] {
        self.unassigned.items()
    }

    fn scene_entry(&mut self, scene_id: SceneId) -> EngineResult<&mut Scene<T, G>> {
        self.scenes.get_mut(scene_id).ok_or(EngineError::SceneNotFound)
    }
}
