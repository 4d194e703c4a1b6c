//! Ordered draw list: layer ascending, draw styles contiguous within a layer
//!
//! Keeping same-style items next to each other lets a single forward pass
//! bind each pipeline once per (layer, style) group instead of once per item.

use crate::foundation::ObjectId;
use crate::render::pipeline::PipelineType;

/// Anything that can be scheduled in a draw list
pub trait DrawItem {
    /// Stable object id
    fn object_id(&self) -> ObjectId;
    /// Draw-order bucket; lower layers draw first
    fn layer(&self) -> i32;
    /// Draw style, selects the pipeline
    fn pipeline_type(&self) -> PipelineType;
    /// Move to another layer; callers re-insert afterwards
    fn set_layer(&mut self, layer: i32);
}

/// Position at which an item with `layer` and `pipeline_type` keeps `items` grouped
///
/// Finds the last item whose layer is not above `layer`. A lower layer means
/// the item opens a new layer group right after it. An equal layer means the
/// item joins its style's run inside that layer, or opens a new run at the
/// end of the layer when no item of its style is there yet.
pub fn find_insert_index<T: DrawItem>(items: &[T], layer: i32, pipeline_type: PipelineType) -> usize {
    let Some(last_at_or_below) = items.iter().rposition(|item| item.layer() <= layer) else {
        return 0;
    };
    if items[last_at_or_below].layer() < layer {
        return last_at_or_below + 1;
    }

    let layer_start = items[..last_at_or_below]
        .iter()
        .rposition(|item| item.layer() < layer)
        .map_or(0, |below| below + 1);

    items[layer_start..=last_at_or_below]
        .iter()
        .rposition(|item| item.pipeline_type() == pipeline_type)
        .map_or(last_at_or_below + 1, |same| layer_start + same + 1)
}

/// True when `items` are layer ascending and style contiguous per layer
pub fn is_grouped<T: DrawItem>(items: &[T]) -> bool {
    let mut closed: Vec<PipelineType> = Vec::new();
    for pair in items.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.layer() < prev.layer() {
            return false;
        }
        if next.layer() > prev.layer() {
            closed.clear();
        } else if next.pipeline_type() != prev.pipeline_type() {
            if closed.contains(&next.pipeline_type()) {
                return false;
            }
            closed.push(prev.pipeline_type());
        }
    }
    true
}

/// Draw list that keeps its grouping invariant across every mutation
#[derive(Debug)]
pub struct SceneDrawList<T> {
    items: Vec<T>,
}

impl<T> Default for SceneDrawList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: DrawItem> SceneDrawList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item` at its group position and return that index
    pub fn insert(&mut self, item: T) -> usize {
        let index = find_insert_index(&self.items, item.layer(), item.pipeline_type());
        self.items.insert(index, item);
        debug_assert!(is_grouped(&self.items));
        index
    }

    /// Remove the item with `object_id`
    pub fn remove(&mut self, object_id: ObjectId) -> Option<T> {
        let index = self.position(object_id)?;
        Some(self.items.remove(index))
    }

    /// Change an item's layer by removing and re-inserting it
    pub fn set_layer(&mut self, object_id: ObjectId, layer: i32) -> Option<usize> {
        let mut item = self.remove(object_id)?;
        item.set_layer(layer);
        Some(self.insert(item))
    }

    /// Index of the item with `object_id`
    pub fn position(&self, object_id: ObjectId) -> Option<usize> {
        self.items.iter().position(|item| item.object_id() == object_id)
    }

    /// True when the list holds `object_id`
    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.position(object_id).is_some()
    }

    /// Item with `object_id`
    pub fn get(&self, object_id: ObjectId) -> Option<&T> {
        self.items.iter().find(|item| item.object_id() == object_id)
    }

    /// Items in draw order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Iterate in draw order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the list is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every item, in draw order
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.items.drain(..)
    }
}

impl<'a, T: DrawItem> IntoIterator for &'a SceneDrawList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Item {
        pub id: ObjectId,
        pub layer: i32,
        pub pipeline_type: PipelineType,
    }

    impl Item {
        pub fn new(id: ObjectId, layer: i32, pipeline_type: PipelineType) -> Self {
            Self {
                id,
                layer,
                pipeline_type,
            }
        }
    }

    impl DrawItem for Item {
        fn object_id(&self) -> ObjectId {
            self.id
        }
        fn layer(&self) -> i32 {
            self.layer
        }
        fn pipeline_type(&self) -> PipelineType {
            self.pipeline_type
        }
        fn set_layer(&mut self, layer: i32) {
            self.layer = layer;
        }
    }

    use PipelineType::{BumpMap as C, NoLight as A, Phong as B};

    fn shape(list: &SceneDrawList<Item>) -> Vec<(i32, PipelineType)> {
        list.iter().map(|item| (item.layer, item.pipeline_type)).collect()
    }

    // Small deterministic generator so the property tests need no extra crate
    fn lcg(seed: &mut u64) -> u64 {
        *seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        *seed >> 33
    }

    #[test]
    fn test_same_layer_types_are_not_interleaved() {
        let mut list = SceneDrawList::new();
        list.insert(Item::new(1, 0, A));
        list.insert(Item::new(2, 0, B));
        list.insert(Item::new(3, 1, A));
        list.insert(Item::new(4, 0, A));

        assert_eq!(shape(&list), vec![(0, A), (0, A), (0, B), (1, A)]);
        assert!(is_grouped(list.items()));
    }

    #[test]
    fn test_three_components_group_by_layer_then_type() {
        let mut list = SceneDrawList::new();
        list.insert(Item::new(1, 0, A));
        list.insert(Item::new(2, 0, B));
        list.insert(Item::new(3, 1, A));

        assert_eq!(shape(&list), vec![(0, A), (0, B), (1, A)]);
    }

    #[test]
    fn test_lower_layer_goes_to_front() {
        let mut list = SceneDrawList::new();
        list.insert(Item::new(1, 5, A));
        assert_eq!(list.insert(Item::new(2, -1, B)), 0);
        assert_eq!(list.insert(Item::new(3, 9, B)), 2);
        assert_eq!(list.insert(Item::new(4, 5, C)), 2);
        assert_eq!(shape(&list), vec![(-1, B), (5, A), (5, C), (9, B)]);
    }

    #[test]
    fn test_new_type_appends_to_end_of_layer_run() {
        let mut list = SceneDrawList::new();
        list.insert(Item::new(1, 0, A));
        list.insert(Item::new(2, 0, B));
        list.insert(Item::new(3, 2, A));
        let index = list.insert(Item::new(4, 0, C));
        assert_eq!(index, 2);
        assert_eq!(shape(&list), vec![(0, A), (0, B), (0, C), (2, A)]);
    }

    #[test]
    fn test_style_run_in_other_layer_is_ignored() {
        let mut list = SceneDrawList::new();
        list.insert(Item::new(1, 0, B));
        list.insert(Item::new(2, 1, A));
        list.insert(Item::new(3, 1, B));
        // B exists at layer 0 and 1; a new layer-1 B must join the layer-1 run
        let index = list.insert(Item::new(4, 1, B));
        assert_eq!(index, 3);
        assert_eq!(shape(&list), vec![(0, B), (1, A), (1, B), (1, B)]);
    }

    #[test]
    fn test_random_insertions_keep_grouping() {
        let types = [A, B, C];
        let mut seed = 0x5eed;
        for _ in 0..50 {
            let mut list = SceneDrawList::new();
            for id in 0..40 {
                let layer = i32::try_from(lcg(&mut seed) % 4).unwrap() - 1;
                let pipeline_type = types[usize::try_from(lcg(&mut seed) % 3).unwrap()];
                list.insert(Item::new(id, layer, pipeline_type));
                assert!(is_grouped(list.items()), "after inserting {id}: {:?}", shape(&list));
            }
        }
    }

    #[test]
    fn test_removal_keeps_grouping() {
        let types = [A, B, C];
        let mut seed = 42;
        let mut list = SceneDrawList::new();
        for id in 0..60 {
            let layer = i32::try_from(lcg(&mut seed) % 3).unwrap();
            list.insert(Item::new(id, layer, types[usize::try_from(lcg(&mut seed) % 3).unwrap()]));
        }
        while !list.is_empty() {
            let victim = list.items()[usize::try_from(lcg(&mut seed)).unwrap() % list.len()].id;
            assert!(list.remove(victim).is_some());
            assert!(!list.contains(victim));
            assert!(is_grouped(list.items()));
        }
    }

    #[test]
    fn test_set_layer_reinserts() {
        let mut list = SceneDrawList::new();
        list.insert(Item::new(1, 0, A));
        list.insert(Item::new(2, 0, B));
        list.insert(Item::new(3, 1, A));

        assert_eq!(list.set_layer(2, 2), Some(2));
        assert_eq!(list.get(2).unwrap().layer, 2);
        assert_eq!(shape(&list), vec![(0, A), (1, A), (2, B)]);
        assert_eq!(list.set_layer(99, 0), None);
    }

    #[test]
    fn test_is_grouped_detects_violations() {
        assert!(!is_grouped(&[Item::new(1, 1, A), Item::new(2, 0, A)]));
        assert!(!is_grouped(&[Item::new(1, 0, A), Item::new(2, 0, B), Item::new(3, 0, A)]));
        assert!(is_grouped(&[Item::new(1, 0, A), Item::new(2, 1, B), Item::new(3, 1, A)]));
        assert!(is_grouped::<Item>(&[]));
    }
}
