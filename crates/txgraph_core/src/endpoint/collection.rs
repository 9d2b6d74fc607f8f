//! Collection end points.

use txgraph_model::{ObjectId, RelationEndPointId};

/// The "many" side of a one-to-many relation.
///
/// An incomplete end point is registered but holds no data; it is filled on
/// first access. Order is significant: reordering counts as a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEndPoint {
    id: RelationEndPointId,
    original: Vec<ObjectId>,
    current: Vec<ObjectId>,
    touched: bool,
    complete: bool,
}

impl CollectionEndPoint {
    /// Creates a loaded end point.
    #[must_use]
    pub fn complete(id: RelationEndPointId, items: Vec<ObjectId>) -> Self {
        Self {
            id,
            original: items.clone(),
            current: items,
            touched: false,
            complete: true,
        }
    }

    /// Creates an end point that still needs loading.
    #[must_use]
    pub fn incomplete(id: RelationEndPointId) -> Self {
        Self {
            id,
            original: Vec::new(),
            current: Vec::new(),
            touched: false,
            complete: false,
        }
    }

    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns whether the data is loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the current items.
    #[must_use]
    pub fn items(&self) -> &[ObjectId] {
        &self.current
    }

    /// Returns the items as last committed.
    #[must_use]
    pub fn original_items(&self) -> &[ObjectId] {
        &self.original
    }

    /// Returns whether `item` is currently contained.
    #[must_use]
    pub fn contains(&self, item: &ObjectId) -> bool {
        self.current.contains(item)
    }

    /// Returns the position of `item`.
    #[must_use]
    pub fn index_of(&self, item: &ObjectId) -> Option<usize> {
        self.current.iter().position(|i| i == item)
    }

    /// Returns whether the items or their order differ from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.original != self.current
    }

    /// Returns whether the end point was modified.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Fills an incomplete end point.
    pub(crate) fn set_data(&mut self, items: Vec<ObjectId>) {
        self.original = items.clone();
        self.current = items;
        self.touched = false;
        self.complete = true;
    }

    /// Drops the data of an unchanged end point.
    pub(crate) fn mark_incomplete(&mut self) {
        self.original.clear();
        self.current.clear();
        self.touched = false;
        self.complete = false;
    }

    pub(crate) fn insert(&mut self, index: usize, item: ObjectId) {
        let index = index.min(self.current.len());
        self.current.insert(index, item);
        self.touched = true;
    }

    pub(crate) fn remove(&mut self, item: &ObjectId) -> Option<usize> {
        let index = self.index_of(item)?;
        self.current.remove(index);
        self.touched = true;
        Some(index)
    }

    pub(crate) fn replace(&mut self, index: usize, item: ObjectId) {
        if let Some(slot) = self.current.get_mut(index) {
            *slot = item;
            self.touched = true;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.current.clear();
        self.touched = true;
    }

    /// Replaces the order of the current items without changing membership.
    pub(crate) fn reorder(&mut self, items: Vec<ObjectId>) {
        self.current = items;
        self.touched = true;
    }

    pub(crate) fn touch(&mut self) {
        self.touched = true;
    }

    pub(crate) fn commit(&mut self) {
        self.original = self.current.clone();
        self.touched = false;
    }

    pub(crate) fn rollback(&mut self) {
        self.current = self.original.clone();
        self.touched = false;
    }

    /// Takes over the current items of the same end point in a sub-transaction.
    pub(crate) fn set_from_sub(&mut self, sub: &CollectionEndPoint) {
        self.current = sub.current.clone();
        self.touched |= sub.touched;
        self.complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(keys: &[i64]) -> Vec<ObjectId> {
        keys.iter()
            .map(|k| ObjectId::integer("Order", *k))
            .collect()
    }

    fn end_point() -> CollectionEndPoint {
        CollectionEndPoint::complete(
            RelationEndPointId::new(ObjectId::integer("Customer", 1), "Orders"),
            ids(&[1, 2]),
        )
    }

    #[test]
    fn insert_and_remove() {
        let mut ep = end_point();
        ep.insert(1, ObjectId::integer("Order", 3));
        assert_eq!(ep.items(), ids(&[1, 3, 2]).as_slice());
        assert_eq!(ep.remove(&ObjectId::integer("Order", 1)), Some(0));
        assert!(ep.has_changed());
        assert_eq!(ep.remove(&ObjectId::integer("Order", 9)), None);
    }

    #[test]
    fn reorder_counts_as_change() {
        let mut ep = end_point();
        ep.reorder(ids(&[2, 1]));
        assert!(ep.has_changed());
        ep.rollback();
        assert!(!ep.has_changed());
    }

    #[test]
    fn incomplete_end_point_fills_on_load() {
        let mut ep = end_point();
        ep.mark_incomplete();
        assert!(!ep.is_complete());
        assert!(ep.items().is_empty());
        ep.set_data(ids(&[4]));
        assert!(ep.is_complete());
        assert!(!ep.has_changed());
    }

    #[derive(Debug, Clone)]
    enum Edit {
        Insert(usize, i64),
        Remove(i64),
        Replace(usize, i64),
        Clear,
    }

    fn edit_strategy() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0usize..4, 1i64..6).prop_map(|(i, k)| Edit::Insert(i, k)),
            (1i64..6).prop_map(Edit::Remove),
            (0usize..4, 1i64..6).prop_map(|(i, k)| Edit::Replace(i, k)),
            Just(Edit::Clear),
        ]
    }

    proptest! {
        #[test]
        fn rollback_restores_original_items(
            edits in prop::collection::vec(edit_strategy(), 0..12)
        ) {
            let mut ep = end_point();
            for edit in edits {
                match edit {
                    Edit::Insert(index, key) => {
                        let item = ObjectId::integer("Order", key);
                        ep.insert(index, item.clone());
                        prop_assert!(ep.contains(&item));
                    }
                    Edit::Remove(key) => {
                        ep.remove(&ObjectId::integer("Order", key));
                    }
                    Edit::Replace(index, key) => ep.replace(index, ObjectId::integer("Order", key)),
                    Edit::Clear => ep.clear(),
                }
            }
            ep.rollback();
            let expected = ids(&[1, 2]);
            prop_assert_eq!(ep.items(), expected.as_slice());
            prop_assert!(!ep.has_changed());
            prop_assert!(!ep.is_touched());
        }
    }
}
