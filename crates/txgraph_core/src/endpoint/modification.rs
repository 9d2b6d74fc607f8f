//! Planned relation end point modifications.

use txgraph_model::{ObjectId, RelationEndPointId};

/// What happens to one end point during a relation change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    /// A scalar end point moves from `old` to `new`.
    Set {
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    },
    /// An item is inserted into a collection.
    Insert { index: usize, item: ObjectId },
    /// An item is removed from a collection.
    Remove { item: ObjectId },
    /// The item at `index` is swapped for another.
    Replace {
        index: usize,
        old: ObjectId,
        new: ObjectId,
    },
    /// Every item is removed from a collection.
    Clear,
}

impl ChangeKind {
    /// Whether an item leaves a collection.
    pub(crate) fn removes_item(&self) -> bool {
        matches!(self, Self::Remove { .. } | Self::Replace { .. })
    }

    /// Whether an item joins a collection.
    pub(crate) fn adds_item(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Replace { .. })
    }
}

/// One step of a relation change.
///
/// A bidirectional change touches up to four end points: the modified one,
/// the new related object's opposite end point, that object's previous
/// partner, and the previous related object's opposite end point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndPointChange {
    pub(crate) end_point: RelationEndPointId,
    pub(crate) kind: ChangeKind,
    /// Whether observers hear about this step.
    pub(crate) notify: bool,
}

impl EndPointChange {
    pub(crate) fn new(end_point: RelationEndPointId, kind: ChangeKind) -> Self {
        Self {
            end_point,
            kind,
            notify: true,
        }
    }

    pub(crate) fn silent(end_point: RelationEndPointId, kind: ChangeKind) -> Self {
        Self {
            end_point,
            kind,
            notify: false,
        }
    }

    pub(crate) fn set(
        end_point: RelationEndPointId,
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    ) -> Self {
        Self::new(end_point, ChangeKind::Set { old, new })
    }

    /// The object leaving the end point, as reported to observers.
    pub(crate) fn old_related(&self) -> Option<&ObjectId> {
        match &self.kind {
            ChangeKind::Set { old, .. } => old.as_ref(),
            ChangeKind::Remove { item } => Some(item),
            ChangeKind::Replace { old, .. } => Some(old),
            ChangeKind::Insert { .. } | ChangeKind::Clear => None,
        }
    }

    /// The object entering the end point, as reported to observers.
    pub(crate) fn new_related(&self) -> Option<&ObjectId> {
        match &self.kind {
            ChangeKind::Set { new, .. } => new.as_ref(),
            ChangeKind::Insert { item, .. } => Some(item),
            ChangeKind::Replace { new, .. } => Some(new),
            ChangeKind::Remove { .. } | ChangeKind::Clear => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_reports_both_sides() {
        let old = ObjectId::integer("Order", 1);
        let new = ObjectId::integer("Order", 2);
        let change = EndPointChange::new(
            RelationEndPointId::new(ObjectId::integer("Customer", 1), "Orders"),
            ChangeKind::Replace {
                index: 0,
                old: old.clone(),
                new: new.clone(),
            },
        );
        assert_eq!(change.old_related(), Some(&old));
        assert_eq!(change.new_related(), Some(&new));
        assert!(change.notify);
        assert!(change.kind.removes_item() && change.kind.adds_item());
        assert!(!ChangeKind::Clear.adds_item());
    }
}
