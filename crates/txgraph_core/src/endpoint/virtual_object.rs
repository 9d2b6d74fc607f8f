//! Virtual one-to-one end points.

use txgraph_model::{ObjectId, RelationEndPointId};

/// The side of a one-to-one relation that holds no foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualObjectEndPoint {
    id: RelationEndPointId,
    original: Option<ObjectId>,
    current: Option<ObjectId>,
    touched: bool,
}

impl VirtualObjectEndPoint {
    /// Creates a loaded end point.
    #[must_use]
    pub fn new(id: RelationEndPointId, related: Option<ObjectId>) -> Self {
        Self {
            id,
            original: related.clone(),
            current: related,
            touched: false,
        }
    }

    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the currently related object.
    #[must_use]
    pub fn related(&self) -> Option<&ObjectId> {
        self.current.as_ref()
    }

    /// Returns the related object as last committed.
    #[must_use]
    pub fn original_related(&self) -> Option<&ObjectId> {
        self.original.as_ref()
    }

    /// Returns whether the related object differs from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.original != self.current
    }

    /// Returns whether the end point was modified.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub(crate) fn set(&mut self, related: Option<ObjectId>) {
        self.current = related;
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

    pub(crate) fn set_from_sub(&mut self, sub: &VirtualObjectEndPoint) {
        self.current = sub.current.clone();
        self.touched |= sub.touched;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_rollback() {
        let ticket = ObjectId::integer("OrderTicket", 1);
        let mut ep = VirtualObjectEndPoint::new(
            RelationEndPointId::new(ObjectId::integer("Order", 1), "OrderTicket"),
            Some(ticket.clone()),
        );
        ep.set(None);
        assert!(ep.has_changed());
        assert_eq!(ep.original_related(), Some(&ticket));
        ep.rollback();
        assert_eq!(ep.related(), Some(&ticket));
        assert!(!ep.is_touched());
    }
}
