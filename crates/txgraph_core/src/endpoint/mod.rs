//! Relation end points.
//!
//! Each object has one end point per relation property. Real end points sit
//! on the side holding the foreign key and read it from the object's data
//! container. Virtual end points are tracked separately and loaded lazily.

mod collection;
mod modification;
mod virtual_object;

pub use collection::CollectionEndPoint;
pub use virtual_object::VirtualObjectEndPoint;

pub(crate) use modification::{ChangeKind, EndPointChange};

use txgraph_model::RelationEndPointId;

/// The foreign-key side of a relation.
///
/// Holds no state of its own; the value lives in the property of the same
/// name in the owning data container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealObjectEndPoint {
    id: RelationEndPointId,
}

impl RealObjectEndPoint {
    /// Creates a real end point.
    #[must_use]
    pub fn new(id: RelationEndPointId) -> Self {
        Self { id }
    }

    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the foreign key property backing this end point.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        self.id.property()
    }
}

/// A registered relation end point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationEndPoint {
    /// Foreign-key side.
    Real(RealObjectEndPoint),
    /// Virtual one-to-one side.
    VirtualObject(VirtualObjectEndPoint),
    /// Virtual one-to-many side.
    Collection(CollectionEndPoint),
}

impl RelationEndPoint {
    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        match self {
            Self::Real(ep) => ep.id(),
            Self::VirtualObject(ep) => ep.id(),
            Self::Collection(ep) => ep.id(),
        }
    }

    /// Returns whether this is a virtual end point.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        !matches!(self, Self::Real(_))
    }

    /// Returns whether the end point's data is loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Collection(ep) => ep.is_complete(),
            _ => true,
        }
    }

    /// Returns whether a virtual end point differs from its original state.
    ///
    /// Real end points always report `false`; their changes show up in the
    /// owning container.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        match self {
            Self::Real(_) => false,
            Self::VirtualObject(ep) => ep.has_changed(),
            Self::Collection(ep) => ep.has_changed(),
        }
    }

    /// Returns whether a virtual end point was modified, even back to its
    /// original state.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        match self {
            Self::Real(_) => false,
            Self::VirtualObject(ep) => ep.is_touched(),
            Self::Collection(ep) => ep.is_touched(),
        }
    }

    pub(crate) fn touch(&mut self) {
        match self {
            Self::Real(_) => {}
            Self::VirtualObject(ep) => ep.touch(),
            Self::Collection(ep) => ep.touch(),
        }
    }

    pub(crate) fn commit(&mut self) {
        match self {
            Self::Real(_) => {}
            Self::VirtualObject(ep) => ep.commit(),
            Self::Collection(ep) => ep.commit(),
        }
    }

    pub(crate) fn rollback(&mut self) {
        match self {
            Self::Real(_) => {}
            Self::VirtualObject(ep) => ep.rollback(),
            Self::Collection(ep) => ep.rollback(),
        }
    }

    /// Creates the copy a sub-transaction starts from.
    ///
    /// The parent's current state becomes the copy's original state.
    #[must_use]
    pub(crate) fn clone_for_sub(&self) -> Self {
        match self {
            Self::Real(ep) => Self::Real(ep.clone()),
            Self::VirtualObject(ep) => Self::VirtualObject(VirtualObjectEndPoint::new(
                ep.id().clone(),
                ep.related().cloned(),
            )),
            Self::Collection(ep) if ep.is_complete() => Self::Collection(
                CollectionEndPoint::complete(ep.id().clone(), ep.items().to_vec()),
            ),
            Self::Collection(ep) => {
                Self::Collection(CollectionEndPoint::incomplete(ep.id().clone()))
            }
        }
    }
}
