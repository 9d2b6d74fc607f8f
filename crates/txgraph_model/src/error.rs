//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or querying a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The class is not part of the mapping.
    #[error("class '{class}' is not mapped")]
    UnknownClass {
        /// Name of the class.
        class: String,
    },

    /// The property is not defined on the class.
    #[error("class '{class}' has no property '{property}'")]
    UnknownProperty {
        /// Name of the class.
        class: String,
        /// Name of the property.
        property: String,
    },

    /// A class is mapped more than once.
    #[error("class '{class}' is mapped more than once")]
    DuplicateClass {
        /// Name of the class.
        class: String,
    },

    /// A property or relation property name is used twice on one class.
    #[error("class '{class}' defines '{property}' more than once")]
    DuplicateProperty {
        /// Name of the class.
        class: String,
        /// Name of the property.
        property: String,
    },

    /// A relation definition is inconsistent.
    #[error("invalid relation '{relation}': {message}")]
    InvalidRelation {
        /// Relation identifier.
        relation: String,
        /// Description of the problem.
        message: String,
    },

    /// A textual object ID could not be parsed.
    #[error("invalid object id '{input}'")]
    InvalidObjectId {
        /// The rejected input.
        input: String,
    },
}

impl ModelError {
    /// Creates an unknown class error.
    pub fn unknown_class(class: impl Into<String>) -> Self {
        Self::UnknownClass {
            class: class.into(),
        }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            class: class.into(),
            property: property.into(),
        }
    }

    /// Creates an invalid relation error.
    pub fn invalid_relation(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRelation {
            relation: relation.into(),
            message: message.into(),
        }
    }
}
