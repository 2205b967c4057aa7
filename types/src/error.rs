//! Boundary validation errors.
//!
//! Every rejected write carries a machine-checkable [`ValidationError::code`],
//! a human-readable message (the `Display` impl) and, where one exists, a
//! corrective [`ValidationError::suggestion`]. Nothing at the write boundary
//! silently repairs a payload; the caller must resubmit.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field}: {message}")]
    Schema {
        field: &'static str,
        message: String,
        suggestion: Option<String>,
    },
    /// The citation set holds buyer-entity facts but no target-entity fact.
    #[error(
        "finding cites only buyer-entity facts ({}); findings must be anchored on the target",
        .buyer_facts.join(", ")
    )]
    EntityAnchorViolation { buyer_facts: Vec<String> },
    /// A value outside a closed vocabulary.
    #[error("invalid {field} {value:?}; expected one of: {}", .allowed.join(", "))]
    InvalidEnum {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// Two distinct findings hashed onto the same identifier.
    #[error("identifier {id} already belongs to {existing_key:?}, refusing {incoming_key:?}")]
    IdCollision {
        id: String,
        existing_key: String,
        incoming_key: String,
    },
}

impl ValidationError {
    pub const SCHEMA_ERROR: &'static str = "SCHEMA_ERROR";
    pub const ENTITY_ANCHOR_VIOLATION: &'static str = "ENTITY_ANCHOR_VIOLATION";
    pub const INVALID_ENUM: &'static str = "INVALID_ENUM";
    pub const NOT_FOUND: &'static str = "NOT_FOUND";
    pub const ID_COLLISION: &'static str = "ID_COLLISION";

    /// A required field was missing or blank.
    #[must_use]
    pub fn missing(field: &'static str, message: impl Into<String>) -> Self {
        Self::Schema {
            field,
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn missing_with_hint(
        field: &'static str,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Schema {
            field,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => Self::SCHEMA_ERROR,
            Self::EntityAnchorViolation { .. } => Self::ENTITY_ANCHOR_VIOLATION,
            Self::InvalidEnum { .. } => Self::INVALID_ENUM,
            Self::NotFound { .. } => Self::NOT_FOUND,
            Self::IdCollision { .. } => Self::ID_COLLISION,
        }
    }

    /// What the caller should change before resubmitting, if anything.
    #[must_use]
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Schema { suggestion, .. } => suggestion.clone(),
            Self::EntityAnchorViolation { .. } => {
                Some("cite at least one target-entity fact".to_string())
            }
            Self::InvalidEnum { allowed, .. } => Some(format!("use one of: {}", allowed.join(", "))),
            Self::NotFound { kind, .. } => Some(format!("create the {kind} before referencing it")),
            Self::IdCollision { .. } => {
                Some("reword the title so it does not collide with an existing finding".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_violation_carries_code_and_suggestion() {
        let err = ValidationError::EntityAnchorViolation {
            buyer_facts: vec!["F-BYR-APP-001".to_string()],
        };
        assert_eq!(err.code(), "ENTITY_ANCHOR_VIOLATION");
        assert!(err.to_string().contains("F-BYR-APP-001"));
        assert_eq!(
            err.suggestion().as_deref(),
            Some("cite at least one target-entity fact")
        );
    }

    #[test]
    fn invalid_enum_lists_allowed_values() {
        let err = ValidationError::InvalidEnum {
            field: "severity",
            value: "urgent".to_string(),
            allowed: &["critical", "high"],
        };
        assert_eq!(err.code(), "INVALID_ENUM");
        assert_eq!(
            err.to_string(),
            "invalid severity \"urgent\"; expected one of: critical, high"
        );
    }

    #[test]
    fn schema_error_without_hint_has_no_suggestion() {
        let err = ValidationError::missing("claim", "must not be empty");
        assert_eq!(err.code(), "SCHEMA_ERROR");
        assert_eq!(err.suggestion(), None);
        assert_eq!(err.to_string(), "claim: must not be empty");
    }
}
