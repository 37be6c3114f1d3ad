use serde_json::{Map, Value};
use thiserror::Error;

use crate::entity::RemoteEntity;
use crate::schema::EntityType;
use crate::update::MutationTarget;

/// Coarse classification of a remote failure. Reconciliation only branches
/// on "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    NotFound,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote API error{}: {message}", .status_code.map(|c| format!(" ({})", c)).unwrap_or_default())]
pub struct RemoteError {
    pub status: StatusClass,
    pub status_code: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn not_found(message: impl Into<String>) -> Self {
        RemoteError {
            status: StatusClass::NotFound,
            status_code: Some(404),
            message: message.into(),
        }
    }

    pub fn other(status_code: Option<u16>, message: impl Into<String>) -> Self {
        RemoteError {
            status: StatusClass::Other,
            status_code,
            message: message.into(),
        }
    }

    /// Classify an HTTP status code.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        if status_code == 404 {
            Self::not_found(message)
        } else {
            Self::other(Some(status_code), message)
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusClass::NotFound
    }
}

/// The remote API as seen by the reconciliation core.
///
/// Calls are synchronous: each returns a result or a [`RemoteError`], which
/// the core propagates unchanged. Retries, if any, belong to implementors.
pub trait RemoteClient {
    fn list(&self, entity_type: EntityType) -> Result<Vec<RemoteEntity>, RemoteError>;

    fn get(&self, entity_type: EntityType, id: &str) -> Result<RemoteEntity, RemoteError>;

    fn create(
        &self,
        entity_type: EntityType,
        payload: &Map<String, Value>,
    ) -> Result<RemoteEntity, RemoteError>;

    fn update(
        &self,
        entity_type: EntityType,
        id: &str,
        target: &MutationTarget,
    ) -> Result<RemoteEntity, RemoteError>;

    fn delete(&self, entity_type: EntityType, id: &str) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_404_is_not_found() {
        let e = RemoteError::from_status(404, "no such cloud ip");
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "remote API error (404): no such cloud ip");
    }

    #[test]
    fn other_statuses_are_not_not_found() {
        let e = RemoteError::from_status(503, "unavailable");
        assert!(!e.is_not_found());
        assert_eq!(e.status, StatusClass::Other);
        assert_eq!(
            RemoteError::other(None, "connection reset").to_string(),
            "remote API error: connection reset"
        );
    }
}
