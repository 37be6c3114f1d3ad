use thiserror::Error;

use crate::client::RemoteError;
use crate::schema::{EntityType, FieldKind};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a single lookup or reconciliation call.
///
/// None of these are recovered locally; they are reported to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A filter pattern did not compile as a regular expression.
    #[error("invalid pattern for {field}: {pattern:?}: {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Your query returned no results. Please change your search criteria and try again.")]
    NoMatch,

    #[error(
        "Your query returned more than one result (found {count} entries). \
         Please try a more specific search criteria."
    )]
    AmbiguousMatch { count: usize },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("field {field} must be {expected}")]
    FieldType { field: String, expected: FieldKind },

    #[error("{entity_type} has no field named {field}")]
    UnknownField {
        entity_type: EntityType,
        field: String,
    },

    #[error("{entity_type} {id} still exists")]
    StillExists { entity_type: EntityType, id: String },

    /// The local state has no identifier yet, so there is nothing to address.
    #[error("local {0} state has no id")]
    MissingId(EntityType),
}

impl Error {
    /// Whether the error came from the remote API reporting a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Remote(e) if e.is_not_found())
    }
}
