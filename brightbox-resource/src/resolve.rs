use tracing::debug;

use crate::entity::RemoteEntity;
use crate::error::{Error, Result};
use crate::filter::{filter, FilterSet};

/// The outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult<'a> {
    SingleMatch(&'a RemoteEntity),
    NoMatch,
    AmbiguousMatch(usize),
}

impl<'a> MatchResult<'a> {
    pub fn classify(candidates: &'a [RemoteEntity], filters: &'a FilterSet) -> Self {
        let mut matches = filter(candidates, filters);
        match (matches.next(), matches.next()) {
            (None, _) => MatchResult::NoMatch,
            (Some(one), None) => MatchResult::SingleMatch(one),
            (Some(_), Some(_)) => MatchResult::AmbiguousMatch(2 + matches.count()),
        }
    }

    pub fn into_result(self) -> Result<&'a RemoteEntity> {
        match self {
            MatchResult::SingleMatch(e) => Ok(e),
            MatchResult::NoMatch => Err(Error::NoMatch),
            MatchResult::AmbiguousMatch(count) => Err(Error::AmbiguousMatch { count }),
        }
    }
}

/// Select the single candidate satisfying `filters`.
///
/// Zero or several survivors are errors; the first match is never picked
/// silently.
pub fn resolve_one<'a>(
    candidates: &'a [RemoteEntity],
    filters: &'a FilterSet,
) -> Result<&'a RemoteEntity> {
    let found = MatchResult::classify(candidates, filters).into_result()?;
    debug!(id = %found.id, "single {} found", found.entity_type);
    Ok(found)
}
