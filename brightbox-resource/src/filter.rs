//! Pattern filters over candidate entities.
//!
//! Patterns are unanchored: `bar` matches `foobar`. Callers that want an exact
//! match anchor the pattern themselves (`^bar$`).

use regex::Regex;

use crate::entity::RemoteEntity;
use crate::error::{Error, Result};
use crate::field::DesiredState;
use crate::schema::{EntitySchema, FieldKind};

#[derive(Debug, Clone)]
pub struct Filter {
    field: String,
    pattern: Regex,
}

impl Filter {
    pub fn compile(field: &str, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Filter {
            field: field.to_string(),
            pattern: compiled,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, entity: &RemoteEntity) -> bool {
        self.pattern.is_match(&entity.attribute_text(&self.field))
    }
}

/// The declared filters of one lookup. Matching is conjunctive.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, failing if `pattern` does not compile.
    pub fn with(mut self, field: &str, pattern: &str) -> Result<Self> {
        self.filters.push(Filter::compile(field, pattern)?);
        Ok(self)
    }

    /// Collect the filters a query declares for the schema's filter fields.
    ///
    /// Fields the query leaves undeclared impose no constraint.
    pub fn from_query(schema: &EntitySchema, query: &DesiredState) -> Result<Self> {
        let mut set = FilterSet::new();
        for field in schema.filter_fields {
            if let Some(value) = query.declared(field) {
                let pattern = value.as_str().ok_or_else(|| Error::FieldType {
                    field: field.to_string(),
                    expected: FieldKind::String,
                })?;
                set = set.with(field, pattern)?;
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn matches(&self, entity: &RemoteEntity) -> bool {
        self.filters.iter().all(|f| f.matches(entity))
    }
}

/// The candidates that satisfy every filter, in their original order.
pub fn filter<'a>(
    candidates: &'a [RemoteEntity],
    filters: &'a FilterSet,
) -> impl Iterator<Item = &'a RemoteEntity> + 'a {
    candidates.iter().filter(move |e| filters.matches(e))
}
