//! Per-field change detection and assignment.
//!
//! Change detection is an explicit comparison between the desired state and
//! the last-known remote snapshot, reported as a [`FieldChange`]. The
//! assigners turn that into an [`Assignment`], which says whether the field
//! goes into a partial update, and with which value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::RemoteEntity;
use crate::error::{Error, Result};
use crate::fingerprint::{ensure_encoded, fingerprint};
use crate::schema::{FieldKind, FieldSpec};

/// The caller's declared configuration for one entity.
///
/// A missing key or a JSON `null` means the field is not declared. Any other
/// value, including `""` or `[]`, is a declared value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState(pub Map<String, Value>);

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn declared(&self, name: &str) -> Option<&Value> {
        match self.0.get(name) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }
}

/// How a field of the desired state relates to the last-known snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldChange<'a> {
    /// Neither side carries a meaningful value.
    Unset,
    Unchanged(&'a Value),
    /// `None` means the field was set before and is now undeclared.
    Changed(Option<&'a Value>),
}

impl FieldChange<'_> {
    pub fn is_changed(&self) -> bool {
        matches!(self, FieldChange::Changed(_))
    }
}

pub fn diff_field<'a>(
    spec: &FieldSpec,
    desired: &'a DesiredState,
    last_known: &'a RemoteEntity,
) -> Result<FieldChange<'a>> {
    let last = last_known.attribute(spec.name);
    match desired.declared(spec.name) {
        None => match last {
            None => Ok(FieldChange::Unset),
            Some(v) if is_zero(spec.kind, v) => Ok(FieldChange::Unset),
            Some(v) if spec.computed => Ok(FieldChange::Unchanged(v)),
            Some(_) => Ok(FieldChange::Changed(None)),
        },
        Some(d) => {
            check_kind(spec, d)?;
            let same = match last {
                Some(l) => equivalent(spec.kind, d, l),
                None => is_zero(spec.kind, d),
            };
            if same {
                Ok(FieldChange::Unchanged(d))
            } else {
                Ok(FieldChange::Changed(Some(d)))
            }
        }
    }
}

fn check_kind(spec: &FieldSpec, value: &Value) -> Result<()> {
    let ok = match spec.kind {
        FieldKind::String | FieldKind::EncodedText => value.is_string(),
        FieldKind::Int => value.is_i64(),
        FieldKind::Bool => value.is_boolean(),
        FieldKind::StringSet => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::FieldType {
            field: spec.name.to_string(),
            expected: spec.kind,
        })
    }
}

fn is_zero(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::String | FieldKind::EncodedText => value.as_str() == Some(""),
        FieldKind::Int => value.as_i64() == Some(0),
        FieldKind::Bool => value.as_bool() == Some(false),
        FieldKind::StringSet => value.as_array().is_some_and(|a| a.is_empty()),
    }
}

fn equivalent(kind: FieldKind, desired: &Value, last: &Value) -> bool {
    match kind {
        FieldKind::StringSet => string_set(desired) == string_set(last),
        FieldKind::EncodedText => match (desired.as_str(), last.as_str()) {
            // The last-known side may hold the payload or only its fingerprint.
            (Some(d), Some(l)) => {
                let d = fingerprint(d);
                d == *l || d == fingerprint(l)
            }
            _ => false,
        },
        _ => desired == last,
    }
}

fn string_set(value: &Value) -> BTreeSet<&str> {
    value
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// The outcome of assigning one field into a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment<T> {
    /// Leave the field out of the request.
    Omit,
    /// Send the zero value of the field's type.
    ClearToDefault,
    SetTo(T),
}

impl<T> Assignment<T> {
    pub fn is_omit(&self) -> bool {
        matches!(self, Assignment::Omit)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Assignment<U> {
        match self {
            Assignment::Omit => Assignment::Omit,
            Assignment::ClearToDefault => Assignment::ClearToDefault,
            Assignment::SetTo(v) => Assignment::SetTo(f(v)),
        }
    }
}

impl<T: Default> Assignment<T> {
    /// The value to send, if any.
    pub fn materialize(self) -> Option<T> {
        match self {
            Assignment::Omit => None,
            Assignment::ClearToDefault => Some(T::default()),
            Assignment::SetTo(v) => Some(v),
        }
    }
}

fn field_spec(last_known: &RemoteEntity, name: &str) -> Result<&'static FieldSpec> {
    last_known
        .schema()
        .mutable_field(name)
        .ok_or_else(|| Error::UnknownField {
            entity_type: last_known.entity_type,
            field: name.to_string(),
        })
}

fn expect_kind(spec: &FieldSpec, kind: FieldKind) -> Result<()> {
    if spec.kind == kind {
        Ok(())
    } else {
        Err(Error::FieldType {
            field: spec.name.to_string(),
            expected: spec.kind,
        })
    }
}

fn assign_scalar<T>(
    desired: &DesiredState,
    last_known: &RemoteEntity,
    name: &str,
    kind: FieldKind,
    extract: impl FnOnce(&Value) -> Option<T>,
) -> Result<Assignment<T>> {
    let spec = field_spec(last_known, name)?;
    expect_kind(spec, kind)?;
    match diff_field(spec, desired, last_known)? {
        FieldChange::Unset | FieldChange::Unchanged(_) => Ok(Assignment::Omit),
        FieldChange::Changed(None) => Ok(Assignment::ClearToDefault),
        FieldChange::Changed(Some(v)) => {
            extract(v)
                .map(Assignment::SetTo)
                .ok_or_else(|| Error::FieldType {
                    field: spec.name.to_string(),
                    expected: spec.kind,
                })
        }
    }
}

pub fn assign_string(
    desired: &DesiredState,
    last_known: &RemoteEntity,
    name: &str,
) -> Result<Assignment<String>> {
    assign_scalar(desired, last_known, name, FieldKind::String, |v| {
        v.as_str().map(str::to_string)
    })
}

pub fn assign_int(
    desired: &DesiredState,
    last_known: &RemoteEntity,
    name: &str,
) -> Result<Assignment<i64>> {
    assign_scalar(desired, last_known, name, FieldKind::Int, Value::as_i64)
}

pub fn assign_bool(
    desired: &DesiredState,
    last_known: &RemoteEntity,
    name: &str,
) -> Result<Assignment<bool>> {
    assign_scalar(desired, last_known, name, FieldKind::Bool, Value::as_bool)
}

/// Like [`assign_string`], but the value sent is base64 encoded exactly once.
pub fn assign_encoded(
    desired: &DesiredState,
    last_known: &RemoteEntity,
    name: &str,
) -> Result<Assignment<String>> {
    assign_scalar(desired, last_known, name, FieldKind::EncodedText, |v| {
        v.as_str().map(ensure_encoded)
    })
}

/// Recompute a collection field, but only when it changed.
pub fn assign_string_set(
    desired: &DesiredState,
    last_known: &RemoteEntity,
    name: &str,
) -> Result<Assignment<Vec<String>>> {
    let spec = field_spec(last_known, name)?;
    expect_kind(spec, FieldKind::StringSet)?;
    if diff_field(spec, desired, last_known)?.is_changed() {
        assign_string_set_always(desired, name)
    } else {
        Ok(Assignment::Omit)
    }
}

/// Recompute a collection field from the desired state unconditionally.
///
/// An undeclared or empty collection yields an empty list, never `Omit`.
/// Duplicates are dropped, keeping the first occurrence.
pub fn assign_string_set_always(
    desired: &DesiredState,
    name: &str,
) -> Result<Assignment<Vec<String>>> {
    let Some(value) = desired.declared(name) else {
        return Ok(Assignment::SetTo(Vec::new()));
    };
    let items = value.as_array().ok_or_else(|| Error::FieldType {
        field: name.to_string(),
        expected: FieldKind::StringSet,
    })?;
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let s = item.as_str().ok_or_else(|| Error::FieldType {
            field: name.to_string(),
            expected: FieldKind::StringSet,
        })?;
        if seen.insert(s) {
            out.push(s.to_string());
        }
    }
    Ok(Assignment::SetTo(out))
}
