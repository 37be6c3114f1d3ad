//! Reconciliation core for Brightbox cloud resources.
//!
//! Two engines live here:
//!
//! - attribute reconciliation: [`update::build_update`] compares a desired
//!   state with the last-known remote snapshot and produces a
//!   [`update::MutationTarget`] holding only the fields that changed.
//! - disambiguating lookup: [`resolve::resolve_one`] narrows a candidate list
//!   with [`filter::FilterSet`] and insists on exactly one survivor.
//!
//! [`reconcile::Reconciler`] ties both to a [`client::RemoteClient`] and
//! writes results back into a [`state::LocalState`].

pub mod client;
pub mod entity;
pub mod error;
pub mod field;
pub mod filter;
pub mod fingerprint;
pub mod memory;
pub mod reconcile;
pub mod resolve;
pub mod schema;
pub mod state;
pub mod update;

pub use error::{Error, Result};
pub use fingerprint::{ensure_encoded, fingerprint, ContentFingerprint};
