//! Inventory snapshot, fact sources, three-way diff, and the reconciler
//! (component H).
//!
//! A server's inventory is ten logical [`FactKey`]s; each has a
//! [`model::FactDef`] describing its fact-source query, remote collection
//! URL, primary key, and [`Coercion`] table. [`FactSource`] abstracts where
//! a key's rows come from — the real fact-query tool or, for a few keys, an
//! in-process fallback — so the [`Reconciler`] never branches on which one
//! answered. `commit` pushes one aggregated snapshot; `sync` reconciles each
//! key against the server's own copy via [`three_way_diff`].

mod coercion;
mod diff;
mod model;
mod reconciler;
mod source;

pub use coercion::{coerce_rows, Coercion};
pub use diff::{three_way_diff, DiffResult};
pub use model::{packages_sql, FactDef, FactKey};
pub use reconciler::Reconciler;
pub use source::{FactSource, FactSourceError, OsqueryFactSource, SysinfoFactSource};
