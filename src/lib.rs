//! Libretto graph core: a versioned narrative graph engine. `GraphWrite` is
//! the single transactional mutation point that produces immutable versions
//! via copy-on-write, preserving logical entity identity across versions and
//! projects. `CrossProject` and `Query` are the read/cross-cutting surfaces
//! built on top of the same `Store`.

pub mod codec;
pub mod config;
pub mod cross_project;
pub mod error;
pub mod graphwrite;
pub mod model;
pub mod query;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use cross_project::{CrossProject, EntityVersion, SharedEntity};
pub use error::{Error, Result};
pub use graphwrite::{ApplyResult, Delta, GraphWrite, RelationshipDelta};
pub use model::{Annotation, Entity, EntityType, GraphVersion, Project, Relationship};
pub use query::{EdgeDirection, EntityFilter, Neighbor, Query};
pub use store::Store;
