//! Embedded, ordered migrations. Each entry is `(name, sql)`; `name` is
//! recorded into `schema_migrations` so a migration never reapplies, and
//! each migration runs inside its own transaction (spec.md §4.1).
//!
//! This mirrors the teacher's `schemer`-registered, `include_str!`-backed
//! migrations, minus the generic migration-framework dependency: no
//! `schemer` adapter exists for SQLite in the example pack, and the
//! instructions forbid inventing one, so the runner here is a small
//! hand-rolled equivalent of the same ordered-transactional-migration idea.

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_create_projects", include_str!("migrations/0001_create_projects.sql")),
    ("0002_create_graph_versions", include_str!("migrations/0002_create_graph_versions.sql")),
    ("0003_create_entities", include_str!("migrations/0003_create_entities.sql")),
    ("0004_create_relationships", include_str!("migrations/0004_create_relationships.sql")),
    ("0005_create_annotations", include_str!("migrations/0005_create_annotations.sql")),
];
