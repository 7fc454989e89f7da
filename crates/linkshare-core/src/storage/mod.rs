//! Storage layer
//!
//! SQLite persistence for resources, tags, recommendations and collections.
//!
//! ## Layout
//!
//! - [`Database`]: file location and per-worker connection setup
//! - Stores: thin wrappers over a borrowed `Connection` (or `Transaction`,
//!   which derefs to one), one per table group. They never open
//!   transactions themselves; the caller decides the boundary.

pub mod associations;
pub mod collections;
pub mod database;
pub mod directory;
pub mod resources;
pub mod schema;

pub use associations::AssociationStore;
pub use collections::CollectionStore;
pub use database::{begin_read, begin_write, Database};
pub use directory::{TagDirectory, User, UserDirectory};
pub use resources::ResourceStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
