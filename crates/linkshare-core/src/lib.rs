//! Linkshare Core Library
//!
//! This crate provides the core functionality for linkshare, a service where
//! users share links ("resources"), tag them, control who can see them, and
//! recommend each other's resources.
//!
//! # Architecture
//!
//! - **SQLite**: the only shared state. Every worker opens its own
//!   connection and coordinates with others through transactions.
//! - **Explicit callers**: every operation takes the authenticated user id
//!   as an argument; nothing reads ambient request state.
//!
//! # Quick Start
//!
//! ```text
//! let db = Database::open(&Config::load()?)?;
//! let service = ResourceService::open(&db)?;
//!
//! // Share a link
//! let resource = service.create_resource(owner_id, &NewResource::new(
//!     "Rust", "https://rust-lang.org", "site",
//! ), &[])?;
//!
//! // Recommend it
//! let count = service.recommend_resource(resource.id, other_user_id)?;
//! ```
//!
//! # Modules
//!
//! - `service`: operations exposed to callers (main entry point)
//! - `ledger`: recommendation counter and ledger rows
//! - `storage`: SQLite schema, connections and stores
//! - `visibility`: who may read which resource
//! - `tags`: turning a tag diff into association changes
//! - `payload`: request validation and field-diff decoding
//! - `models`: data structures for resources, tags and collections
//! - `config`: application configuration

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod payload;
pub mod service;
pub mod storage;
pub mod tags;
pub mod visibility;

pub use config::Config;
pub use error::{ConflictKind, CoreError, CoreResult, ErrorKind};
pub use ledger::RecommendationLedger;
pub use models::{
    Collection, NewCollection, NewResource, Privacy, Resource, ResourceDetails, ResourceFieldDiff,
    Tag,
};
pub use service::{ResourceService, UpdateOutcome};
pub use storage::{Database, TagDirectory, User, UserDirectory};
pub use tags::{TagDiff, TagPlan};
