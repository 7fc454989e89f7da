//! Command handlers

pub mod collection;
pub mod config;
pub mod resource;
pub mod tag;
pub mod user;
