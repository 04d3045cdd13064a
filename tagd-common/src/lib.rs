//! # TAG Diary Common Library
//!
//! Shared code for the TAG Diary server and its maintenance tooling:
//! - Configuration loading and root folder resolution
//! - Database initialization, migrations and row models
//! - Password hashing and session tokens
//! - Timestamp utilities

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
