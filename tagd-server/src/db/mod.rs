//! Database operations for tagd-server
//!
//! One module per table group; every function takes the pool (or a
//! connection, when it must join a caller's transaction).

pub mod albums;
pub mod audio;
pub mod backgrounds;
pub mod files;
pub mod invites;
pub mod people;
pub mod photos;
pub mod users;
pub mod vignettes;
