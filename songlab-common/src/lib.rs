//! # SongLab Common Library
//!
//! Shared code for the SongLab services including:
//! - Event types (SongLabEvent enum) and the broadcast EventBus
//! - Configuration loading and root folder resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
