#![forbid(unsafe_code)]

//! Core state engine for a weightlifting session logger.
//!
//! This crate provides:
//! - Domain types and unit conversion
//! - The in-progress session model and drag reordering
//! - A per-user result cache and the rest timer
//! - The session controller tying them to a backend and a presenter

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod units;
pub mod session;
pub mod reorder;
pub mod cache;
pub mod timer;
pub mod confirm;
pub mod backend;
pub mod controller;

// Re-export commonly used types
pub use error::{Error, RemoteError, Result};
pub use types::*;
pub use config::Config;
pub use backend::{Backend, MemoryBackend};
pub use controller::{DisplaySnapshot, LookupTicket, Presenter, SaveOutcome, SessionController};
pub use session::{SessionModel, SetUpdate};
