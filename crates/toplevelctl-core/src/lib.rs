//! Core state and protocol logic for toplevelctl.
//!
//! This crate provides:
//! - `WindowStore`, the id-keyed collection of tracked toplevels
//! - `Reconciler`, the pending/current double buffer applied on `done`
//! - The one-line control command grammar
//! - Snapshot rendering (text and JSON)
//! - Configuration and logging setup
//!
//! Nothing here talks to Wayland; the compositor handle type is a generic
//! parameter so the binary can plug in protocol objects and tests can use `()`.

pub mod callbacks;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod snapshot;
pub mod store;

pub use callbacks::{CallbackId, Callbacks};
pub use command::{Action, ParseError, Request};
pub use config::Config;
pub use error::{Error, Result};
pub use reconcile::{ChangeEvent, Reconciler};
pub use snapshot::Format;
pub use store::{Parent, Phase, WindowId, WindowRecord, WindowState, WindowStore};
