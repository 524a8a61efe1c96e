//! View/state reconciliation for the BECI dashboard.
//!
//! Tracks the active theme, keeps layer and panel visibility consistent with
//! it, binds the shared time selector to the active time-aware layer, composes
//! filter predicates and persists all of it for the browsing session.

pub mod dashboard;
pub mod event;
pub mod persist;
pub mod reducer;
pub mod state;
pub mod surface;
pub mod temporal;

pub use dashboard::*;
pub use event::*;
pub use reducer::{Action, ControllerError};
pub use state::*;
pub use surface::*;
