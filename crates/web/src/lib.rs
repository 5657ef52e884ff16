//! Conveyor Plan Panel
//!
//! JSON service behind the plan panel: plan listing, clone and migrate
//! workflows, resource edits and topology data, backed by the Conveyor API.

pub mod error;
pub mod forms;
pub mod server;
pub mod views;

pub use error::{FormOutcome, PanelError};
pub use server::{PanelState, SharedState, WebServer};
