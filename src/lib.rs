//! Live collaborative editing of report sections.
//!
//! Clients connect one websocket per report section. Edits are relayed to
//! everyone else in the same section, section state is persisted through a
//! [`db::ReportRepository`], and user activity is buffered and written to the
//! report's log in batches.

pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;

#[cfg(test)]
mod test_support;

pub use state::AppState;
