//! Video Inbox
//!
//! A long-running LAN listener that accepts video uploads from a mobile
//! client and persists them to a configurable directory. The shell binary
//! in `main.rs` is a headless consumer; a graphical shell would use the
//! same pieces.
//!
//! # Modules
//!
//! - `config`: durable JSON key-value settings (save directory, port, auto-start)
//! - `events`: channel-delivered upload notifications for the shell
//! - `service`: the upload service lifecycle (start/stop, port probe, state)
//! - `routes`: the HTTP surface (`/ping`, `/status`, `/upload`)

pub mod config;
pub mod error;
pub mod events;
pub mod routes;
pub mod service;
pub mod state;
