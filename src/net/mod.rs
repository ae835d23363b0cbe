//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind)
//!     → Hand off to HTTP layer (axum)
//!     → connection.rs (in-flight request tracking for the drain phase)
//! ```

pub mod connection;
pub mod listener;
