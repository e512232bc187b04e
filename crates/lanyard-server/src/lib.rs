//! # lanyard-server
//!
//! HTTP control surface and background pipeline host for lanyard.
//!
//! This library provides the API handlers, shared state and worker loops;
//! the binary in `main.rs` wires them together.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
pub mod workers;
