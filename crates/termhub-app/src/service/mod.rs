//! Embedded WebSocket bridge: JSON request/response plus push frames
//! mirroring the host's event bus.

pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::run_service;
