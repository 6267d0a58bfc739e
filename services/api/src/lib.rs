//! LivePersona API Library Crate
//!
//! The small web backend browser clients call before joining a room: it
//! returns the LiveKit server URL and a freshly minted access token. The
//! `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
