//! LivePersona Agent
//!
//! The worker process: accepts room jobs over HTTP (directly or through
//! LiveKit webhooks) and runs one avatar-fronted voice session per room.

pub mod config;
pub mod dispatch;
pub mod room;
pub mod router;
pub mod session;
pub mod state;
pub mod voice;
