//! Show services behind the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `engine` owns all live state on a single task and drives the other
//! modules. Everything else is plain data plus logic, with no channels of its
//! own except `timer`, which feeds back into the engine.

pub mod broadcast;
pub mod engine;
pub mod presentation;
pub mod score;
pub mod session;
pub mod timer;
