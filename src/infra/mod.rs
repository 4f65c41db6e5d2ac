//! Infrastructure layer (adapters/implementations).
//!
//! This module contains the diff engine, the event-stream client, the host
//! capabilities they are driven by, and the config file.

pub mod app_config;
pub mod diff;
pub mod hash;
pub mod host;
pub mod stream;
