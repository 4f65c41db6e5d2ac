//! Domain types for syncview.
//! Defines the resources, watch events and diff jobs shared by both subsystems.

pub mod application;
pub mod diff;
pub mod error;

pub use application::*;
pub use diff::*;
pub use error::*;
