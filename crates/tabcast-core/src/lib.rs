//! Tabcast core — shared identifiers, relay configuration, error taxonomy.

pub mod config;
pub mod error;
pub mod ids;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use ids::{StreamToken, TabId};
