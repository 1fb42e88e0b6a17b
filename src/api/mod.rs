//! Public entry points for schemaql
//!
//! [`Connection`] runs SQL text against one database; [`EngineConfig`]
//! holds its settings.

mod config;
mod connection;

pub use config::*;
pub use connection::*;
