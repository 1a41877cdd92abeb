// Library root: domain model, rule engines, and the SQLite document store
// for the fantasy soccer data layer.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod lifecycle;
pub mod model;
pub mod scoring;
pub mod squad;
pub mod types;
pub mod validation;

pub use error::{BusinessRuleError, Error, Result};
pub use types::{DbId, Price, Timestamp};
