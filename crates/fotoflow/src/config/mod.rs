//! Engine configuration: a JSON file validated against an embedded schema,
//! then semantically checked.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::Config;
