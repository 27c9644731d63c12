//! Configuration loading
//!
//! [`load`] resolves a [`newsline_domain::Config`] from the environment, a
//! probed JSON/TOML file, or the built-in defaults.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
