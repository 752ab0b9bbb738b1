//! Runtime configuration: TOML file + env overrides.

pub mod digest;

pub use digest::{DigestConfig, DisplayMode, RssSection};
