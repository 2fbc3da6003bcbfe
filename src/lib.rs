pub mod blocking;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod db;
