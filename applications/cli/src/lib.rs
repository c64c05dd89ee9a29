/// Smart Bridge command-line front end
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod render;

pub use config::CliConfig;
pub use device::VirtualDevice;
pub use error::{CliError, Result};
