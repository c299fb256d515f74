pub mod catalog;
pub mod commands;
pub mod plan;
pub mod serve;
pub mod status;

pub use commands::{Cli, Commands};

use std::path::Path;

use crate::config::{self, ApexConfig};
use crate::errors::ApexError;

/// Load the config file when one is given, defaults otherwise.
pub(crate) async fn load_config(path: Option<&str>) -> Result<ApexConfig, ApexError> {
    match path {
        Some(p) => config::parse_config(Path::new(p)).await,
        None => config::parse_config_str(""),
    }
}
