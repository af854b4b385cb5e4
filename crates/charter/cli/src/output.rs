//! Output formatting.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Print `value` as JSON or YAML. Returns false for `Text`, leaving
    /// the caller to render it.
    pub fn print_structured<T: Serialize>(self, value: &T) -> anyhow::Result<bool> {
        match self {
            Self::Text => Ok(false),
            Self::Json => {
                println!("{}", serde_json::to_string_pretty(value)?);
                Ok(true)
            }
            Self::Yaml => {
                print!("{}", serde_yaml::to_string(value)?);
                Ok(true)
            }
        }
    }
}
