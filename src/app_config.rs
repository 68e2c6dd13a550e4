use crate::bindings::BindingsConfig;
use crate::demo::DemoConfig;
use crate::error::Result;
use std::path::Path;

/// Unified configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub bindings: BindingsConfig,
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Load configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(Self {
            bindings: BindingsConfig::from_toml(s)?,
            demo: DemoConfig::from_toml(s)?,
        })
    }

    /// Load configuration from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Validate all sub-configurations.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.bindings.validate()?;
        self.demo.validate()?;
        Ok(())
    }
}
