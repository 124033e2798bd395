use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

pub struct ServiceConfig {
    /// Address the HTTP surface listens on
    pub bind_addr: String,
    pub report: ReportSettings,
}

/// Tunables for report generation, read from the TOML file named by
/// `REPORT_CONFIG`. Missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub default_interval_secs: u32,
    pub hexbin_ladder_hours: Vec<i64>,
    pub hexbin_ceiling: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            default_interval_secs: 10,
            hexbin_ladder_hours: vec![1, 4, 8, 24, 48, 96, 168, 336, 730],
            hexbin_ceiling: 42,
        }
    }
}

impl ReportSettings {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid report settings")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Can't read report settings at {}", path.display()))?;
        Self::from_toml(&content)
    }
}

impl ServiceConfig {
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub fn load(manifest_dir: &Path) -> Result<Self> {
        #[cfg(debug_assertions)]
        {
            let env_file = manifest_dir.join(".env");
            if env_file.exists() {
                dotenvy::from_path(&env_file).context("Can't read .env file")?;
            }
        }

        let report = match env::var("REPORT_CONFIG") {
            Ok(path) => ReportSettings::from_file(Path::new(&path))?,
            Err(_) => ReportSettings::default(),
        };

        Ok(Self {
            bind_addr: env::var("REPORT_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned()),
            report,
        })
    }
}

/// Load service config using the calling crate's manifest directory.
#[macro_export]
macro_rules! load_service_config {
    () => {
        $crate::config::ServiceConfig::load(std::path::Path::new(env!("CARGO_MANIFEST_DIR")))
    };
}
