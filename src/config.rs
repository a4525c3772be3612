use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub classify: Classify,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable string for deriving job ids.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub job_name: String,
    pub keep_intermediates: bool,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            job_name: "default".into(),
            keep_intermediates: false,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub path: String,
    pub timeout_seconds: u64,
    /// Fixed name the engine writes its valid rows to, beside the input.
    /// Two jobs sharing a directory will collide on it; the name is part of
    /// the engine's deployment contract, so it is configurable but not
    /// randomized.
    pub valid_output_filename: String,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            path: "./data_processor".into(),
            timeout_seconds: 120,
            valid_output_filename: "output.csv".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Directory for the staged intermediate csv. Empty means the system
    /// temp directory.
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            work_dir: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Classify {
    pub error_patterns: Vec<String>,
    pub correction_patterns: Vec<String>,
    pub warning_patterns: Vec<String>,
    pub success_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub prefix: String,
    /// Where to write the JSON run summary; empty disables the file (the
    /// summary still prints when `global.print_summary` is set).
    pub report_path: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            prefix: "processed_".into(),
            report_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub echo_engine_output: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            echo_engine_output: true,
        }
    }
}
