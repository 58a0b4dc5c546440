//! User configuration (`config.toml`).
//!
//! ```toml
//! [format]
//! precision = 6
//! angle_mode = "radians"
//! float_style = { fixed = 2 }
//! prefer_fraction = false
//!
//! [aggregate]
//! hline = 1
//! ```

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tallyline_core::NumericFormatContext;

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    format: Option<NumericFormatContext>,
    aggregate: Option<AggregateSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AggregateSection {
    hline: Option<usize>,
}

/// Defaults applied before command-line flags.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Settings {
    pub format: NumericFormatContext,
    pub separator_depth: Option<usize>,
}

/// Load settings from `config_file`, else from the user config dir.
/// Problems are returned as warnings and never stop the run.
pub fn load_settings(config_file: Option<&Path>) -> (Settings, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let Some(path) = config_file.map(Path::to_path_buf).or_else(user_config_path) else {
        return (Settings::default(), warnings);
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Settings::default(), warnings);
    }

    let file = match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_FILE_BYTES => {
            warnings.push(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            ));
            None
        }
        Ok(_) => match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ConfigFile>(&content) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                    None
                }
            },
            Err(err) => {
                warnings.push(format!("Failed to read {}: {}", path.display(), err));
                None
            }
        },
        Err(err) => {
            warnings.push(format!(
                "Failed to read metadata for {}: {}",
                path.display(),
                err
            ));
            None
        }
    };

    let file = file.unwrap_or_default();
    let settings = Settings {
        format: file.format.unwrap_or_default(),
        separator_depth: file.aggregate.and_then(|a| a.hline),
    };
    (settings, warnings)
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "tallyline")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}
