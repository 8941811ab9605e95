//! config command - Create or display the configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use uuid::Uuid;

use crate::core::config::{Config, ServiceConfig};

/// Write a starter configuration.
///
/// The target is `path`, else the global `--config`, else
/// `~/.metatx/config.toml`.
pub fn init(
    config_flag: Option<&Path>,
    path: Option<&Path>,
    node_id: Option<&str>,
    force: bool,
) -> Result<()> {
    let target: PathBuf = match path.or(config_flag) {
        Some(p) => p.to_path_buf(),
        None => Config::default_config_path()?,
    };

    let node_id = match node_id {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };

    let config = ServiceConfig::starter(&node_id);
    Config::write(&target, &config, force)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!("Wrote {} (node {})", target.display(), node_id);
    Ok(())
}

/// Print the effective configuration as TOML.
pub fn show(config_flag: Option<&Path>) -> Result<()> {
    let loaded = Config::load(config_flag).context("Failed to load configuration")?;
    for warning in &loaded.warnings {
        eprintln!("warning: {} ({})", warning.message, warning.path.display());
    }

    print!("{}", render(&loaded.config)?);
    Ok(())
}

fn render(config: &Config) -> Result<String> {
    let header = match config.loaded_from() {
        Some(path) => format!("# loaded from {}\n", path.display()),
        None => "# no config file found; built-in defaults\n".to_string(),
    };
    let body = toml::to_string_pretty(&config.service).context("Failed to render config")?;
    Ok(format!("{}{}", header, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SearchPaths;
    use tempfile::TempDir;

    #[test]
    fn init_then_render() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        init(None, Some(&path), Some("mrc-7"), false).unwrap();

        let loaded = Config::load_from(&SearchPaths {
            explicit: Some(path.clone()),
            ..Default::default()
        })
        .unwrap();
        let text = render(&loaded.config).unwrap();
        assert!(text.starts_with("# loaded from"));
        assert!(text.contains("mrc-7"));
        assert!(text.contains("default"));
    }

    #[test]
    fn init_refuses_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert!(init(Some(&path), None, Some("mrc-7"), false).is_err());
        init(Some(&path), None, Some("mrc-7"), true).unwrap();
    }

    #[test]
    fn defaults_are_labelled() {
        let text = render(&Config::default()).unwrap();
        assert!(text.starts_with("# no config file found"));
    }
}
