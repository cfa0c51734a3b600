//! Config command implementation.

use anyhow::{Context, Result};
use cpugate::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Serializes `config` in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(content)
}

/// Generates configuration files
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("cpugate.yaml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# cpugate Configuration
# ======================
#
# Target Selection
# ----------------
# pid: null                    # Target process id (exclusive with exe)
# exe: null                    # Target executable name or absolute path
# include_children: false      # Also match descendants of the target
# max_ancestry_depth: 64       # Parent links followed when matching descendants
#
# Control Loop
# ------------
# interval_ms: 100             # Tick length in milliseconds
# battery: ignored             # ignored | charging | full
#
# Platform Sources
# ----------------
# proc_root: /proc                                       # Linux proc filesystem
# battery_status_path: /sys/class/power_supply/BAT0/status  # Linux battery status
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_commented_yaml_still_parses() {
        let yaml = add_config_comments(render_config(&Config::default(), ConfigFormat::Yaml).unwrap());
        let parsed = cpugate::config::parse_config(Path::new("x.yaml"), &yaml).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_command_config_writes_file() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("cpugate.toml");
        command_config(Some(out.clone()), ConfigFormat::Toml, false).unwrap();

        let content = fs::read_to_string(&out).unwrap();
        let parsed = cpugate::config::parse_config(&out, &content).unwrap();
        assert_eq!(parsed.interval_ms, Some(100));
    }
}
