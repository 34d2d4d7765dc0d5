//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;
use tracing::debug;

use rcpt_core::models::config::RcptConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "ocr.timeout_ms")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
        .join("config.json")
}

/// Load the explicit config file, else the default one if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RcptConfig> {
    if let Some(path) = config_path {
        return Ok(RcptConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Using config file {}", path.display());
        Ok(RcptConfig::from_file(&path)?)
    } else {
        Ok(RcptConfig::default())
    }
}

fn read_or_default(path: &Path) -> anyhow::Result<RcptConfig> {
    if path.exists() {
        Ok(RcptConfig::from_file(path)?)
    } else {
        Ok(RcptConfig::default())
    }
}

fn write_config(config: &RcptConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;
    Ok(())
}

/// Walk a dotted key such as `ocr.timeout_ms` through the JSON form of the config.
fn lookup<'a>(json: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    key.split('.').try_fold(json, |node, part| {
        node.get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    })
}

/// Replace the value behind an existing dotted key. Unknown keys are refused.
fn assign(json: &mut Value, key: &str, value: Value) -> anyhow::Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((field, parents)) = parts.split_last() else {
        anyhow::bail!("Empty configuration key");
    };

    let mut node = json;
    for part in parents {
        node = node
            .get_mut(*part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    }

    match node.get_mut(*field) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => anyhow::bail!("Configuration key not found: {}", key),
    }
}

/// Command-line values: JSON when they parse, bare strings otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!("{} {} does not exist yet; defaults:", style("ℹ").blue(), path.display());
    }
    println!("{}", serde_json::to_string_pretty(&read_or_default(path)?)?);
    Ok(())
}

fn init_config(args: InitArgs, path: PathBuf) -> anyhow::Result<()> {
    let target = args.output.unwrap_or(path);

    if target.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (pass --force to replace it)",
            target.display()
        );
    }

    write_config(&RcptConfig::default(), &target)?;
    println!("{} Wrote default config to {}", style("✓").green(), target.display());

    Ok(())
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(read_or_default(path)?)?;
    println!("{}", serde_json::to_string_pretty(lookup(&json, key)?)?);
    Ok(())
}

fn set_config(path: &Path, key: &str, raw: &str) -> anyhow::Result<()> {
    let value = parse_value(raw);

    let mut json = serde_json::to_value(read_or_default(path)?)?;
    assign(&mut json, key, value.clone())?;

    let config: RcptConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
    config.validate()?;
    write_config(&config, path)?;

    println!("{} {} = {}", style("✓").green(), key, value);

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    let status = if path.exists() {
        style("exists").green()
    } else {
        style("missing, create it with `rcpt config init`").yellow()
    };
    println!("{} ({})", path.display(), status);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_replaces_nested_value() {
        let mut config = serde_json::to_value(RcptConfig::default()).unwrap();
        assign(&mut config, "ocr.timeout_ms", parse_value("5000")).unwrap();
        assert_eq!(lookup(&config, "ocr.timeout_ms").unwrap(), &json!(5000));

        let config: RcptConfig = serde_json::from_value(config).unwrap();
        assert_eq!(config.ocr.timeout_ms, Some(5000));
    }

    #[test]
    fn test_assign_refuses_unknown_keys() {
        let mut config = serde_json::to_value(RcptConfig::default()).unwrap();
        assert!(assign(&mut config, "ocr.speed", json!(1)).is_err());
        assert!(assign(&mut config, "nope.timeout_ms", json!(1)).is_err());
        assert!(lookup(&config, "storage.missing").is_err());
    }

    #[test]
    fn test_bare_words_are_strings() {
        assert_eq!(parse_value("det.onnx"), json!("det.onnx"));
        assert_eq!(parse_value("true"), json!(true));
    }
}
