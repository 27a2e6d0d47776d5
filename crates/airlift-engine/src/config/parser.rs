//! YAML config parsing with environment variable substitution.
//!
//! `${VAR}` placeholders are substituted from the process environment
//! before the YAML is parsed, so credentials stay out of config files.
//! An unset variable is an error rather than an empty string.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

use super::types::RunConfig;
use super::validator;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap_or_else(|_| unreachable!())
});

/// Parses and validates a run config file.
pub fn parse_config(path: &Path) -> Result<RunConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    parse_config_str(&raw).with_context(|| format!("in config file {}", path.display()))
}

/// Parses and validates a run config from a YAML string.
pub fn parse_config_str(raw: &str) -> Result<RunConfig> {
    let substituted = substitute_env_vars(raw)?;
    let config: RunConfig =
        serde_yaml::from_str(&substituted).context("parsing run config YAML")?;
    validator::validate(&config)?;
    Ok(config)
}

fn substitute_env_vars(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for captures in ENV_VAR_RE.captures_iter(raw) {
        let whole = captures
            .get(0)
            .context("env var capture missing whole match")?;
        let name = &captures[1];
        let value = match std::env::var(name) {
            Ok(value) => value,
            Err(_) => bail!("environment variable `{name}` referenced in config is not set"),
        };
        out.push_str(&raw[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&raw[last..]);
    Ok(out)
}
