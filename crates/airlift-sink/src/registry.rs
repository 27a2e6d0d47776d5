//! Sink registry and destination selector parsing.
//!
//! Destinations are addressed externally as `name(arg1, arg2, ...)`. The
//! selector string is parsed once at the boundary into a [`SinkSelector`]
//! and resolved through an explicit name-to-constructor map, so adding a
//! sink means registering a constructor, not extending a parser.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::console::ConsoleSink;
use crate::error::{self, SinkError};
use crate::file::AppendFileSink;
use crate::sink::Sink;
use crate::warehouse::SqliteWarehouseSink;

const DEFAULT_TABLE_TEMPLATE: &str = "airlift_{stream}";

/// A parsed `name(arg, ...)` destination selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSelector {
    pub name: String,
    pub args: Vec<String>,
}

impl SinkSelector {
    /// Parse a selector string. A bare `name` is equivalent to `name()`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Selector`] for malformed input.
    pub fn parse(input: &str) -> error::Result<Self> {
        let input = input.trim();
        let (name, args) = match input.split_once('(') {
            None => (input, Vec::new()),
            Some((name, rest)) => {
                let Some(inner) = rest.strip_suffix(')') else {
                    return Err(SinkError::Selector(format!(
                        "`{input}` is missing a closing parenthesis"
                    )));
                };
                let args = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect();
                (name.trim(), args)
            }
        };
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(SinkError::Selector(format!(
                "`{input}` does not name a sink (expected `name(arg, ...)`)"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            args,
        })
    }
}

/// Context handed to sink constructors.
pub struct SinkContext<'a> {
    /// Streams configured for the run, in catalog order.
    pub stream_names: &'a [String],
    /// Opaque destination configuration from the run config.
    pub destination_config: &'a Value,
}

/// Builds a sink from selector arguments and run context.
pub type SinkConstructor =
    Box<dyn Fn(&[String], &SinkContext<'_>) -> error::Result<Box<dyn Sink>>>;

/// Explicit map from sink name to constructor.
pub struct SinkRegistry {
    entries: BTreeMap<String, SinkConstructor>,
}

impl SinkRegistry {
    /// Registry with the three reference sinks: `console()`,
    /// `file(FOLDER)`, `warehouse(DB_PATH[, TABLE_TEMPLATE])`.
    pub fn builtin() -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
        };
        registry.register("console", Box::new(build_console));
        registry.register("file", Box::new(build_file));
        registry.register("warehouse", Box::new(build_warehouse));
        registry
    }

    /// Register (or replace) a constructor under `name`.
    pub fn register(&mut self, name: &str, constructor: SinkConstructor) {
        self.entries.insert(name.to_string(), constructor);
    }

    /// Registered sink names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Parse `selector` and construct the sink it names.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Selector`] / [`SinkError::UnknownSink`] /
    /// [`SinkError::Arguments`] for addressing problems, or the
    /// constructor's own error.
    pub fn create(&self, selector: &str, ctx: &SinkContext<'_>) -> error::Result<Box<dyn Sink>> {
        let selector = SinkSelector::parse(selector)?;
        let constructor = self
            .entries
            .get(&selector.name)
            .ok_or_else(|| SinkError::UnknownSink(selector.name.clone()))?;
        constructor(&selector.args, ctx)
    }
}

fn build_console(args: &[String], _ctx: &SinkContext<'_>) -> error::Result<Box<dyn Sink>> {
    if !args.is_empty() {
        return Err(SinkError::Arguments {
            name: "console".into(),
            message: "takes no arguments".into(),
        });
    }
    Ok(Box::new(ConsoleSink))
}

fn build_file(args: &[String], ctx: &SinkContext<'_>) -> error::Result<Box<dyn Sink>> {
    let [folder] = args else {
        return Err(SinkError::Arguments {
            name: "file".into(),
            message: "expected exactly one argument: file(FOLDER)".into(),
        });
    };
    Ok(Box::new(AppendFileSink::open(
        Path::new(folder),
        ctx.stream_names,
    )?))
}

fn build_warehouse(args: &[String], _ctx: &SinkContext<'_>) -> error::Result<Box<dyn Sink>> {
    let (db_path, template) = match args {
        [db_path] => (db_path, DEFAULT_TABLE_TEMPLATE),
        [db_path, template] => (db_path, template.as_str()),
        _ => {
            return Err(SinkError::Arguments {
                name: "warehouse".into(),
                message: "expected warehouse(DB_PATH) or warehouse(DB_PATH, TABLE_TEMPLATE)"
                    .into(),
            })
        }
    };
    Ok(Box::new(SqliteWarehouseSink::open(
        Path::new(db_path),
        template,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(streams: &'a [String], config: &'a Value) -> SinkContext<'a> {
        SinkContext {
            stream_names: streams,
            destination_config: config,
        }
    }

    #[test]
    fn parses_selector_with_args() {
        let sel = SinkSelector::parse("warehouse(./wh.sqlite, raw_{stream})").unwrap();
        assert_eq!(sel.name, "warehouse");
        assert_eq!(sel.args, vec!["./wh.sqlite", "raw_{stream}"]);
    }

    #[test]
    fn parses_bare_name_and_empty_parens() {
        assert_eq!(SinkSelector::parse("console").unwrap().args.len(), 0);
        assert_eq!(SinkSelector::parse("console()").unwrap().args.len(), 0);
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(matches!(
            SinkSelector::parse("file(./out").unwrap_err(),
            SinkError::Selector(_)
        ));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(SinkSelector::parse("").is_err());
        assert!(SinkSelector::parse("File(./out)").is_err());
    }

    #[test]
    fn builtin_creates_console() {
        let config = json!({});
        let streams: Vec<String> = vec![];
        let registry = SinkRegistry::builtin();
        assert!(registry.create("console()", &ctx(&streams, &config)).is_ok());
    }

    #[test]
    fn builtin_creates_file_sink_in_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = json!({});
        let streams = vec!["users".to_string()];
        let registry = SinkRegistry::builtin();
        let selector = format!("file({})", dir.path().display());
        registry.create(&selector, &ctx(&streams, &config)).unwrap();
        assert!(dir.path().join("users.jsonl").exists());
    }

    #[test]
    fn unknown_sink_is_reported() {
        let config = json!({});
        let streams: Vec<String> = vec![];
        let registry = SinkRegistry::builtin();
        let err = registry
            .create("bigquery(ds)", &ctx(&streams, &config))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, SinkError::UnknownSink(name) if name == "bigquery"));
    }

    #[test]
    fn console_rejects_arguments() {
        let config = json!({});
        let streams: Vec<String> = vec![];
        let registry = SinkRegistry::builtin();
        let err = registry
            .create("console(loud)", &ctx(&streams, &config))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, SinkError::Arguments { .. }));
    }

    #[test]
    fn custom_sinks_can_be_registered() {
        let mut registry = SinkRegistry::builtin();
        registry.register("null", Box::new(|_, _| Ok(Box::new(ConsoleSink))));
        assert!(registry.names().contains(&"null"));
    }
}
