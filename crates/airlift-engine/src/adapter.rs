//! Connector subprocess adapter.
//!
//! Launches a source connector as a child process, hands it its inputs as
//! JSON files in a private temp directory, and exposes its stdout as a
//! stream of parsed protocol messages. stderr is drained on a background
//! thread into a bounded diagnostics ring so the last lines a connector
//! wrote before dying can be attached to the failure.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use airlift_types::catalog::{Catalog, ConfiguredCatalog};
use airlift_types::connector::ConnectorDescriptor;
use airlift_types::protocol::{
    parse_line, ConnectionStatus, ParsedLine, ProtocolMessage, TraceKind,
};
use anyhow::Context;
use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::redact::SecretRedactor;

/// Most recent connector log and stderr lines retained for error reports.
const DIAGNOSTIC_CAPACITY: usize = 50;

/// Connector operations, passed as the first positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Spec,
    Check,
    Discover,
    Read,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Check => "check",
            Self::Discover => "discover",
            Self::Read => "read",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Launches one connector binary and runs its protocol operations.
pub struct ConnectorAdapter {
    descriptor: ConnectorDescriptor,
    config: Value,
    /// Operator-facing config file, named in config errors.
    config_path: PathBuf,
    redactor: SecretRedactor,
}

impl ConnectorAdapter {
    pub fn new(descriptor: ConnectorDescriptor, config: Value, config_path: PathBuf) -> Self {
        Self {
            descriptor,
            config,
            config_path,
            redactor: SecretRedactor::empty(),
        }
    }

    pub fn connector_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn redactor(&self) -> &SecretRedactor {
        &self.redactor
    }

    /// Fetches the connector spec and builds the secret redactor from it.
    /// A connector without a working `spec` operation degrades to no
    /// redaction rather than failing the run.
    pub fn enable_redaction(&mut self) {
        match self.spec() {
            Ok(spec) => self.redactor = SecretRedactor::from_spec(&spec, &self.config),
            Err(err) => {
                warn!(
                    connector = %self.descriptor.name,
                    error = %err,
                    "spec operation failed, connector logs will not be redacted"
                );
            }
        }
    }

    /// Runs the `spec` operation. No config file is passed.
    pub fn spec(&self) -> Result<Value, PipelineError> {
        match self.single_message(Operation::Spec, false)? {
            ProtocolMessage::Spec(spec) => Ok(spec),
            other => Err(unexpected(Operation::Spec, &other)),
        }
    }

    /// Runs the `check` operation against the configured source.
    pub fn check(&self) -> Result<ConnectionStatus, PipelineError> {
        match self.single_message(Operation::Check, true)? {
            ProtocolMessage::ConnectionStatus(status) => Ok(status),
            other => Err(unexpected(Operation::Check, &other)),
        }
    }

    /// Runs the `discover` operation and returns the stream catalog.
    pub fn discover(&self) -> Result<Catalog, PipelineError> {
        match self.single_message(Operation::Discover, true)? {
            ProtocolMessage::Catalog(catalog) => Ok(catalog),
            other => Err(unexpected(Operation::Discover, &other)),
        }
    }

    /// Starts the `read` operation and returns the live message stream.
    /// `state` is the last persisted checkpoint, if any.
    pub fn read(
        &self,
        catalog: &ConfiguredCatalog,
        state: Option<&Value>,
    ) -> Result<MessageStream, PipelineError> {
        let handoff = Handoff::prepare(
            Some(&self.config),
            Some(catalog),
            state,
        )?;
        self.spawn(Operation::Read, handoff)
    }

    /// Runs a single-shot operation, which must emit exactly one non-log
    /// protocol message before exiting cleanly.
    fn single_message(
        &self,
        operation: Operation,
        with_config: bool,
    ) -> Result<ProtocolMessage, PipelineError> {
        let config = with_config.then_some(&self.config);
        let handoff = Handoff::prepare(config, None, None)?;
        let stream = self.spawn(operation, handoff)?;

        let mut result = None;
        for message in stream {
            match message? {
                ProtocolMessage::Log(log) => {
                    debug!(connector = %self.descriptor.name, %operation,
                        level = %log.level, "{}", self.redactor.redact(&log.message));
                }
                message if result.is_some() => {
                    return Err(PipelineError::ProtocolViolation(format!(
                        "{operation} emitted more than one message, second was {}",
                        message.message_type()
                    )));
                }
                message => result = Some(message),
            }
        }
        result.ok_or_else(|| {
            PipelineError::ProtocolViolation(format!("{operation} emitted no message"))
        })
    }

    fn spawn(&self, operation: Operation, handoff: Handoff) -> Result<MessageStream, PipelineError> {
        let (program, leading_args) = self
            .descriptor
            .entrypoint
            .split_first()
            .ok_or_else(|| PipelineError::ConfigError {
                message: format!("connector {} has an empty command", self.descriptor.name),
                config_path: self.config_path.clone(),
            })?;

        let mut command = Command::new(program);
        command
            .args(leading_args)
            .arg(operation.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        handoff.add_args(&mut command);

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning connector `{program}` for {operation}"))?;

        let stdout = child
            .stdout
            .take()
            .context("connector stdout pipe missing")?;
        let stderr = child
            .stderr
            .take()
            .context("connector stderr pipe missing")?;

        let diagnostics = Arc::new(Mutex::new(VecDeque::new()));
        let drain = {
            let diagnostics = Arc::clone(&diagnostics);
            let connector = self.descriptor.name.clone();
            let redactor = self.redactor.clone();
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    let line = redactor.redact(&line);
                    debug!(connector = %connector, "stderr: {line}");
                    push_diagnostic(&diagnostics, line);
                }
            })
        };

        Ok(MessageStream {
            child,
            lines: BufReader::new(stdout).lines(),
            diagnostics,
            stderr_drain: Some(drain),
            redactor: self.redactor.clone(),
            config_path: self.config_path.clone(),
            connector: self.descriptor.name.clone(),
            operation,
            done: false,
            _handoff: handoff,
        })
    }
}

fn unexpected(operation: Operation, message: &ProtocolMessage) -> PipelineError {
    PipelineError::ProtocolViolation(format!(
        "{operation} emitted a {} message instead of its result",
        message.message_type()
    ))
}

fn push_diagnostic(diagnostics: &Mutex<VecDeque<String>>, line: String) {
    if let Ok(mut buf) = diagnostics.lock() {
        if buf.len() == DIAGNOSTIC_CAPACITY {
            buf.pop_front();
        }
        buf.push_back(line);
    }
}

/// Temp directory holding the JSON files handed to the connector.
struct Handoff {
    /// Owns the temp dir for as long as the child may read from it.
    _dir: TempDir,
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    state: Option<PathBuf>,
}

impl Handoff {
    fn prepare(
        config: Option<&Value>,
        catalog: Option<&ConfiguredCatalog>,
        state: Option<&Value>,
    ) -> Result<Self, PipelineError> {
        let dir = TempDir::new().context("creating connector handoff dir")?;
        let config = config
            .map(|v| write_json(dir.path(), "config.json", v))
            .transpose()?;
        let catalog = catalog
            .map(|c| {
                let value = serde_json::to_value(c).context("serializing configured catalog")?;
                write_json(dir.path(), "catalog.json", &value)
            })
            .transpose()?;
        let state = state
            .map(|v| write_json(dir.path(), "state.json", v))
            .transpose()?;
        Ok(Self {
            _dir: dir,
            config,
            catalog,
            state,
        })
    }

    fn add_args(&self, command: &mut Command) {
        if let Some(path) = &self.config {
            command.arg("--config").arg(path);
        }
        if let Some(path) = &self.catalog {
            command.arg("--catalog").arg(path);
        }
        if let Some(path) = &self.state {
            command.arg("--state").arg(path);
        }
    }
}

fn write_json(dir: &Path, name: &str, value: &Value) -> Result<PathBuf, PipelineError> {
    let path = dir.join(name);
    let body = serde_json::to_vec(value).context("serializing connector input")?;
    std::fs::write(&path, body).with_context(|| format!("writing {name}"))?;
    Ok(path)
}

/// Live protocol message stream from a running connector.
///
/// Yields parsed messages until the connector exits. A clean exit ends the
/// iterator; a non-zero exit, or a TRACE message, ends it with an error
/// carrying the captured diagnostics. Dropping the stream early kills the
/// child.
pub struct MessageStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    diagnostics: Arc<Mutex<VecDeque<String>>>,
    stderr_drain: Option<JoinHandle<()>>,
    redactor: SecretRedactor,
    config_path: PathBuf,
    connector: String,
    operation: Operation,
    done: bool,
    _handoff: Handoff,
}

impl MessageStream {
    /// Diagnostic lines captured so far, oldest first.
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics
            .lock()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn fail(&mut self, err: PipelineError) -> Option<Result<ProtocolMessage, PipelineError>> {
        self.done = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.join_drain();
        Some(Err(err))
    }

    /// Connector closed stdout; reap it and check the exit status.
    fn finish(&mut self) -> Option<Result<ProtocolMessage, PipelineError>> {
        self.done = true;
        let status = match self.child.wait() {
            Ok(status) => status,
            Err(err) => {
                return Some(Err(PipelineError::Infrastructure(
                    anyhow::Error::new(err).context("waiting for connector exit"),
                )))
            }
        };
        self.join_drain();
        if status.success() {
            None
        } else {
            Some(Err(PipelineError::ConnectorFailure {
                message: format!(
                    "connector {} exited with {status} during {}",
                    self.connector, self.operation
                ),
                diagnostics: self.diagnostics(),
            }))
        }
    }

    fn join_drain(&mut self) {
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

impl Iterator for MessageStream {
    type Item = Result<ProtocolMessage, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                None => return self.finish(),
                Some(Err(err)) => {
                    return self.fail(PipelineError::Infrastructure(
                        anyhow::Error::new(err).context("reading connector stdout"),
                    ))
                }
                Some(Ok(line)) => line,
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(ParsedLine::Incidental(text)) => {
                    let text = self.redactor.redact(&text);
                    debug!(connector = %self.connector, "stray output: {text}");
                    push_diagnostic(&self.diagnostics, text);
                }
                Ok(ParsedLine::Message(ProtocolMessage::Trace(trace))) => {
                    let message = self.redactor.redact(&trace.message);
                    let err = match trace.kind {
                        TraceKind::ConfigError => PipelineError::ConfigError {
                            message,
                            config_path: self.config_path.clone(),
                        },
                        TraceKind::SystemError | TraceKind::TransientError => {
                            PipelineError::ConnectorFailure {
                                message,
                                diagnostics: self.diagnostics(),
                            }
                        }
                    };
                    return self.fail(err);
                }
                Ok(ParsedLine::Message(mut message)) => {
                    if let ProtocolMessage::Log(log) = &mut message {
                        log.message = self.redactor.redact(&log.message);
                        push_diagnostic(
                            &self.diagnostics,
                            format!("[{}] {}", log.level, log.message),
                        );
                    }
                    return Some(Ok(message));
                }
                Err(err) => return self.fail(err.into()),
            }
        }
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        self.join_drain();
    }
}
