//! Line-delimited connector protocol messages and their parser.
//!
//! Connectors emit one JSON object per stdout line with a `type`
//! discriminator and exactly one matching payload key. Lines that are not
//! JSON objects, or that carry no recognized `type`, are classified as
//! incidental process output (stray prints) rather than errors; a line
//! that *is* a protocol message but has a missing, mismatched, or extra
//! payload key is rejected as a [`ProtocolError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::Catalog;

/// Connector log severity, serialized in the wire's upper-case form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted record for one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Stream the record belongs to.
    pub stream: String,
    /// Opaque record payload.
    pub data: Value,
    /// Source-side emission time, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitted_at: Option<i64>,
}

/// A resumable checkpoint emitted by the connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub data: Value,
}

/// A log line emitted by the connector through the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// Failure class carried by a TRACE message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// The persisted configuration needs fixing; user-actionable.
    ConfigError,
    /// Connector-internal failure.
    #[default]
    SystemError,
    /// Transient upstream failure. Still fatal for the current run.
    TransientError,
}

/// A fatal error signal from the connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    pub kind: TraceKind,
    pub message: String,
}

/// Result of the `check` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Succeeded,
    Failed,
}

/// Connection test outcome reported by the connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One parsed protocol message. Exactly one variant per wire line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    Record(RecordMessage),
    State(StateMessage),
    Log(LogMessage),
    Trace(TraceMessage),
    Spec(Value),
    Catalog(Catalog),
    ConnectionStatus(ConnectionStatus),
}

impl ProtocolMessage {
    /// Wire name of the message type, for diagnostics.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Record(_) => "RECORD",
            Self::State(_) => "STATE",
            Self::Log(_) => "LOG",
            Self::Trace(_) => "TRACE",
            Self::Spec(_) => "SPEC",
            Self::Catalog(_) => "CATALOG",
            Self::ConnectionStatus(_) => "CONNECTION_STATUS",
        }
    }
}

/// Classification of one raw stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A well-formed protocol message.
    Message(ProtocolMessage),
    /// Not a protocol message; forward to diagnostics, never fatal.
    Incidental(String),
}

/// Structural errors in a line that *is* a protocol message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{message_type} message carries no `{expected}` payload")]
    MissingPayload {
        message_type: String,
        expected: &'static str,
    },
    #[error("{message_type} message payload key `{found}` does not match expected `{expected}`")]
    PayloadMismatch {
        message_type: String,
        expected: &'static str,
        found: String,
    },
    #[error("{message_type} message carries multiple payload keys: {found}")]
    MultiplePayloads {
        message_type: String,
        found: String,
    },
    #[error("malformed {message_type} payload: {source}")]
    InvalidPayload {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Payload key each `type` discriminator must carry.
fn payload_key(message_type: &str) -> Option<&'static str> {
    match message_type {
        "RECORD" => Some("record"),
        "STATE" => Some("state"),
        "LOG" => Some("log"),
        "TRACE" => Some("trace"),
        "SPEC" => Some("spec"),
        "CATALOG" => Some("catalog"),
        "CONNECTION_STATUS" => Some("connectionStatus"),
        _ => None,
    }
}

/// Wire shape of a TRACE payload: `{"type":"ERROR","error":{...}}`.
#[derive(Deserialize)]
struct WireTrace {
    error: WireTraceError,
}

#[derive(Deserialize)]
struct WireTraceError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    failure_type: TraceKind,
}

/// Decode one raw stdout line.
///
/// # Errors
///
/// Returns [`ProtocolError`] when the line carries a recognized `type` but
/// its payload keys are missing, mismatched, duplicated, or structurally
/// invalid. Everything else non-conforming comes back as
/// [`ParsedLine::Incidental`].
pub fn parse_line(line: &str) -> Result<ParsedLine, ProtocolError> {
    let trimmed = line.trim();
    let map = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        _ => return Ok(ParsedLine::Incidental(trimmed.to_string())),
    };
    let Some(message_type) = map.get("type").and_then(Value::as_str).map(str::to_string)
    else {
        return Ok(ParsedLine::Incidental(trimmed.to_string()));
    };
    let Some(expected) = payload_key(&message_type) else {
        // Unknown discriminator values are tolerated as stray output so that
        // newer connectors don't break older engines.
        return Ok(ParsedLine::Incidental(trimmed.to_string()));
    };

    let payload_keys: Vec<&String> = map.keys().filter(|k| k.as_str() != "type").collect();
    let payload = match payload_keys.as_slice() {
        [] => {
            return Err(ProtocolError::MissingPayload {
                message_type,
                expected,
            })
        }
        [key] if key.as_str() == expected => map[expected].clone(),
        [key] => {
            return Err(ProtocolError::PayloadMismatch {
                message_type,
                expected,
                found: (*key).clone(),
            })
        }
        keys => {
            return Err(ProtocolError::MultiplePayloads {
                message_type,
                found: keys
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    };

    let invalid = |source| ProtocolError::InvalidPayload {
        message_type: message_type.clone(),
        source,
    };
    let message = match message_type.as_str() {
        "RECORD" => ProtocolMessage::Record(serde_json::from_value(payload).map_err(invalid)?),
        "STATE" => ProtocolMessage::State(serde_json::from_value(payload).map_err(invalid)?),
        "LOG" => ProtocolMessage::Log(serde_json::from_value(payload).map_err(invalid)?),
        "TRACE" => {
            let wire: WireTrace = serde_json::from_value(payload).map_err(invalid)?;
            ProtocolMessage::Trace(TraceMessage {
                kind: wire.error.failure_type,
                message: wire.error.message,
            })
        }
        "SPEC" => ProtocolMessage::Spec(payload),
        "CATALOG" => ProtocolMessage::Catalog(serde_json::from_value(payload).map_err(invalid)?),
        "CONNECTION_STATUS" => {
            ProtocolMessage::ConnectionStatus(serde_json::from_value(payload).map_err(invalid)?)
        }
        _ => unreachable!("payload_key filtered unknown types"),
    };
    Ok(ParsedLine::Message(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_message(line: &str) -> ProtocolMessage {
        match parse_line(line).unwrap() {
            ParsedLine::Message(m) => m,
            ParsedLine::Incidental(text) => panic!("expected message, got stray `{text}`"),
        }
    }

    #[test]
    fn parses_record() {
        let msg = parse_message(
            r#"{"type":"RECORD","record":{"stream":"s1","data":{"a":1},"emitted_at":1734000000000}}"#,
        );
        let ProtocolMessage::Record(record) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(record.stream, "s1");
        assert_eq!(record.data, json!({"a": 1}));
        assert_eq!(record.emitted_at, Some(1_734_000_000_000));
    }

    #[test]
    fn parses_record_without_emitted_at() {
        let msg = parse_message(r#"{"type":"RECORD","record":{"stream":"s1","data":{}}}"#);
        let ProtocolMessage::Record(record) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(record.emitted_at, None);
    }

    #[test]
    fn parses_state() {
        let msg = parse_message(r#"{"type":"STATE","state":{"data":{"cursor":2}}}"#);
        assert_eq!(
            msg,
            ProtocolMessage::State(StateMessage {
                data: json!({"cursor": 2})
            })
        );
    }

    #[test]
    fn parses_log_with_uppercase_level() {
        let msg = parse_message(r#"{"type":"LOG","log":{"level":"INFO","message":"syncing"}}"#);
        let ProtocolMessage::Log(log) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(log.level, LogLevel::Info);
        assert_eq!(log.message, "syncing");
    }

    #[test]
    fn parses_trace_config_error() {
        let msg = parse_message(
            r#"{"type":"TRACE","trace":{"type":"ERROR","error":{"message":"bad token","failure_type":"config_error"}}}"#,
        );
        let ProtocolMessage::Trace(trace) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(trace.kind, TraceKind::ConfigError);
        assert_eq!(trace.message, "bad token");
    }

    #[test]
    fn trace_defaults_to_system_error() {
        let msg =
            parse_message(r#"{"type":"TRACE","trace":{"type":"ERROR","error":{"message":"boom"}}}"#);
        let ProtocolMessage::Trace(trace) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(trace.kind, TraceKind::SystemError);
    }

    #[test]
    fn parses_connection_status() {
        let msg = parse_message(
            r#"{"type":"CONNECTION_STATUS","connectionStatus":{"status":"SUCCEEDED"}}"#,
        );
        let ProtocolMessage::ConnectionStatus(status) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(status.status, CheckStatus::Succeeded);
        assert!(status.message.is_none());
    }

    #[test]
    fn parses_catalog() {
        let msg = parse_message(
            r#"{"type":"CATALOG","catalog":{"streams":[{"name":"s1","supported_sync_modes":["incremental"]}]}}"#,
        );
        let ProtocolMessage::Catalog(catalog) = msg else {
            panic!("wrong variant")
        };
        assert_eq!(catalog.streams[0].name, "s1");
    }

    #[test]
    fn stray_text_is_incidental() {
        assert_eq!(
            parse_line("booting up...").unwrap(),
            ParsedLine::Incidental("booting up...".to_string())
        );
    }

    #[test]
    fn json_without_type_is_incidental() {
        let parsed = parse_line(r#"{"progress": 42}"#).unwrap();
        assert!(matches!(parsed, ParsedLine::Incidental(_)));
    }

    #[test]
    fn unknown_type_is_incidental() {
        let parsed = parse_line(r#"{"type":"CONTROL","control":{}}"#).unwrap();
        assert!(matches!(parsed, ParsedLine::Incidental(_)));
    }

    #[test]
    fn json_array_is_incidental() {
        let parsed = parse_line(r#"[1, 2, 3]"#).unwrap();
        assert!(matches!(parsed, ParsedLine::Incidental(_)));
    }

    #[test]
    fn missing_payload_is_rejected() {
        let err = parse_line(r#"{"type":"RECORD"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingPayload { .. }));
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let err = parse_line(r#"{"type":"RECORD","state":{"data":{}}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadMismatch { .. }));
    }

    #[test]
    fn multiple_payloads_are_rejected() {
        let err = parse_line(
            r#"{"type":"RECORD","record":{"stream":"s","data":{}},"state":{"data":{}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::MultiplePayloads { .. }));
    }

    #[test]
    fn structurally_invalid_payload_is_rejected() {
        let err = parse_line(r#"{"type":"RECORD","record":{"data":{}}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn message_type_names() {
        let msg = parse_message(r#"{"type":"STATE","state":{"data":{}}}"#);
        assert_eq!(msg.message_type(), "STATE");
    }
}
