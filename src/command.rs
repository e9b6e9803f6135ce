//! Command templates, response parsers and the dispatcher.
//!
//! Templates use `strfmt` syntax. Parameter set commands name their value
//! `{value}` (`"ampl {value:.3}"`), function commands name their arguments by
//! position (`"echo {0}"`). Formatting and parsing failures are
//! [`DaqError::DeviceProtocol`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strfmt::{strfmt_map, FmtError, Formatter};
use tracing::debug;

use crate::device::Device;
use crate::error::{DaqError, DaqResult};
use crate::value::Value;

/// Turns a raw device response into a value.
pub type ParseFn = Arc<dyn Fn(&str) -> DaqResult<Value> + Send + Sync>;

/// Transforms function arguments before they are formatted.
pub type ArgsFn = Arc<dyn Fn(Vec<Value>) -> DaqResult<Vec<Value>> + Send + Sync>;

fn write_value(fmt: &mut Formatter, value: &Value) -> strfmt::Result<()> {
    match value {
        Value::Float(x) => fmt.f64(*x),
        Value::Int(i) if fmt.precision().is_some() => fmt.f64(*i as f64),
        Value::Int(i) => fmt.i64(*i),
        Value::Str(s) => fmt.str(s),
        other => fmt.str(&other.to_string()),
    }
}

fn format_with<'v>(
    template: &str,
    lookup: impl Fn(&str) -> Option<&'v Value>,
) -> DaqResult<String> {
    strfmt_map(template, |mut fmt: Formatter| match lookup(fmt.key) {
        Some(value) => write_value(&mut fmt, value),
        None => Err(FmtError::KeyError(fmt.key.to_string())),
    })
    .map_err(|e| DaqError::DeviceProtocol(format!("cannot format {:?}: {}", template, e)))
}

/// Format a set command, substituting `{value}`.
pub fn format_value(template: &str, value: &Value) -> DaqResult<String> {
    format_with(template, |key| (key == "value").then_some(value))
}

/// Format a function command, substituting `{0}`, `{1}`, ...
pub fn format_args(template: &str, args: &[Value]) -> DaqResult<String> {
    format_with(template, |key| key.parse::<usize>().ok().and_then(|i| args.get(i)))
}

/// Built-in response parsers, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// Trimmed raw string.
    #[default]
    Str,
    /// `f64`.
    Float,
    /// `i64`.
    Int,
    /// `true/false`, `on/off`, `1/0`.
    Bool,
    /// Comma separated `f64` list, returned as an array.
    FloatList,
}

impl ParserKind {
    /// Parse `raw` according to this kind.
    pub fn parse(self, raw: &str) -> DaqResult<Value> {
        let s = raw.trim();
        let bad = |what: &str| DaqError::DeviceProtocol(format!("cannot parse {:?} as {}", raw, what));
        match self {
            ParserKind::Str => Ok(Value::Str(s.to_string())),
            ParserKind::Float => s.parse::<f64>().map(Value::Float).map_err(|_| bad("float")),
            ParserKind::Int => s.parse::<i64>().map(Value::Int).map_err(|_| bad("int")),
            ParserKind::Bool => match s.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "off" => Ok(Value::Bool(false)),
                _ => Err(bad("bool")),
            },
            ParserKind::FloatList => s
                .split(',')
                .map(|part| part.trim().parse::<f64>().map(Value::Float))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
                .map_err(|_| bad("float list")),
        }
    }

    /// This kind as a shareable parse function.
    pub fn into_fn(self) -> ParseFn {
        Arc::new(move |raw| self.parse(raw))
    }
}

/// Sends formatted commands through a [`Device`].
///
/// Exactly one device call per method call, never retried.
#[derive(Clone)]
pub struct CommandDispatcher {
    device: Arc<dyn Device>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("device", &self.device.name())
            .finish()
    }
}

impl CommandDispatcher {
    /// Dispatch through `device`.
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self { device }
    }

    /// Underlying device.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Write `cmd`.
    pub fn execute(&self, cmd: &str) -> DaqResult<()> {
        debug!(device = self.device.name(), command = cmd, "write");
        self.device.write(cmd)
    }

    /// Suspendable [`execute`](Self::execute).
    pub async fn execute_async(&self, cmd: &str) -> DaqResult<()> {
        debug!(device = self.device.name(), command = cmd, "write");
        self.device.write_async(cmd).await
    }

    /// Ask `cmd` and parse the response (raw string when `parser` is `None`).
    pub fn query(&self, cmd: &str, parser: Option<&ParseFn>) -> DaqResult<Value> {
        debug!(device = self.device.name(), command = cmd, "ask");
        let raw = self.device.ask(cmd)?;
        parse_response(&raw, parser)
    }

    /// Suspendable [`query`](Self::query).
    pub async fn query_async(&self, cmd: &str, parser: Option<&ParseFn>) -> DaqResult<Value> {
        debug!(device = self.device.name(), command = cmd, "ask");
        let raw = self.device.ask_async(cmd).await?;
        parse_response(&raw, parser)
    }
}

fn parse_response(raw: &str, parser: Option<&ParseFn>) -> DaqResult<Value> {
    match parser {
        Some(parse) => parse(raw),
        None => Ok(Value::Str(raw.to_string())),
    }
}
