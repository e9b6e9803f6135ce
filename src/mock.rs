//! Mock instrument driver for testing
//!
//! [`MockInstrument`] implements [`Device`] on top of a [`MockModel`] that
//! simulates the physics. It provides:
//! - Simulated per-command latency
//! - Controllable failure injection
//! - An optional [`History`] of every write and ask
//!
//! Commands follow a simple `"<parameter> <value>"` / `"<parameter>?"` shape:
//! writes are split at the first space, asks must end in `?` and carry no
//! value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::device::{Device, History, Interaction};
use crate::error::{DaqError, DaqResult};

/// Simulated device behaviour behind a [`MockInstrument`].
pub trait MockModel: Send + Sync {
    /// Apply a write. `value` is `None` for bare commands such as `"rst"`.
    fn write(&self, instrument: &str, parameter: &str, value: Option<&str>) -> DaqResult<()>;

    /// Answer a query for `parameter`.
    fn ask(&self, instrument: &str, parameter: &str) -> DaqResult<String>;
}

/// Model that stores written values and returns them on ask.
#[derive(Debug, Default)]
pub struct MemoryModel {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryModel {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a value.
    pub fn with_value(self, instrument: &str, parameter: &str, value: &str) -> Self {
        self.values.lock().insert(
            (instrument.to_string(), parameter.to_string()),
            value.to_string(),
        );
        self
    }
}

impl MockModel for MemoryModel {
    fn write(&self, instrument: &str, parameter: &str, value: Option<&str>) -> DaqResult<()> {
        let key = (instrument.to_string(), parameter.to_string());
        match value {
            Some(v) => {
                self.values.lock().insert(key, v.to_string());
            }
            None => {
                self.values.lock().remove(&key);
            }
        }
        Ok(())
    }

    fn ask(&self, instrument: &str, parameter: &str) -> DaqResult<String> {
        self.values
            .lock()
            .get(&(instrument.to_string(), parameter.to_string()))
            .cloned()
            .ok_or_else(|| {
                DaqError::Instrument(format!("{} has no value for {}", instrument, parameter))
            })
    }
}

/// Simulated instrument driver.
pub struct MockInstrument {
    name: String,
    model: Arc<dyn MockModel>,
    delay: Duration,
    history: Option<History>,
    should_fail_next: AtomicBool,
}

impl std::fmt::Debug for MockInstrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockInstrument")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("history", &self.history.as_ref().map(History::len))
            .finish()
    }
}

impl MockInstrument {
    /// Driver named `name` backed by `model`, no latency, no history.
    pub fn new(name: impl Into<String>, model: Arc<dyn MockModel>) -> Self {
        Self {
            name: name.into(),
            model,
            delay: Duration::ZERO,
            history: None,
            should_fail_next: AtomicBool::new(false),
        }
    }

    /// Simulated latency applied before every command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record every interaction.
    pub fn with_history(mut self) -> Self {
        self.history = Some(History::new());
        self
    }

    /// The interaction log, if enabled.
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Make the next command fail with an instrument error.
    pub fn inject_next_failure(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self, cmd: &str) -> DaqResult<()> {
        if self.should_fail_next.swap(false, Ordering::SeqCst) {
            return Err(DaqError::Instrument(format!(
                "{}: injected failure on {:?}",
                self.name, cmd
            )));
        }
        Ok(())
    }

    fn handle_write(&self, cmd: &str) -> DaqResult<()> {
        self.check_failure(cmd)?;
        let (parameter, value) = match cmd.split_once(' ') {
            Some((p, v)) => (p, Some(v)),
            None => (cmd, None),
        };
        trace!(instrument = %self.name, parameter, value = ?value, "mock write");
        if let Some(history) = &self.history {
            history.record(Interaction::Write, cmd, parameter, value);
        }
        self.model.write(&self.name, parameter, value)
    }

    fn handle_ask(&self, cmd: &str) -> DaqResult<String> {
        self.check_failure(cmd)?;
        if cmd.contains(' ') {
            return Err(DaqError::DeviceProtocol(format!(
                "ask command must not include a value: {:?}",
                cmd
            )));
        }
        let parameter = cmd.strip_suffix('?').ok_or_else(|| {
            DaqError::DeviceProtocol(format!("ask command must end with '?': {:?}", cmd))
        })?;
        trace!(instrument = %self.name, parameter, "mock ask");
        if let Some(history) = &self.history {
            history.record(Interaction::Ask, cmd, parameter, None);
        }
        self.model.ask(&self.name, parameter)
    }
}

#[async_trait]
impl Device for MockInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, cmd: &str) -> DaqResult<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.handle_write(cmd)
    }

    fn ask(&self, cmd: &str) -> DaqResult<String> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.handle_ask(cmd)
    }

    async fn write_async(&self, cmd: &str) -> DaqResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.handle_write(cmd)
    }

    async fn ask_async(&self, cmd: &str) -> DaqResult<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.handle_ask(cmd)
    }
}
