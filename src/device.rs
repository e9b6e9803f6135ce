//! Device driver contract and the interaction history.
//!
//! A [`Device`] is the narrow write/ask boundary every parameter and function
//! talks through. Drivers implement whichever of the blocking and suspendable
//! forms they support; the rest default to [`DaqError::NotImplemented`].
//!
//! The core calls exactly one device method per logical interaction and never
//! retries. Timeouts and retries belong to the transport behind the driver.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{DaqError, DaqResult};

/// Write/ask contract implemented by device drivers.
#[async_trait]
pub trait Device: Send + Sync {
    /// Instrument name, used in logs and errors.
    fn name(&self) -> &str;

    /// Send a command that produces no response.
    fn write(&self, cmd: &str) -> DaqResult<()> {
        Err(DaqError::NotImplemented(format!(
            "{} has no blocking write (command {:?})",
            self.name(),
            cmd
        )))
    }

    /// Send a query and return the raw response.
    fn ask(&self, cmd: &str) -> DaqResult<String> {
        Err(DaqError::NotImplemented(format!(
            "{} has no blocking ask (command {:?})",
            self.name(),
            cmd
        )))
    }

    /// Suspendable form of [`Device::write`].
    async fn write_async(&self, cmd: &str) -> DaqResult<()> {
        Err(DaqError::NotImplemented(format!(
            "{} has no suspendable write (command {:?})",
            self.name(),
            cmd
        )))
    }

    /// Suspendable form of [`Device::ask`].
    async fn ask_async(&self, cmd: &str) -> DaqResult<String> {
        Err(DaqError::NotImplemented(format!(
            "{} has no suspendable ask (command {:?})",
            self.name(),
            cmd
        )))
    }
}

/// Kind of device interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    /// Query with a response.
    Ask,
    /// Command without a response.
    Write,
}

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the driver handled the command.
    pub timestamp: DateTime<Utc>,
    /// Ask or write.
    pub kind: Interaction,
    /// Full formatted command.
    pub command: String,
    /// Parameter part of the command.
    pub parameter: String,
    /// Written value, if the command carried one.
    pub value: Option<String>,
}

/// Append-only interaction log owned by one driver instance.
///
/// Cloning shares the same log, so a test can keep a handle while the driver
/// is owned by an instrument.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl History {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry stamped with the current time.
    pub fn record(
        &self,
        kind: Interaction,
        command: &str,
        parameter: &str,
        value: Option<&str>,
    ) {
        self.entries.lock().push(HistoryEntry {
            timestamp: Utc::now(),
            kind,
            command: command.to_string(),
            parameter: parameter.to_string(),
            value: value.map(str::to_string),
        });
    }

    /// Snapshot of all entries in order.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }

    /// Entries recorded after the first `start` ones.
    pub fn since(&self, start: usize) -> Vec<HistoryEntry> {
        self.entries.lock().iter().skip(start).cloned().collect()
    }

    /// Values written (in order) among the entries after the first `start`.
    pub fn written_values(&self, start: usize) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .skip(start)
            .filter(|e| e.kind == Interaction::Write)
            .filter_map(|e| e.value.clone())
            .collect()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl Device for Silent {
        fn name(&self) -> &str {
            "silent"
        }
    }

    #[tokio::test]
    async fn test_default_methods_are_not_implemented() {
        let dev = Silent;
        assert!(matches!(dev.write("x 1"), Err(DaqError::NotImplemented(_))));
        assert!(matches!(dev.ask("x?"), Err(DaqError::NotImplemented(_))));
        assert!(matches!(
            dev.ask_async("x?").await,
            Err(DaqError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_history_is_shared_and_ordered() {
        let history = History::new();
        let view = history.clone();
        history.record(Interaction::Ask, "ampl?", "ampl", None);
        history.record(Interaction::Write, "ampl 0.1", "ampl", Some("0.1"));
        history.record(Interaction::Write, "ampl 0.2", "ampl", Some("0.2"));
        assert_eq!(view.len(), 3);
        assert_eq!(view.entries()[0].kind, Interaction::Ask);
        assert_eq!(view.written_values(0), vec!["0.1", "0.2"]);
        assert_eq!(view.since(2).len(), 1);
    }
}
