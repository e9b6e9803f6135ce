//! Instrument - a named device with its parameters and functions.
//!
//! An [`Instrument`] owns one [`Device`] and a [`CommandDispatcher`] over it.
//! Parameters and functions added with command templates get that dispatcher
//! injected, so a configuration only has to name commands.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::CommandDispatcher;
use crate::config::InstrumentConfig;
use crate::device::{Device, History};
use crate::error::{DaqError, DaqResult};
use crate::function::{Function, FunctionBuilder, FunctionSnapshot};
use crate::mock::{MockInstrument, MockModel};
use crate::parameter::{Parameter, ParameterBuilder, ParameterSnapshot};
use crate::value::Value;

/// Serializable summary of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    /// Instrument name.
    pub name: String,
    /// Parameters in insertion order.
    pub parameters: IndexMap<String, ParameterSnapshot>,
    /// Functions in insertion order.
    pub functions: IndexMap<String, FunctionSnapshot>,
    /// Free-form metadata.
    pub metadata: IndexMap<String, serde_json::Value>,
}

/// A device plus its named parameters and functions.
pub struct Instrument {
    name: String,
    dispatcher: CommandDispatcher,
    parameters: IndexMap<String, Parameter>,
    functions: IndexMap<String, Function>,
    metadata: IndexMap<String, serde_json::Value>,
    history: Option<History>,
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Instrument {
    /// Wrap a device. The instrument takes the device's name.
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            name: device.name().to_string(),
            dispatcher: CommandDispatcher::new(device),
            parameters: IndexMap::new(),
            functions: IndexMap::new(),
            metadata: IndexMap::new(),
            history: None,
        }
    }

    /// Wrap a mock driver, sharing its interaction log.
    pub fn from_mock(mock: MockInstrument) -> Self {
        let history = mock.history().cloned();
        let mut instrument = Self::new(Arc::new(mock));
        instrument.history = history;
        instrument
    }

    /// Build a mock-backed instrument with every configured parameter and
    /// function.
    pub fn from_config(config: &InstrumentConfig, model: Arc<dyn MockModel>) -> DaqResult<Self> {
        let mut mock = MockInstrument::new(config.name.clone(), model)
            .with_delay(Duration::from_millis(config.delay_ms));
        if config.keep_history {
            mock = mock.with_history();
        }
        let mut instrument = Self::from_mock(mock);

        for parameter in &config.parameters {
            let key = parameter.key().ok_or_else(|| {
                DaqError::Configuration(format!(
                    "{}: parameter without name or names",
                    config.name
                ))
            })?;
            instrument.add_parameter(&key, parameter.builder()?)?;
        }
        for function in &config.functions {
            instrument.add_function(&function.name, function.builder()?)?;
        }
        info!(
            instrument = %instrument.name,
            parameters = instrument.parameters.len(),
            functions = instrument.functions.len(),
            "instrument configured"
        );
        Ok(instrument)
    }

    /// Instrument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dispatcher shared by every template-based member.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// The driver's interaction log, when the instrument was built from a
    /// mock that keeps one.
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Build and register a parameter under `name`.
    ///
    /// The builder gets `name` as its identity if it has none, and the
    /// instrument's dispatcher if it has none.
    pub fn add_parameter(&mut self, name: &str, mut builder: ParameterBuilder) -> DaqResult<&Parameter> {
        if self.parameters.contains_key(name) {
            return Err(DaqError::DuplicateName {
                kind: "parameter",
                name: name.to_string(),
            });
        }
        if !builder.has_identity() {
            builder = builder.name(name);
        }
        if !builder.has_dispatcher() {
            builder = builder.dispatcher(self.dispatcher.clone());
        }
        let parameter = builder.build()?;
        debug!(instrument = %self.name, parameter = name, "parameter added");
        let parameter: &Parameter = self.parameters.entry(name.to_string()).or_insert(parameter);
        Ok(parameter)
    }

    /// Build and register a function under `name`.
    pub fn add_function(&mut self, name: &str, mut builder: FunctionBuilder) -> DaqResult<&Function> {
        if self.functions.contains_key(name) {
            return Err(DaqError::DuplicateName {
                kind: "function",
                name: name.to_string(),
            });
        }
        if !builder.has_name() {
            builder = builder.name(name);
        }
        if !builder.has_dispatcher() {
            builder = builder.dispatcher(self.dispatcher.clone());
        }
        let function = builder.build()?;
        debug!(instrument = %self.name, function = name, "function added");
        let function: &Function = self.functions.entry(name.to_string()).or_insert(function);
        Ok(function)
    }

    fn unknown(&self, kind: &'static str, name: &str) -> DaqError {
        DaqError::UnknownName {
            owner: self.name.clone(),
            kind,
            name: name.to_string(),
        }
    }

    /// Look up a parameter.
    pub fn parameter(&self, name: &str) -> DaqResult<&Parameter> {
        self.parameters
            .get(name)
            .ok_or_else(|| self.unknown("parameter", name))
    }

    /// Look up a parameter for capability removal.
    pub fn parameter_mut(&mut self, name: &str) -> DaqResult<&mut Parameter> {
        let err = self.unknown("parameter", name);
        self.parameters.get_mut(name).ok_or(err)
    }

    /// Look up a function.
    pub fn function(&self, name: &str) -> DaqResult<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| self.unknown("function", name))
    }

    /// Parameter names in insertion order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Function names in insertion order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// `parameter(name)?.get()`
    pub fn get(&self, name: &str) -> DaqResult<Value> {
        self.parameter(name)?.get()
    }

    /// `parameter(name)?.set(value)`
    pub fn set(&self, name: &str, value: impl Into<Value>) -> DaqResult<()> {
        self.parameter(name)?.set(value.into())
    }

    /// `parameter(name)?.get_async()`
    pub async fn get_async(&self, name: &str) -> DaqResult<Value> {
        self.parameter(name)?.get_async().await
    }

    /// `parameter(name)?.set_async(value)`
    pub async fn set_async(&self, name: &str, value: impl Into<Value>) -> DaqResult<()> {
        self.parameter(name)?.set_async(value.into()).await
    }

    /// `function(name)?.call(args)`
    pub fn call(&self, name: &str, args: &[Value]) -> DaqResult<Option<Value>> {
        self.function(name)?.call(args)
    }

    /// `function(name)?.call_async(args)`
    pub async fn call_async(&self, name: &str, args: &[Value]) -> DaqResult<Option<Value>> {
        self.function(name)?.call_async(args).await
    }

    /// Attach metadata reported by [`snapshot`](Self::snapshot).
    pub fn add_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Summary of every member. With `update`, gettable parameters are
    /// queried first.
    pub fn snapshot(&self, update: bool) -> DaqResult<InstrumentSnapshot> {
        let parameters = self
            .parameters
            .iter()
            .map(|(k, p)| Ok((k.clone(), p.snapshot(update)?)))
            .collect::<DaqResult<IndexMap<_, _>>>()?;
        let functions = self
            .functions
            .iter()
            .map(|(k, f)| (k.clone(), f.snapshot()))
            .collect();
        Ok(InstrumentSnapshot {
            name: self.name.clone(),
            parameters,
            functions,
            metadata: self.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ParserKind;
    use crate::mock::MemoryModel;
    use crate::validators::Numbers;

    fn instrument() -> Instrument {
        let model = MemoryModel::new().with_value("dmm", "volt", "0.25");
        Instrument::from_mock(MockInstrument::new("dmm", Arc::new(model)).with_history())
    }

    #[test]
    fn test_add_parameter_injects_name_and_dispatcher() {
        let mut dmm = instrument();
        dmm.add_parameter(
            "volt",
            ParameterBuilder::new()
                .get_cmd("volt?")
                .set_cmd("volt {value:.2}")
                .parser(ParserKind::Float)
                .vals(Numbers::new(-1.0, 1.0).unwrap()),
        )
        .unwrap();
        assert_eq!(dmm.get("volt").unwrap(), Value::Float(0.25));
        dmm.set("volt", 0.5).unwrap();
        assert_eq!(dmm.history().unwrap().written_values(0), vec!["0.50"]);
        assert_eq!(dmm.parameter("volt").unwrap().name(), "volt");
    }

    #[test]
    fn test_duplicate_and_unknown_names() {
        let mut dmm = instrument();
        dmm.add_parameter("volt", ParameterBuilder::new().get_cmd("volt?"))
            .unwrap();
        assert!(matches!(
            dmm.add_parameter("volt", ParameterBuilder::new().get_cmd("volt?")),
            Err(DaqError::DuplicateName { kind: "parameter", .. })
        ));
        assert!(matches!(
            dmm.get("curr"),
            Err(DaqError::UnknownName { kind: "parameter", .. })
        ));
        assert!(matches!(
            dmm.call("reset", &[]),
            Err(DaqError::UnknownName { kind: "function", .. })
        ));
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let mut dmm = instrument();
        dmm.add_parameter("volt", ParameterBuilder::new().get_cmd("volt?").parser(ParserKind::Float))
            .unwrap();
        dmm.add_parameter("curr", ParameterBuilder::new().set_cmd("curr {value}").vals(Numbers::unbounded()))
            .unwrap();
        dmm.add_function("rst", FunctionBuilder::new().call_cmd("rst"))
            .unwrap();
        dmm.add_metadata("vendor", serde_json::json!("acme"));

        let snap = dmm.snapshot(true).unwrap();
        let keys: Vec<_> = snap.parameters.keys().cloned().collect();
        assert_eq!(keys, vec!["volt", "curr"]);
        assert_eq!(snap.parameters["volt"].value, Some(Value::Float(0.25)));
        assert_eq!(snap.parameters["curr"].value, None);
        assert!(snap.functions.contains_key("rst"));
        assert_eq!(snap.metadata["vendor"], serde_json::json!("acme"));
    }
}
