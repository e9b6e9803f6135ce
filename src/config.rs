//! Settings loaded with figment.
//!
//! Settings come from a TOML file, overridden by environment variables with
//! the `DAQ_PARAM_` prefix. Nested keys are separated by a double underscore
//! so that field names keep their own underscores:
//!
//! ```text
//! DAQ_PARAM_LOG__LEVEL=debug
//! DAQ_PARAM_LOG__FORMAT=json
//! ```
//!
//! A file describes logging plus any number of mock instruments:
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [[instruments]]
//! name = "source"
//! delay_ms = 1
//! keep_history = true
//!
//! [[instruments.parameters]]
//! name = "ampl"
//! get_cmd = "ampl?"
//! set_cmd = "ampl {value:.3}"
//! parse = "float"
//! vals = { type = "numbers", min = 0.0, max = 1.0 }
//! sweep_step = 0.1
//! sweep_delay = 0.005
//!
//! [[instruments.functions]]
//! name = "echo"
//! call_cmd = "echo {0}"
//! args = [{ type = "numbers" }]
//! return_parser = "float"
//! ```

use std::collections::HashSet;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::command::ParserKind;
use crate::error::{DaqError, DaqResult};
use crate::function::FunctionBuilder;
use crate::logging::{parse_log_level, OutputFormat, TracingConfig};
use crate::parameter::ParameterBuilder;
use crate::validators::{Enum, Ints, MultiType, Numbers, Strings, Validator};
use crate::value::Value;

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Logging options.
    #[serde(default)]
    pub log: LogConfig,
    /// Mock instruments to build.
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

/// Logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// pretty, compact or json.
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: OutputFormat::default(),
        }
    }
}

impl LogConfig {
    /// Subscriber options for [`logging::init`](crate::logging::init).
    pub fn tracing_config(&self) -> DaqResult<TracingConfig> {
        TracingConfig::from_level_str(&self.level, self.format)
    }
}

/// One mock instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Instrument name, also the model key.
    pub name: String,
    /// Simulated latency per command, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Record every interaction.
    #[serde(default)]
    pub keep_history: bool,
    /// Parameters, in snapshot order.
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    /// Functions, in snapshot order.
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
}

/// Declarative validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorConfig {
    /// [`Numbers`]; missing bounds are unbounded.
    Numbers {
        /// Lower bound.
        #[serde(default)]
        min: Option<f64>,
        /// Upper bound.
        #[serde(default)]
        max: Option<f64>,
    },
    /// [`Ints`]; missing bounds are unbounded.
    Ints {
        /// Lower bound.
        #[serde(default)]
        min: Option<i64>,
        /// Upper bound.
        #[serde(default)]
        max: Option<i64>,
    },
    /// [`Strings`].
    Strings {
        /// Minimum length.
        #[serde(default)]
        min_length: Option<usize>,
        /// Maximum length.
        #[serde(default)]
        max_length: Option<usize>,
    },
    /// Booleans.
    Bool,
    /// Anything at all.
    Anything,
    /// [`Enum`].
    Enum {
        /// Allowed values.
        values: Vec<Value>,
    },
    /// [`MultiType`].
    MultiType {
        /// Branches.
        validators: Vec<ValidatorConfig>,
    },
}

impl ValidatorConfig {
    /// Construct the validator, checking its bounds.
    pub fn build(&self) -> DaqResult<Validator> {
        Ok(match self {
            ValidatorConfig::Numbers { min, max } => Numbers::new(
                min.unwrap_or(f64::NEG_INFINITY),
                max.unwrap_or(f64::INFINITY),
            )?
            .into(),
            ValidatorConfig::Ints { min, max } => {
                Ints::new(min.unwrap_or(i64::MIN), max.unwrap_or(i64::MAX))?.into()
            }
            ValidatorConfig::Strings {
                min_length,
                max_length,
            } => Strings::new(min_length.unwrap_or(0), max_length.unwrap_or(usize::MAX))?.into(),
            ValidatorConfig::Bool => Validator::Bool,
            ValidatorConfig::Anything => Validator::Anything,
            ValidatorConfig::Enum { values } => Enum::new(values.clone())?.into(),
            ValidatorConfig::MultiType { validators } => MultiType::new(
                validators
                    .iter()
                    .map(ValidatorConfig::build)
                    .collect::<DaqResult<Vec<_>>>()?,
            )?
            .into(),
        })
    }
}

/// One parameter of an instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Single name (exclusive with `names`).
    #[serde(default)]
    pub name: Option<String>,
    /// Several names (exclusive with `name`).
    #[serde(default)]
    pub names: Option<Vec<String>>,
    /// Label.
    #[serde(default)]
    pub label: Option<String>,
    /// One label per name.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Query template.
    #[serde(default)]
    pub get_cmd: Option<String>,
    /// Write template using `{value}`.
    #[serde(default)]
    pub set_cmd: Option<String>,
    /// Response parser for `get_cmd`.
    #[serde(default)]
    pub parse: Option<ParserKind>,
    /// Validator.
    #[serde(default)]
    pub vals: Option<ValidatorConfig>,
    /// Largest sweep increment.
    #[serde(default)]
    pub sweep_step: Option<Value>,
    /// Seconds to wait after each sweep step.
    #[serde(default)]
    pub sweep_delay: Option<f64>,
    /// Cache lifetime in seconds.
    #[serde(default)]
    pub max_val_age: Option<f64>,
    /// Array length (exclusive with `sizes`).
    #[serde(default)]
    pub size: Option<usize>,
    /// Array dimensions (exclusive with `size`).
    #[serde(default)]
    pub sizes: Option<Vec<usize>>,
    /// Let gets answer from a fresh cache. Defaults to on when
    /// `max_val_age` is given.
    #[serde(default)]
    pub cache_gets: Option<bool>,
}

impl ParameterConfig {
    /// Key under which the instrument stores this parameter.
    pub fn key(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.names.as_ref().map(|n| n.join(",")))
    }

    /// Builder carrying every configured option. Conflicts surface in
    /// [`ParameterBuilder::build`].
    pub fn builder(&self) -> DaqResult<ParameterBuilder> {
        let mut b = ParameterBuilder::new();
        if let Some(enabled) = self.cache_gets {
            b = b.cache_gets(enabled);
        }
        if let Some(name) = &self.name {
            b = b.name(name.clone());
        }
        if let Some(names) = &self.names {
            b = b.names(names.clone());
        }
        if let Some(label) = &self.label {
            b = b.label(label.clone());
        }
        if let Some(labels) = &self.labels {
            b = b.labels(labels.clone());
        }
        if let Some(cmd) = &self.get_cmd {
            b = b.get_cmd(cmd.clone());
        }
        if let Some(cmd) = &self.set_cmd {
            b = b.set_cmd(cmd.clone());
        }
        if let Some(kind) = self.parse {
            b = b.parser(kind);
        }
        if let Some(vals) = &self.vals {
            b = b.vals(vals.build()?);
        }
        if let Some(step) = &self.sweep_step {
            b = b.sweep_step(step.clone());
        }
        if let Some(delay) = self.sweep_delay {
            b = b.sweep_delay(delay);
        }
        if let Some(age) = self.max_val_age {
            b = b.max_val_age(age);
        }
        if let Some(size) = self.size {
            b = b.size(size);
        }
        if let Some(sizes) = &self.sizes {
            b = b.sizes(sizes.clone());
        }
        Ok(b)
    }
}

/// One function of an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Function name.
    pub name: String,
    /// Command template with `{0}`, `{1}`, ...
    #[serde(default)]
    pub call_cmd: Option<String>,
    /// Positional argument validators.
    #[serde(default)]
    pub args: Vec<ValidatorConfig>,
    /// Parse the response; turns the call into an ask.
    #[serde(default)]
    pub return_parser: Option<ParserKind>,
}

impl FunctionConfig {
    /// Builder carrying every configured option.
    pub fn builder(&self) -> DaqResult<FunctionBuilder> {
        let args = self
            .args
            .iter()
            .map(ValidatorConfig::build)
            .collect::<DaqResult<Vec<_>>>()?;
        let mut b = FunctionBuilder::new().name(self.name.clone()).args(args);
        if let Some(cmd) = &self.call_cmd {
            b = b.call_cmd(cmd.clone());
        }
        if let Some(kind) = self.return_parser {
            b = b.returns(kind);
        }
        Ok(b)
    }
}

impl Settings {
    /// Load from `path` plus `DAQ_PARAM_` environment overrides, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DaqResult<Self> {
        let settings: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DAQ_PARAM_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML string (no environment overrides), then validate.
    pub fn from_toml_str(toml: &str) -> DaqResult<Self> {
        let settings: Self = Figment::new().merge(Toml::string(toml)).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks:
    /// - log level is one of trace, debug, info, warn, error
    /// - instrument names are non-empty and unique
    /// - parameter and function names are unique within an instrument
    pub fn validate(&self) -> DaqResult<()> {
        parse_log_level(&self.log.level)?;

        let mut instruments = HashSet::new();
        for instrument in &self.instruments {
            if instrument.name.is_empty() {
                return Err(DaqError::Configuration(
                    "instrument name cannot be empty".to_string(),
                ));
            }
            if !instruments.insert(instrument.name.as_str()) {
                return Err(DaqError::DuplicateName {
                    kind: "instrument",
                    name: instrument.name.clone(),
                });
            }

            let mut parameters = HashSet::new();
            for parameter in &instrument.parameters {
                let key = parameter.key().ok_or_else(|| {
                    DaqError::Configuration(format!(
                        "instrument '{}': every parameter needs name or names",
                        instrument.name
                    ))
                })?;
                if !parameters.insert(key.clone()) {
                    return Err(DaqError::DuplicateName {
                        kind: "parameter",
                        name: key,
                    });
                }
            }

            let mut functions = HashSet::new();
            for function in &instrument.functions {
                if !functions.insert(function.name.as_str()) {
                    return Err(DaqError::DuplicateName {
                        kind: "function",
                        name: function.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[log]
level = "debug"
format = "json"

[[instruments]]
name = "source"
delay_ms = 1
keep_history = true

[[instruments.parameters]]
name = "ampl"
get_cmd = "ampl?"
set_cmd = "ampl {value:.3}"
parse = "float"
vals = { type = "multi_type", validators = [{ type = "numbers", min = 0.0, max = 1.0 }, { type = "strings" }] }
sweep_step = 0.1
sweep_delay = 0.005

[[instruments.functions]]
name = "echo"
call_cmd = "echo {0}"
args = [{ type = "numbers" }]
return_parser = "float"
"#;

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.log.format, OutputFormat::Json);
        let source = &settings.instruments[0];
        assert_eq!(source.delay_ms, 1);
        let ampl = &source.parameters[0];
        assert_eq!(ampl.sweep_step, Some(Value::Float(0.1)));
        assert_eq!(ampl.parse, Some(ParserKind::Float));
        let vals = ampl.vals.as_ref().unwrap().build().unwrap();
        assert!(vals.is_valid(&Value::from("Off")));
        assert_eq!(source.functions[0].args.len(), 1);
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.log.level, "info");
        assert!(settings.instruments.is_empty());
    }

    #[test]
    fn test_validation_rejects_duplicates_and_bad_levels() {
        let bad_level = "[log]\nlevel = \"loud\"\n";
        assert!(Settings::from_toml_str(bad_level).is_err());

        let dup = r#"
[[instruments]]
name = "a"
[[instruments]]
name = "a"
"#;
        assert!(matches!(
            Settings::from_toml_str(dup),
            Err(DaqError::DuplicateName { kind: "instrument", .. })
        ));

        let dup_param = r#"
[[instruments]]
name = "a"
[[instruments.parameters]]
name = "x"
get_cmd = "x?"
[[instruments.parameters]]
name = "x"
get_cmd = "x?"
"#;
        assert!(matches!(
            Settings::from_toml_str(dup_param),
            Err(DaqError::DuplicateName { kind: "parameter", .. })
        ));
    }

    #[test]
    fn test_bad_validator_bounds() {
        let cfg = ValidatorConfig::Numbers {
            min: Some(2.0),
            max: Some(1.0),
        };
        assert!(matches!(cfg.build(), Err(DaqError::Configuration(_))));
    }
}
