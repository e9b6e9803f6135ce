//! Loading settings and building instruments from them.

use std::io::Write;
use std::sync::Arc;

use daq_param::config::Settings;
use daq_param::logging::OutputFormat;
use daq_param::mock::MemoryModel;
use daq_param::{DaqError, Instrument, Value};
use serial_test::serial;
use tempfile::NamedTempFile;

const SETTINGS: &str = r#"
[log]
level = "info"

[[instruments]]
name = "source"
keep_history = true

[[instruments.parameters]]
name = "ampl"
get_cmd = "ampl?"
set_cmd = "ampl {value:.3}"
parse = "float"
vals = { type = "numbers", min = 0.0, max = 1.0 }
sweep_step = 0.1
sweep_delay = 0.001

[[instruments.parameters]]
names = ["x", "y"]
get_cmd = "xy?"
parse = "float_list"

[[instruments.functions]]
name = "rst"
call_cmd = "rst"

[[instruments.functions]]
name = "ping"
call_cmd = "ampl?"
return_parser = "float"
"#;

// Environment overrides are process-wide.
#[test]
#[serial]
fn test_load_from_file_with_env_override() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SETTINGS.as_bytes()).unwrap();

    let settings = Settings::load_from(file.path()).unwrap();
    assert_eq!(settings.log.level, "info");
    assert_eq!(settings.instruments[0].parameters.len(), 2);

    std::env::set_var("DAQ_PARAM_LOG__LEVEL", "debug");
    std::env::set_var("DAQ_PARAM_LOG__FORMAT", "json");
    let settings = Settings::load_from(file.path());
    std::env::remove_var("DAQ_PARAM_LOG__LEVEL");
    std::env::remove_var("DAQ_PARAM_LOG__FORMAT");
    let settings = settings.unwrap();
    assert_eq!(settings.log.level, "debug");
    assert_eq!(settings.log.format, OutputFormat::Json);
    assert!(settings.log.tracing_config().is_ok());

    let mut bad = NamedTempFile::new().unwrap();
    bad.write_all(b"[log]\nlevel = [1, 2]\n").unwrap();
    assert!(matches!(
        Settings::load_from(bad.path()),
        Err(DaqError::Config(_))
    ));
}

#[test]
fn test_instrument_from_config() {
    let settings = Settings::from_toml_str(SETTINGS).unwrap();
    let model = MemoryModel::new()
        .with_value("source", "ampl", "0.000")
        .with_value("source", "xy", "1.5, 2.5");
    let source = Instrument::from_config(&settings.instruments[0], Arc::new(model)).unwrap();

    let names: Vec<_> = source.parameter_names().collect();
    assert_eq!(names, vec!["ampl", "x,y"]);

    source.set("ampl", 0.3).unwrap();
    assert_eq!(
        source.history().unwrap().written_values(0),
        vec!["0.100", "0.200", "0.300"]
    );
    assert_eq!(source.call("ping", &[]).unwrap(), Some(Value::Float(0.3)));
    assert_eq!(
        source.get("x,y").unwrap(),
        Value::Array(vec![Value::Float(1.5), Value::Float(2.5)])
    );
    assert_eq!(source.parameter("x,y").unwrap().label(), "x,y");
}

#[test]
fn test_conflicting_parameter_settings() {
    let both_names = r#"
[[instruments]]
name = "dmm"

[[instruments.parameters]]
name = "volt"
names = ["a", "b"]
get_cmd = "volt?"
"#;
    let settings = Settings::from_toml_str(both_names).unwrap();
    let err = Instrument::from_config(&settings.instruments[0], Arc::new(MemoryModel::new()))
        .unwrap_err();
    assert!(matches!(err, DaqError::Configuration(_)));

    let sweep_without_vals = r#"
[[instruments]]
name = "dmm"

[[instruments.parameters]]
name = "volt"
set_cmd = "volt {value}"
sweep_step = 0.1
sweep_delay = 0.01
"#;
    let settings = Settings::from_toml_str(sweep_without_vals).unwrap();
    let err = Instrument::from_config(&settings.instruments[0], Arc::new(MemoryModel::new()))
        .unwrap_err();
    assert!(matches!(err, DaqError::Configuration(_)));

    let negative_delay = r#"
[[instruments]]
name = "dmm"

[[instruments.parameters]]
name = "volt"
set_cmd = "volt {value}"
vals = { type = "numbers" }
sweep_step = 0.1
sweep_delay = -1.0
"#;
    let settings = Settings::from_toml_str(negative_delay).unwrap();
    let err = Instrument::from_config(&settings.instruments[0], Arc::new(MemoryModel::new()))
        .unwrap_err();
    assert!(matches!(err, DaqError::Configuration(_)));
}

#[test]
fn test_shipped_config_is_valid() {
    let text = include_str!("../config/daq-param.toml");
    let settings = Settings::from_toml_str(text).unwrap();
    let model = Arc::new(MemoryModel::new());
    for config in &settings.instruments {
        Instrument::from_config(config, model.clone()).unwrap();
    }
}
