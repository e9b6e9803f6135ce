//! Shared fixtures: a three-instrument mock model.
//!
//! - `gates`: voltages `c0`, `c1`, `c2`; bare `rst` zeroes them
//! - `source`: amplitude `ampl`, or the sentinel `Off`
//! - `meter`: read-only `ampl = source.ampl * (c0 + c1^2 + c2^3)`
//!
//! Every value is reported with three decimals.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use daq_param::command::ParserKind;
use daq_param::error::{DaqError, DaqResult};
use daq_param::mock::{MockInstrument, MockModel};
use daq_param::validators::{MultiType, Numbers, Strings};
use daq_param::{FunctionBuilder, Instrument, ParameterBuilder, Value};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct State {
    gates: [f64; 3],
    excitation: Option<f64>,
}

/// Physics behind the gates/source/meter fixture.
#[derive(Debug, Default)]
pub struct AMockModel {
    state: Mutex<State>,
}

impl AMockModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn gate_index(parameter: &str) -> Option<usize> {
    match parameter {
        "c0" => Some(0),
        "c1" => Some(1),
        "c2" => Some(2),
        _ => None,
    }
}

fn parse_number(instrument: &str, parameter: &str, value: Option<&str>) -> DaqResult<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| {
            DaqError::Instrument(format!(
                "{} {}: expected a number, got {:?}",
                instrument, parameter, value
            ))
        })
}

impl MockModel for AMockModel {
    fn write(&self, instrument: &str, parameter: &str, value: Option<&str>) -> DaqResult<()> {
        let mut state = self.state.lock();
        match (instrument, parameter) {
            ("gates", "rst") if value.is_none() => {
                state.gates = [0.0; 3];
                Ok(())
            }
            ("gates", p) if gate_index(p).is_some() => {
                let i = gate_index(p).unwrap_or_default();
                state.gates[i] = parse_number(instrument, p, value)?;
                Ok(())
            }
            ("source", "ampl") if value == Some("Off") => {
                state.excitation = None;
                Ok(())
            }
            ("source", "ampl") => {
                state.excitation = Some(parse_number(instrument, parameter, value)?);
                Ok(())
            }
            _ => Err(DaqError::Instrument(format!(
                "{} cannot write {}",
                instrument, parameter
            ))),
        }
    }

    fn ask(&self, instrument: &str, parameter: &str) -> DaqResult<String> {
        let state = self.state.lock();
        match (instrument, parameter) {
            ("gates", p) if gate_index(p).is_some() => {
                Ok(format!("{:.3}", state.gates[gate_index(p).unwrap_or_default()]))
            }
            ("source", "ampl") => Ok(match state.excitation {
                Some(a) => format!("{:.3}", a),
                None => "Off".to_string(),
            }),
            ("meter", "ampl") => {
                let [g0, g1, g2] = state.gates;
                let excitation = state.excitation.unwrap_or(0.0);
                Ok(format!(
                    "{:.3}",
                    excitation * (g0 + g1.powi(2) + g2.powi(3))
                ))
            }
            _ => Err(DaqError::Instrument(format!(
                "{} cannot ask {}",
                instrument, parameter
            ))),
        }
    }
}

/// Parse `"Off"` as a string and anything else as a float.
pub fn parse_ampl(raw: &str) -> DaqResult<Value> {
    if raw == "Off" {
        Ok(Value::from("Off"))
    } else {
        ParserKind::Float.parse(raw)
    }
}

/// `gates`, `source` and `meter`, all keeping history.
pub struct Fixture {
    pub model: Arc<AMockModel>,
    pub gates: Instrument,
    pub source: Instrument,
    pub meter: Instrument,
}

pub fn fixture() -> Fixture {
    fixture_with_delay(Duration::ZERO)
}

pub fn fixture_with_delay(delay: Duration) -> Fixture {
    let model = AMockModel::new();
    let mock = |name: &str| {
        MockInstrument::new(name, model.clone() as Arc<dyn MockModel>)
            .with_delay(delay)
            .with_history()
    };

    let mut gates = Instrument::from_mock(mock("gates"));
    for gate in ["c0", "c1", "c2"] {
        gates
            .add_parameter(
                gate,
                ParameterBuilder::new()
                    .get_cmd(format!("{}?", gate))
                    .set_cmd(format!("{} {{value:.3}}", gate))
                    .parser(ParserKind::Float)
                    .vals(Numbers::new(-10.0, 10.0).unwrap()),
            )
            .unwrap();
    }
    gates
        .add_parameter(
            "chan0",
            ParameterBuilder::new()
                .get_cmd("c0?")
                .set_cmd("c0 {value:.3}")
                .parser(ParserKind::Float)
                .vals(Numbers::new(-10.0, 10.0).unwrap())
                .sweep_step(0.1)
                .sweep_delay(0.005),
        )
        .unwrap();
    gates
        .add_function("reset", FunctionBuilder::new().call_cmd("rst"))
        .unwrap();

    let mut source = Instrument::from_mock(mock("source"));
    source
        .add_parameter(
            "amplitude",
            ParameterBuilder::new()
                .get_cmd("ampl?")
                .set_cmd("ampl {value:.3}")
                .parse_function(Arc::new(parse_ampl))
                .vals(
                    MultiType::new(vec![
                        Numbers::new(0.0, 1.0).unwrap().into(),
                        Strings::any().into(),
                    ])
                    .unwrap(),
                )
                .sweep_step(0.2)
                .sweep_delay(0.005),
        )
        .unwrap();

    let mut meter = Instrument::from_mock(mock("meter"));
    meter
        .add_parameter(
            "amplitude",
            ParameterBuilder::new()
                .get_cmd("ampl?")
                .parser(ParserKind::Float),
        )
        .unwrap();
    meter
        .add_function(
            "echo",
            FunctionBuilder::new()
                .args(vec![Numbers::new(0.0, 1000.0).unwrap().into()])
                .connect(|args| Ok(args.into_iter().next())),
        )
        .unwrap();

    Fixture {
        model,
        gates,
        source,
        meter,
    }
}

/// Written values, as floats, since entry `start`.
pub fn written_floats(instrument: &Instrument, start: usize) -> Vec<f64> {
    instrument
        .history()
        .map(|h| h.written_values(start))
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.parse::<f64>().ok())
        .collect()
}

/// Number of recorded interactions so far.
pub fn history_len(instrument: &Instrument) -> usize {
    instrument.history().map(|h| h.len()).unwrap_or(0)
}

pub fn assert_close(got: &[f64], want: &[f64]) {
    assert_eq!(got.len(), want.len(), "got {:?}, want {:?}", got, want);
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() < 1e-9, "got {:?}, want {:?}", got, want);
    }
}
