//! Command-line driver for configured mock instruments.
//!
//! Loads a settings file, builds every instrument it describes on top of an
//! in-memory model, and runs one operation against them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use daq_param::config::Settings;
use daq_param::logging;
use daq_param::mock::MemoryModel;
use daq_param::sweep_values::Slice;
use daq_param::{Instrument, Value};
use indexmap::IndexMap;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "daq-param", about = "Drive configured instrument parameters")]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = "config/daq-param.toml")]
    config: PathBuf,

    /// Print the interaction history of every instrument afterwards
    #[arg(long)]
    history: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective settings as TOML
    Config,
    /// Print a JSON snapshot of every instrument
    Show {
        /// Query gettable parameters first
        #[arg(long)]
        update: bool,
    },
    /// Read one parameter
    Get { instrument: String, parameter: String },
    /// Write one parameter, stepping if it is sweepable
    Set {
        instrument: String,
        parameter: String,
        value: String,
    },
    /// Set each point of start..stop by step, reading `measure` after each
    Sweep {
        instrument: String,
        parameter: String,
        start: f64,
        stop: f64,
        step: f64,
        /// `instrument.parameter` to read at each point
        #[arg(long)]
        measure: Option<String>,
    },
    /// Call a function
    Call {
        instrument: String,
        function: String,
        args: Vec<String>,
    },
}

/// Integers, then floats, then booleans, else the raw string.
fn parse_cli_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::Str(raw.to_string())
    }
}

fn lookup<'a>(instruments: &'a IndexMap<String, Instrument>, name: &str) -> Result<&'a Instrument> {
    instruments
        .get(name)
        .ok_or_else(|| anyhow!("no instrument named {}", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    logging::init(settings.log.tracing_config()?)?;

    let model = Arc::new(MemoryModel::new());
    let mut instruments = IndexMap::new();
    for config in &settings.instruments {
        let instrument = Instrument::from_config(config, model.clone())
            .with_context(|| format!("building instrument {}", config.name))?;
        instruments.insert(config.name.clone(), instrument);
    }
    info!(count = instruments.len(), "instruments ready");

    match args.command {
        Command::Config => {
            println!("{}", toml::to_string_pretty(&settings)?);
        }
        Command::Show { update } => {
            let snapshots = instruments
                .values()
                .map(|i| i.snapshot(update))
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
        Command::Get {
            instrument,
            parameter,
        } => {
            let value = lookup(&instruments, &instrument)?
                .get_async(&parameter)
                .await?;
            println!("{}", value);
        }
        Command::Set {
            instrument,
            parameter,
            value,
        } => {
            lookup(&instruments, &instrument)?
                .set_async(&parameter, parse_cli_value(&value))
                .await?;
        }
        Command::Sweep {
            instrument,
            parameter,
            start,
            stop,
            step,
            measure,
        } => {
            let target = lookup(&instruments, &instrument)?.parameter(&parameter)?;
            let measured = match &measure {
                Some(qualified) => {
                    let (inst, param) = qualified
                        .split_once('.')
                        .ok_or_else(|| anyhow!("--measure expects instrument.parameter"))?;
                    Some(lookup(&instruments, inst)?.parameter(param)?)
                }
                None => None,
            };
            let values = target.sweep(Slice::new(start, stop, step))?;
            for point in &values {
                values.set_async(point.clone()).await?;
                match measured {
                    Some(m) => println!("{}\t{}", point, m.get_async().await?),
                    None => println!("{}", point),
                }
            }
        }
        Command::Call {
            instrument,
            function,
            args,
        } => {
            let args: Vec<Value> = args.iter().map(|a| parse_cli_value(a)).collect();
            let result = lookup(&instruments, &instrument)?
                .call_async(&function, &args)
                .await?;
            if let Some(value) = result {
                println!("{}", value);
            }
        }
    }

    if args.history {
        for instrument in instruments.values() {
            if let Some(history) = instrument.history() {
                for entry in history.entries() {
                    println!("{}", serde_json::to_string(&entry)?);
                }
            }
        }
    }
    Ok(())
}
