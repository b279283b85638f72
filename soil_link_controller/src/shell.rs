// Interactive operator shell.
//
// Reads one line at a time, splits it on whitespace, and turns it into a
// `ShellCommand`. Parsing is pure (`parse`) so it can be tested without a
// controller; `run_shell` drives a `RelayHandle` with the parsed commands.
//
// Verbs:
//   soil <level>               queue a moisture change for the monitor
//   water <status>             queue a water status change for the actuator
//                              (0 = empty, anything else = full)
//   dry | wet                  queue a soil alert for the actuator
//   coap                       one gateway round trip, reply printed
//   gateway <trials> <delay>   timed gateway round trips, delay in ms
//   exit                       leave the shell
//
// Gateway failures are printed and the shell carries on, except for defects,
// which are handed back to the caller.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use crate::controller::RelayHandle;
use crate::error::RelayError;
use crate::experiment::append_report;

pub const PROMPT: &str = "Commander > ";

const SOIL_USAGE: &str = "Usage: soil level\n\
                          e.g. `soil 30` to set the moisture level to 30%.";
const WATER_USAGE: &str = "Usage: water status\n\
                           e.g. `water 1` to fill the bottle with water.\n     \
                           `water 0` to empty the bottle.";
const GATEWAY_USAGE: &str = "Usage: gateway trials delay\n\
                             where `trials` specify the number of trials;\n      \
                             `delay` specify the amount of time in milliseconds between each trial.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Soil(u32),
    Water(bool),
    Dry,
    Wet,
    Coap,
    Gateway { trials: usize, delay: Duration },
    Exit,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("{0}")]
    Usage(&'static str),
    #[error("Unknown command: [{0}].")]
    Unknown(String),
}

/// Why `run_shell` stopped early.
#[derive(Debug, Error)]
pub enum ShellFailure {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Relay(RelayError),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<ShellCommand>, ShellError> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = args.split_first() else {
        return Ok(None);
    };

    let command = match verb {
        "exit" => ShellCommand::Exit,
        "soil" => match rest {
            [level] => ShellCommand::Soil(level.parse().map_err(|_| ShellError::Usage(SOIL_USAGE))?),
            _ => return Err(ShellError::Usage(SOIL_USAGE)),
        },
        "water" => match rest {
            [status] => {
                let status: i64 = status.parse().map_err(|_| ShellError::Usage(WATER_USAGE))?;
                ShellCommand::Water(status != 0)
            }
            _ => return Err(ShellError::Usage(WATER_USAGE)),
        },
        "dry" => ShellCommand::Dry,
        "wet" => ShellCommand::Wet,
        "coap" => ShellCommand::Coap,
        "gateway" => match rest {
            [trials, delay] => {
                let trials = trials.parse().map_err(|_| ShellError::Usage(GATEWAY_USAGE))?;
                let delay_ms: u64 = delay.parse().map_err(|_| ShellError::Usage(GATEWAY_USAGE))?;
                ShellCommand::Gateway {
                    trials,
                    delay: Duration::from_millis(delay_ms),
                }
            }
            _ => return Err(ShellError::Usage(GATEWAY_USAGE)),
        },
        other => return Err(ShellError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Prompt, read, execute until `exit` or end of input.
pub fn run_shell<R: BufRead, W: Write>(
    handle: &RelayHandle,
    report_path: Option<&Path>,
    mut input: R,
    output: &mut W,
) -> Result<(), ShellFailure> {
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }

        match parse(&line) {
            Ok(None) => {}
            Ok(Some(ShellCommand::Exit)) => {
                writeln!(output, "Goodbye.")?;
                return Ok(());
            }
            Ok(Some(command)) => execute(handle, report_path, command, output)?,
            Err(err) => writeln!(output, "{err}")?,
        }
    }
}

fn execute<W: Write>(
    handle: &RelayHandle,
    report_path: Option<&Path>,
    command: ShellCommand,
    output: &mut W,
) -> Result<(), ShellFailure> {
    match command {
        ShellCommand::Soil(level) => handle.change_soil_moisture(level),
        ShellCommand::Water(has_water) => handle.change_water_status(has_water),
        ShellCommand::Dry => handle.send_dry_soil_alert(),
        ShellCommand::Wet => handle.send_wet_soil_alert(),
        ShellCommand::Coap => match handle.gateway_exchange_once() {
            Ok(text) => {
                writeln!(output, "Received a HTTP request message:")?;
                writeln!(output, "{text}")?;
            }
            Err(err) => report_failure(err, output)?,
        },
        ShellCommand::Gateway { trials, delay } => {
            writeln!(output, "Running the gateway experiment...")?;
            writeln!(
                output,
                "\tTrials = {trials}; Delay = {} milliseconds.",
                delay.as_millis()
            )?;
            match handle.run_gateway_experiment(trials, delay) {
                Ok(timings) => match timings.summary() {
                    Some(summary) => {
                        writeln!(output, "Execution time:")?;
                        writeln!(output, "- Min = {} nanoseconds.", summary.min_ns)?;
                        writeln!(output, "- Max = {} nanoseconds.", summary.max_ns)?;
                        writeln!(output, "- Med = {} nanoseconds.", summary.median_ns)?;
                        writeln!(output, "- Avg = {:.2} nanoseconds.", summary.mean_ns)?;
                        writeln!(output, "- Std = {:.2} nanoseconds.", summary.std_dev_ns)?;
                        if let Some(path) = report_path {
                            if let Err(err) = append_report(path, delay, &summary) {
                                warn!("Failed to append to {}: {err}", path.display());
                            }
                        }
                    }
                    None => writeln!(output, "No trials were run.")?,
                },
                Err(err) => report_failure(err, output)?,
            }
        }
        ShellCommand::Exit => {}
    }
    Ok(())
}

/// Print a gateway failure, or hand it up if it is a defect.
fn report_failure<W: Write>(err: RelayError, output: &mut W) -> Result<(), ShellFailure> {
    if err.is_defect() {
        return Err(ShellFailure::Relay(err));
    }
    writeln!(output, "{err}")?;
    Ok(())
}
