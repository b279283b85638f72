// CLI entry point for the soil link controller.
//
// Connects to each configured device, starts the relay threads and runs the
// operator shell on stdin/stdout until `exit` or end of input. See
// `controller.rs` for the threading architecture and `shell.rs` for the
// command verbs.
//
// Usage:
//   controller [OPTIONS]
//     --config <PATH>           JSON config file (optional)
//     -m, --moisture <PORT>     Soil monitor port
//     -a, --actuator <PORT>     Water actuator port
//     -g, --gateway <PORT>      CoAP gateway port
//
// Flags override the config file. At least one port must end up set.
// Log verbosity follows RUST_LOG (default: info).

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use clap::{Arg, ArgMatches, Command, value_parser};
use log::{error, info};
use soil_link_controller::config::{ConfigError, ControllerConfig};
use soil_link_controller::shell::{ShellFailure, run_shell};
use soil_link_controller::{Controller, DeviceLink, RelayError, SharedLink, StreamLink};
use soil_link_protocol::DeviceSlot;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    let monitor = connect(&config, DeviceSlot::Monitor);
    let actuator = connect(&config, DeviceSlot::Actuator);
    let gateway = connect(&config, DeviceSlot::Gateway);

    let controller = Controller::new(monitor, actuator, gateway, config.settings());
    let (handle, faults) = controller.start();

    thread::spawn(move || {
        for fault in faults {
            if fault.is_defect() {
                abort_on(fault);
            }
        }
    });

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    match run_shell(
        &handle,
        config.report_path.as_deref(),
        stdin.lock(),
        &mut stdout,
    ) {
        Ok(()) => {}
        Err(ShellFailure::Relay(err)) => abort_on(err),
        Err(ShellFailure::Io(err)) => {
            error!("Terminal I/O failed: {err}");
            process::exit(1);
        }
    }
}

fn cli() -> Command {
    Command::new("controller")
        .about("Relays messages between the soil monitor, water actuator and CoAP gateway")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("moisture")
                .short('m')
                .long("moisture")
                .value_name("PORT")
                .help("Port of the soil monitor device")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("actuator")
                .short('a')
                .long("actuator")
                .value_name("PORT")
                .help("Port of the water actuator device")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("gateway")
                .short('g')
                .long("gateway")
                .value_name("PORT")
                .help("Port of the CoAP gateway device")
                .value_parser(value_parser!(u16)),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ControllerConfig, ConfigError> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(&port) = matches.get_one::<u16>("moisture") {
        config.monitor_port = Some(port);
    }
    if let Some(&port) = matches.get_one::<u16>("actuator") {
        config.actuator_port = Some(port);
    }
    if let Some(&port) = matches.get_one::<u16>("gateway") {
        config.gateway_port = Some(port);
    }
    config.validate()?;
    Ok(config)
}

/// Connect to the device for `slot` if it is configured. A configured device
/// that cannot be reached is fatal.
fn connect(config: &ControllerConfig, slot: DeviceSlot) -> Option<SharedLink> {
    let addr = config.device_addr(slot)?;
    match StreamLink::connect(addr) {
        Ok(link) => {
            info!("Connected to the {slot} device at {}.", link.peer());
            Some(Arc::new(link))
        }
        Err(err) => {
            error!("Unable to connect to the {slot} device: {err}");
            process::exit(1);
        }
    }
}

fn abort_on(err: RelayError) -> ! {
    error!("Aborting: {err}");
    process::abort();
}
