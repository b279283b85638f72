// soil_link_controller: host-side relay between the emulated soil monitor,
// water actuator and CoAP gateway.
//
// The controller connects out to each configured device, relays alerts
// between the monitor and the actuator, lets an operator inject commands from
// a shell, and times CoAP round trips through the gateway.
//
// Module overview:
// - `queue.rs`:       `CommandQueue`, the blocking FIFO between producers and
//                     the single sender thread.
// - `command.rs`:     `Command`, a message plus its destination slot.
// - `transport.rs`:   `DeviceLink` trait and the TCP `StreamLink`.
// - `controller.rs`:  Slot table, sender/receiver threads, dispatch table,
//                     gateway exchange. The core of the crate.
// - `error.rs`:       `RelayError` with its Defect / Connection / Advisory tiers.
// - `experiment.rs`:  Round-trip timing and statistics for the gateway.
// - `config.rs`:      JSON + CLI configuration.
// - `shell.rs`:       Operator command parser and loop.
//
// Dependencies: `soil_link_protocol` for the wire formats. Plain `std::net`
// and `std::thread`; no async runtime.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod experiment;
pub mod queue;
pub mod shell;
pub mod transport;

pub use command::Command;
pub use controller::{Controller, RelayHandle, RelaySettings, SharedLink};
pub use error::{RelayError, Severity};
pub use queue::CommandQueue;
pub use transport::{DeviceLink, StreamLink};
