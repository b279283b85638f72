// The relay controller: slot table, sender thread, receiver threads, and the
// synchronous gateway exchange.
//
// Architecture: one writer, one reader per device, one queue between them.
//
// - **Sender thread** (exactly one): `poll`s the `CommandQueue` forever and
//   writes each command's message to the link in its destination slot. An
//   unbound destination or a failed write is an advisory: logged, the
//   command is dropped, the loop continues.
// - **Receiver threads** (one per bound monitor/actuator slot): discard the
//   preamble the emulated hardware emits on connect, then read fixed-size
//   messages forever. Alerts are turned into relay commands and offered to
//   the queue; stack reports and run-out-of-water alerts are only logged.
//   A failed read ends that receiver (the connection is considered dead);
//   an unknown message type ends it with a `Defect`. Either way the terminal
//   error goes to the fault channel returned by `start`, and the rest of the
//   controller keeps running.
// - **Gateway exchange**: no thread of its own. `RelayHandle` sends a CoAP
//   request and blocks for the translated reply on the caller's thread.
//
// The queue is the only shared mutable state. Links are shared through `Arc`
// but each direction of a link has a single user: receivers read their own
// link, the sender writes, and the gateway link has no receiver thread.
//
// Slots are bound once, in `Controller::new`, and never rebound. There is no
// reconnect and no shutdown; threads live until the process exits, and
// queued-but-unsent commands are lost at exit.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};
use soil_link_protocol::{
    DecodeError, DeviceSlot, MessageType, WIRE_MESSAGE_SIZE, WireMessage, encode_moisture_request,
};

use crate::command::Command;
use crate::error::{Advisory, Defect, RelayError, Severity};
use crate::experiment::{Timings, measure};
use crate::queue::CommandQueue;
use crate::transport::DeviceLink;

/// A link shared between the controller's threads.
pub type SharedLink = Arc<dyn DeviceLink>;

/// Bytes of start-up noise the emulated hardware sends before real traffic.
pub const DEFAULT_PREAMBLE_LEN: usize = 15;

/// Length of the HTTP text the gateway sends back for one CoAP request.
pub const DEFAULT_GATEWAY_REPLY_LEN: usize = 54;

/// Moisture value carried by a one-shot gateway exchange.
pub const DEFAULT_COAP_MOISTURE: u32 = 100;

/// Runtime knobs for a controller. See `config.rs` for where they come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelaySettings {
    pub preamble_len: usize,
    pub gateway_reply_len: usize,
    pub coap_moisture: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            preamble_len: DEFAULT_PREAMBLE_LEN,
            gateway_reply_len: DEFAULT_GATEWAY_REPLY_LEN,
            coap_moisture: DEFAULT_COAP_MOISTURE,
        }
    }
}

/// Fixed table of optional links, indexed by `DeviceSlot`.
struct Slots {
    links: [Option<SharedLink>; 3],
}

impl Slots {
    fn get(&self, slot: DeviceSlot) -> Option<&SharedLink> {
        self.links[slot.index()].as_ref()
    }
}

/// A controller that has its links but no threads yet.
pub struct Controller {
    slots: Arc<Slots>,
    queue: Arc<CommandQueue<Command>>,
    settings: RelaySettings,
}

impl Controller {
    pub fn new(
        monitor: Option<SharedLink>,
        actuator: Option<SharedLink>,
        gateway: Option<SharedLink>,
        settings: RelaySettings,
    ) -> Self {
        let mut links: [Option<SharedLink>; 3] = [None, None, None];
        links[DeviceSlot::Monitor.index()] = monitor;
        links[DeviceSlot::Actuator.index()] = actuator;
        links[DeviceSlot::Gateway.index()] = gateway;

        Self {
            slots: Arc::new(Slots { links }),
            queue: Arc::new(CommandQueue::new()),
            settings,
        }
    }

    /// Spawn the sender thread and a receiver thread per bound monitor and
    /// actuator slot, then drain the gateway preamble on this thread.
    ///
    /// Returns the handle used to drive the controller and the fault channel
    /// on which every receiver thread reports the error that ended it.
    pub fn start(self) -> (RelayHandle, Receiver<RelayError>) {
        let (fault_tx, fault_rx) = mpsc::channel();
        let mut threads = Vec::with_capacity(3);

        let queue = self.queue.clone();
        let slots = self.slots.clone();
        threads.push(thread::spawn(move || sender_loop(&queue, &slots)));

        for slot in [DeviceSlot::Monitor, DeviceSlot::Actuator] {
            if let Some(link) = self.slots.get(slot).cloned() {
                let queue = self.queue.clone();
                let faults = fault_tx.clone();
                let preamble_len = self.settings.preamble_len;
                threads.push(thread::spawn(move || {
                    receiver_thread(slot, link.as_ref(), &queue, preamble_len, &faults);
                }));
            }
        }

        if let Some(gateway) = self.slots.get(DeviceSlot::Gateway) {
            report_preamble(discard_preamble(
                DeviceSlot::Gateway,
                gateway.as_ref(),
                self.settings.preamble_len,
            ));
        }

        let handle = RelayHandle {
            slots: self.slots,
            queue: self.queue,
            settings: self.settings,
            _threads: threads,
        };
        (handle, fault_rx)
    }
}

/// Handle to a running controller. This is the surface the shell drives.
pub struct RelayHandle {
    slots: Arc<Slots>,
    queue: Arc<CommandQueue<Command>>,
    settings: RelaySettings,
    _threads: Vec<JoinHandle<()>>,
}

impl RelayHandle {
    /// Queue a command for the sender thread.
    pub fn offer(&self, command: Command) {
        self.queue.offer(command);
    }

    pub fn change_soil_moisture(&self, level: u32) {
        self.offer(Command::change_soil_moisture(level));
    }

    pub fn change_water_status(&self, has_water: bool) {
        self.offer(Command::change_water_status(has_water));
    }

    pub fn send_dry_soil_alert(&self) {
        self.offer(Command::dry_soil_alert());
    }

    pub fn send_wet_soil_alert(&self) {
        self.offer(Command::wet_soil_alert());
    }

    /// Commands queued but not yet taken by the sender thread.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_bound(&self, slot: DeviceSlot) -> bool {
        self.slots.get(slot).is_some()
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    fn gateway(&self) -> Result<&SharedLink, RelayError> {
        self.slots.get(DeviceSlot::Gateway).ok_or_else(|| {
            Advisory::UnboundSlot {
                slot: DeviceSlot::Gateway,
            }
            .into()
        })
    }

    /// Send one CoAP request carrying `moisture` and return the gateway's
    /// reply bytes.
    pub fn gateway_round_trip(&self, moisture: u32) -> Result<Vec<u8>, RelayError> {
        let gateway = self.gateway()?;
        let request = encode_moisture_request(moisture)?;
        let mut reply = vec![0u8; self.settings.gateway_reply_len];
        exchange(gateway.as_ref(), &request, &mut reply)?;
        Ok(reply)
    }

    /// One exchange with the configured moisture value, reply decoded as text.
    pub fn gateway_exchange_once(&self) -> Result<String, RelayError> {
        let reply = self.gateway_round_trip(self.settings.coap_moisture)?;
        Ok(reply_text(&reply))
    }

    /// Repeat the gateway exchange `trials` times, `delay` apart, timing each
    /// send-and-receive. The request is encoded once, outside the timed region.
    pub fn run_gateway_experiment(
        &self,
        trials: usize,
        delay: Duration,
    ) -> Result<Timings, RelayError> {
        let gateway = self.gateway()?;
        let request = encode_moisture_request(self.settings.coap_moisture)?;
        let mut reply = vec![0u8; self.settings.gateway_reply_len];

        info!(
            "Running the gateway experiment: {trials} trials, {} ms apart.",
            delay.as_millis()
        );
        measure(trials, delay, || {
            exchange(gateway.as_ref(), &request, &mut reply)
        })
    }
}

/// The gateway replies with NUL-padded text.
fn reply_text(reply: &[u8]) -> String {
    String::from_utf8_lossy(reply)
        .trim_end_matches('\0')
        .to_string()
}

fn exchange(link: &dyn DeviceLink, request: &[u8], reply: &mut [u8]) -> Result<(), RelayError> {
    link.send(request)
        .map_err(|source| RelayError::connection(DeviceSlot::Gateway, source))?;
    link.receive_exact(reply)
        .map_err(|source| RelayError::connection(DeviceSlot::Gateway, source))
}

/// Sender thread body. Never returns.
fn sender_loop(queue: &CommandQueue<Command>, slots: &Slots) {
    loop {
        let command = queue.poll();
        if let Err(err) = deliver(slots, &command) {
            warn!("{err}");
        }
    }
}

/// Write one command to its destination link.
fn deliver(slots: &Slots, command: &Command) -> Result<(), Advisory> {
    let slot = command.destination;
    let link = slots.get(slot).ok_or(Advisory::UnboundSlot { slot })?;
    link.send(&command.message.encode())
        .map_err(|source| Advisory::SendFailed { slot, source })
}

/// Receiver thread body: run the loop, log how it ended, report the fault.
fn receiver_thread(
    slot: DeviceSlot,
    link: &dyn DeviceLink,
    queue: &CommandQueue<Command>,
    preamble_len: usize,
    faults: &Sender<RelayError>,
) {
    let err = receive_loop(slot, link, queue, preamble_len);
    match err.severity() {
        Severity::Advisory => warn!("{err}"),
        Severity::Connection | Severity::Defect => error!("{err}"),
    }
    // Nobody listening is fine; the error has been logged.
    let _ = faults.send(err);
}

/// Read and dispatch messages from `link` until the connection fails or the
/// device sends something outside the protocol. Returns the terminal error.
fn receive_loop(
    slot: DeviceSlot,
    link: &dyn DeviceLink,
    queue: &CommandQueue<Command>,
    preamble_len: usize,
) -> RelayError {
    report_preamble(discard_preamble(slot, link, preamble_len));

    let mut buf = [0u8; WIRE_MESSAGE_SIZE];
    loop {
        if let Err(source) = link.receive_exact(&mut buf) {
            return RelayError::connection(slot, source);
        }

        match WireMessage::decode(&buf) {
            Ok(message) => {
                if let Some(command) = dispatch(slot, &message) {
                    queue.offer(command);
                }
            }
            Err(DecodeError::UnknownType { tag }) => {
                return Defect::UnknownMessageType { slot, tag }.into();
            }
            Err(source) => warn!("{}", Advisory::Rejected { slot, source }),
        }
    }
}

/// Decide what a decoded message from `source` turns into.
pub fn dispatch(source: DeviceSlot, message: &WireMessage) -> Option<Command> {
    match message.kind {
        MessageType::MonitorUserStack | MessageType::ActuatorUserStack => {
            info!(
                "{source} device reports that the shared user stack starts at {:#010x}.",
                message.data
            );
            None
        }
        MessageType::GatewayUserStack => {
            info!(
                "{source} device reports that a thread stack starts at {:#010x}.",
                message.data
            );
            None
        }
        MessageType::SoilDryAlert | MessageType::SoilWetAlert => {
            info!(
                "The controller has received a {} message from the {source} device.",
                message.kind
            );
            Some(Command::relay_to_actuator(*message))
        }
        MessageType::AckSoilWet => {
            info!(
                "The controller has received an {} message from the {source} device.",
                message.kind
            );
            Some(Command::relay_to_monitor(*message))
        }
        MessageType::RunOutOfWaterAlert => {
            info!(
                "The controller has received a {} message from the {source} device.",
                message.kind
            );
            None
        }
        MessageType::ChangeSoilMoisture | MessageType::ChangeWaterStatus => {
            warn!(
                "Ignoring a {} message from the {source} device; it only flows outbound.",
                message.kind
            );
            None
        }
    }
}

fn discard_preamble(slot: DeviceSlot, link: &dyn DeviceLink, len: usize) -> Result<(), Advisory> {
    if len == 0 {
        return Ok(());
    }
    info!("Receiving {len}-byte preamble from the {slot} device.");
    let mut preamble = vec![0u8; len];
    link.receive_exact(&mut preamble)
        .map_err(|source| Advisory::MissingPreamble { slot, source })?;
    info!("Received {len}-byte preamble from the {slot} device.");
    Ok(())
}

fn report_preamble(result: Result<(), Advisory>) {
    if let Err(err) = result {
        warn!("{err}");
        warn!("The controller may not function properly.");
    }
}
