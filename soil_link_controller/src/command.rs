// Outbound work items for the sender thread.
//
// A `Command` pairs a message with the device slot it must be written to.
// Receiver threads create relay commands; the shell creates the rest. Each
// command is consumed exactly once by the sender thread.

use soil_link_protocol::{DeviceSlot, WireMessage};

/// A message and the slot whose socket it goes out on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub message: WireMessage,
    pub destination: DeviceSlot,
}

impl Command {
    pub fn new(message: WireMessage, destination: DeviceSlot) -> Self {
        Self {
            message,
            destination,
        }
    }

    /// Tell the monitor to report a new moisture level.
    pub fn change_soil_moisture(level: u32) -> Self {
        Self::new(WireMessage::change_soil_moisture(level), DeviceSlot::Monitor)
    }

    /// Tell the actuator whether the water bottle is full.
    pub fn change_water_status(has_water: bool) -> Self {
        Self::new(WireMessage::change_water_status(has_water), DeviceSlot::Actuator)
    }

    pub fn relay_to_monitor(message: WireMessage) -> Self {
        Self::new(message, DeviceSlot::Monitor)
    }

    pub fn relay_to_actuator(message: WireMessage) -> Self {
        Self::new(message, DeviceSlot::Actuator)
    }

    pub fn dry_soil_alert() -> Self {
        Self::relay_to_actuator(WireMessage::soil_dry_alert())
    }

    pub fn wet_soil_alert() -> Self {
        Self::relay_to_actuator(WireMessage::soil_wet_alert())
    }
}
