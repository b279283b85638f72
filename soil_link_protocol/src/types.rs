// Device identities shared by the wire protocol and the controller.
//
// The controller talks to at most three devices, each over its own stream
// socket. `DeviceSlot` names them and doubles as the index into the
// controller's fixed slot table (see `soil_link_controller::controller`).
// The set is closed: adding a device means bumping the protocol, not just
// appending a variant.

use std::fmt;

/// One of the three fixed device identities a connection may be bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceSlot {
    /// The soil-moisture monitor.
    Monitor = 0,
    /// The water actuator.
    Actuator = 1,
    /// The CoAP-to-HTTP gateway.
    Gateway = 2,
}

impl DeviceSlot {
    /// Every slot, in index order.
    pub const ALL: [DeviceSlot; 3] = [
        DeviceSlot::Monitor,
        DeviceSlot::Actuator,
        DeviceSlot::Gateway,
    ];

    /// Position of this slot in a slot table.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceSlot::Monitor => "Monitor",
            DeviceSlot::Actuator => "Actuator",
            DeviceSlot::Gateway => "Gateway",
        }
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_declaration_order() {
        for (i, slot) in DeviceSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn display_uses_device_name() {
        assert_eq!(DeviceSlot::Actuator.to_string(), "Actuator");
        assert_eq!(format!("{}", DeviceSlot::Gateway), "Gateway");
    }
}
