// Fixed-layout binary messages exchanged with the emulated devices.
//
// Every message on every device socket has the same 8-byte layout, in both
// directions:
//
//   offset 0  u16  magic  (always `MESSAGE_MAGIC`, little-endian)
//   offset 2  u16  type   (`MessageType` tag, little-endian)
//   offset 4  u32  data   (payload, meaning depends on the type)
//
// There is no length prefix: the size is known to both ends. `decode`
// rejects a buffer whose magic is wrong without interpreting the type field,
// and reports a tag outside the closed `MessageType` set as `UnknownType`.
// The type set is versioned together with the device firmware, so an unknown
// tag means the two sides disagree about the protocol; the controller treats
// that as a defect, not as something to skip.
//
// Each semantic event has its own factory (`soil_dry_alert`,
// `change_water_status`, ...) so callers never assemble raw tags.

use std::fmt;

use thiserror::Error;

use crate::types::DeviceSlot;

/// Sentinel carried in the first two bytes of every message ("FW").
pub const MESSAGE_MAGIC: u16 = 0x4657;

/// Size in bytes of one encoded message.
pub const WIRE_MESSAGE_SIZE: usize = 8;

/// Message type tags. The numeric values are the wire tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    SoilDryAlert = 0,
    SoilWetAlert = 1,
    AckSoilWet = 2,
    RunOutOfWaterAlert = 3,
    /// Controller → monitor: payload is the new moisture level.
    ChangeSoilMoisture = 4,
    /// Controller → actuator: payload is 1 if the bottle has water, else 0.
    ChangeWaterStatus = 5,
    /// Payload is the base address of the monitor's shared user stack.
    MonitorUserStack = 6,
    /// Payload is the base address of the actuator's shared user stack.
    ActuatorUserStack = 7,
    /// Payload is the base address of one of the gateway's thread stacks.
    GatewayUserStack = 8,
}

impl MessageType {
    /// Look up a wire tag. Returns `None` for tags outside the closed set.
    pub fn from_tag(tag: u16) -> Option<Self> {
        let kind = match tag {
            0 => MessageType::SoilDryAlert,
            1 => MessageType::SoilWetAlert,
            2 => MessageType::AckSoilWet,
            3 => MessageType::RunOutOfWaterAlert,
            4 => MessageType::ChangeSoilMoisture,
            5 => MessageType::ChangeWaterStatus,
            6 => MessageType::MonitorUserStack,
            7 => MessageType::ActuatorUserStack,
            8 => MessageType::GatewayUserStack,
            _ => return None,
        };
        Some(kind)
    }

    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::SoilDryAlert => "Soil Dry Alert",
            MessageType::SoilWetAlert => "Soil Wet Alert",
            MessageType::AckSoilWet => "Ack Soil Wet",
            MessageType::RunOutOfWaterAlert => "Run Out Of Water Alert",
            MessageType::ChangeSoilMoisture => "Change Soil Moisture",
            MessageType::ChangeWaterStatus => "Change Water Status",
            MessageType::MonitorUserStack => "Monitor User Stack",
            MessageType::ActuatorUserStack => "Actuator User Stack",
            MessageType::GatewayUserStack => "Gateway User Stack",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a received buffer could not be turned into a `WireMessage`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected an 8-byte message, got {len} bytes")]
    Length { len: usize },
    #[error("magic mismatched: {magic:#06x}")]
    BadMagic { magic: u16 },
    #[error("unknown message type {tag}")]
    UnknownType { tag: u16 },
}

/// A decoded message. The magic is implied: every `WireMessage` encodes with
/// `MESSAGE_MAGIC`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireMessage {
    pub kind: MessageType,
    pub data: u32,
}

impl WireMessage {
    fn new(kind: MessageType, data: u32) -> Self {
        Self { kind, data }
    }

    pub fn soil_dry_alert() -> Self {
        Self::new(MessageType::SoilDryAlert, 0)
    }

    pub fn soil_wet_alert() -> Self {
        Self::new(MessageType::SoilWetAlert, 0)
    }

    pub fn ack_soil_wet() -> Self {
        Self::new(MessageType::AckSoilWet, 0)
    }

    pub fn run_out_of_water_alert() -> Self {
        Self::new(MessageType::RunOutOfWaterAlert, 0)
    }

    pub fn change_soil_moisture(level: u32) -> Self {
        Self::new(MessageType::ChangeSoilMoisture, level)
    }

    /// The flag is widened to the full 4-byte payload (0 or 1).
    pub fn change_water_status(has_water: bool) -> Self {
        Self::new(MessageType::ChangeWaterStatus, u32::from(has_water))
    }

    /// Stack report as sent by the device in `slot`.
    pub fn user_stack(slot: DeviceSlot, address: u32) -> Self {
        let kind = match slot {
            DeviceSlot::Monitor => MessageType::MonitorUserStack,
            DeviceSlot::Actuator => MessageType::ActuatorUserStack,
            DeviceSlot::Gateway => MessageType::GatewayUserStack,
        };
        Self::new(kind, address)
    }

    pub fn encode(&self) -> [u8; WIRE_MESSAGE_SIZE] {
        let mut buf = [0u8; WIRE_MESSAGE_SIZE];
        buf[0..2].copy_from_slice(&MESSAGE_MAGIC.to_le_bytes());
        buf[2..4].copy_from_slice(&self.kind.tag().to_le_bytes());
        buf[4..8].copy_from_slice(&self.data.to_le_bytes());
        buf
    }

    /// Decode exactly one message. The magic is checked before the type, so a
    /// foreign buffer is never mistaken for a known message.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let buf: &[u8; WIRE_MESSAGE_SIZE] = bytes
            .try_into()
            .map_err(|_| DecodeError::Length { len: bytes.len() })?;

        let magic = u16::from_le_bytes([buf[0], buf[1]]);
        if magic != MESSAGE_MAGIC {
            return Err(DecodeError::BadMagic { magic });
        }

        let tag = u16::from_le_bytes([buf[2], buf[3]]);
        let kind = MessageType::from_tag(tag).ok_or(DecodeError::UnknownType { tag })?;
        let data = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);

        Ok(Self { kind, data })
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.kind, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(magic: u16, tag: u16, data: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WIRE_MESSAGE_SIZE);
        buf.extend_from_slice(&magic.to_le_bytes());
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&data.to_le_bytes());
        buf
    }

    #[test]
    fn every_known_tag_survives_decode_then_encode() {
        for tag in 0..=8u16 {
            let bytes = raw(MESSAGE_MAGIC, tag, 0xDEAD_BEEF);
            let msg = WireMessage::decode(&bytes).unwrap();
            assert_eq!(msg.kind.tag(), tag);
            assert_eq!(msg.encode().to_vec(), bytes);
        }
    }

    #[test]
    fn layout_is_little_endian() {
        let bytes = WireMessage::change_soil_moisture(0x0102_0304).encode();
        assert_eq!(bytes, [0x57, 0x46, 0x04, 0x00, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn water_status_is_widened() {
        assert_eq!(WireMessage::change_water_status(true).data, 1);
        assert_eq!(WireMessage::change_water_status(false).data, 0);
        let bytes = WireMessage::change_water_status(true).encode();
        assert_eq!(&bytes[4..], &[1, 0, 0, 0]);
    }

    #[test]
    fn bad_magic_is_rejected_before_type() {
        // Tag 0 would be a valid SoilDryAlert if the magic were right.
        let bytes = raw(0x5746, 0, 0);
        assert_eq!(
            WireMessage::decode(&bytes),
            Err(DecodeError::BadMagic { magic: 0x5746 })
        );

        // Unknown tag with bad magic still reports the magic.
        let bytes = raw(0, 0xFFFF, 0);
        assert_eq!(WireMessage::decode(&bytes), Err(DecodeError::BadMagic { magic: 0 }));
    }

    #[test]
    fn unknown_tag_with_valid_magic() {
        let bytes = raw(MESSAGE_MAGIC, 9, 0);
        assert_eq!(WireMessage::decode(&bytes), Err(DecodeError::UnknownType { tag: 9 }));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(WireMessage::decode(&[0x57, 0x46]), Err(DecodeError::Length { len: 2 }));
        assert_eq!(
            WireMessage::decode(&[0u8; WIRE_MESSAGE_SIZE + 1]),
            Err(DecodeError::Length { len: 9 })
        );
    }

    #[test]
    fn user_stack_matches_slot() {
        assert_eq!(
            WireMessage::user_stack(DeviceSlot::Monitor, 7).kind,
            MessageType::MonitorUserStack
        );
        assert_eq!(
            WireMessage::user_stack(DeviceSlot::Gateway, 7).kind,
            MessageType::GatewayUserStack
        );
    }

    #[test]
    fn alert_factories_carry_no_payload() {
        for msg in [
            WireMessage::soil_dry_alert(),
            WireMessage::soil_wet_alert(),
            WireMessage::ack_soil_wet(),
            WireMessage::run_out_of_water_alert(),
        ] {
            assert_eq!(msg.data, 0);
            assert_eq!(&msg.encode()[0..2], &MESSAGE_MAGIC.to_le_bytes());
        }
    }
}
