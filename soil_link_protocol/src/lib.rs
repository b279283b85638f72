// soil_link_protocol: wire formats spoken between the controller and the
// emulated soil-moisture devices.
//
// This crate defines the fixed 8-byte device message, the device identities,
// and the one CoAP request the controller sends to the gateway. It has no
// networking code; `soil_link_controller` owns the sockets and threads.
//
// Module overview:
// - `types.rs`:    `DeviceSlot`, the closed set of device identities.
// - `message.rs`:  `WireMessage` / `MessageType` with explicit little-endian
//                  encode/decode and magic-sentinel validation.
// - `coap.rs`:     Fixed-shape CoAP POST encoder for the gateway round trip.
//
// Design decisions:
// - **Explicit byte layout.** Messages are encoded field by field instead of
//   reinterpreting memory, so width and byte order are visible in one place.
// - **Closed type set.** An unknown tag is a decode error, never a silently
//   ignored message; the controller decides how severe that is.

pub mod coap;
pub mod message;
pub mod types;

pub use coap::{COAP_HEADER_SENTINEL, COAP_REQUEST_SIZE, CoapError, encode_moisture_request};
pub use message::{DecodeError, MESSAGE_MAGIC, MessageType, WIRE_MESSAGE_SIZE, WireMessage};
pub use types::DeviceSlot;

#[cfg(test)]
mod tests {
    use super::*;

    /// A message relayed by the controller is byte-for-byte what it received.
    #[test]
    fn relayed_alert_is_byte_identical() {
        let from_monitor = WireMessage::soil_dry_alert().encode();
        let decoded = WireMessage::decode(&from_monitor).unwrap();
        assert_eq!(decoded.kind, MessageType::SoilDryAlert);
        assert_eq!(decoded.encode(), from_monitor);
    }

    #[test]
    fn coap_request_does_not_look_like_a_device_message() {
        let request = encode_moisture_request(30).unwrap();
        let head = &request[..WIRE_MESSAGE_SIZE];
        assert!(matches!(
            WireMessage::decode(head),
            Err(DecodeError::BadMagic { .. })
        ));
    }
}
