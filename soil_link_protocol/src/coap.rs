// CoAP request encoder for the gateway round trip.
//
// The gateway device translates one CoAP request into an HTTP request and
// sends the HTTP text back. The controller only ever sends one shape of
// request: a non-confirmable POST to `coap://localhost:10086/moisture` whose
// payload is a 4-byte moisture reading. This module builds that datagram and
// nothing else; it is not a general CoAP message builder.
//
// Layout (32 bytes):
//
//   0      ver=1 | type=NON | tkl=0        (0x50)
//   1      code POST                       (0x02)
//   2..4   message id 0x4657, big-endian
//   4..14  Uri-Host  "localhost"           (delta 3, len 9)
//   14..17 Uri-Port  10086, big-endian     (delta 4, len 2)
//   17..27 Uri-Path  "/moisture"           (delta 4, len 9)
//   27     payload marker                  (0xFF)
//   28..32 moisture, native byte order
//
// Options use the single-byte delta/length form only, so both nibbles must be
// below 13. `encode_moisture_request` checks that and the final size; either
// failing is a bug in this file, reported as `CoapError` so the caller can
// escalate it.

use thiserror::Error;

/// Size in bytes of the encoded request.
pub const COAP_REQUEST_SIZE: usize = 32;

/// The first two bytes of every request: version/type/token length, then code.
pub const COAP_HEADER_SENTINEL: [u8; 2] = [0x50, 0x02];

const COAP_VERSION: u8 = 1;
const TYPE_NON_CONFIRMABLE: u8 = 1;
const CODE_POST: u8 = 0x02;
const MESSAGE_ID: u16 = 0x4657;
const PAYLOAD_MARKER: u8 = 0xFF;

const OPTION_URI_HOST: u16 = 3;
const OPTION_URI_PORT: u16 = 7;
const OPTION_URI_PATH: u16 = 11;

/// Largest delta or length expressible in a single nibble.
const MAX_NIBBLE: u16 = 12;

pub const GATEWAY_HOST: &str = "localhost";
pub const GATEWAY_PORT: u16 = 10086;
pub const GATEWAY_PATH: &str = "/moisture";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoapError {
    #[error("option {number} needs the extended delta/length form (delta {delta}, length {len})")]
    ExtendedOption { number: u16, delta: u16, len: usize },
    #[error("option {number} is out of order after option {previous}")]
    OptionOrder { number: u16, previous: u16 },
    #[error("request encoded to {actual} bytes, expected 32")]
    Size { actual: usize },
}

/// Accumulates options in ascending option-number order.
struct RequestWriter {
    buf: Vec<u8>,
    last_option: u16,
}

impl RequestWriter {
    fn new() -> Self {
        let mut buf = Vec::with_capacity(COAP_REQUEST_SIZE);
        buf.push((COAP_VERSION << 6) | (TYPE_NON_CONFIRMABLE << 4));
        buf.push(CODE_POST);
        buf.extend_from_slice(&MESSAGE_ID.to_be_bytes());
        Self {
            buf,
            last_option: 0,
        }
    }

    fn option(&mut self, number: u16, value: &[u8]) -> Result<(), CoapError> {
        let delta = number
            .checked_sub(self.last_option)
            .ok_or(CoapError::OptionOrder {
                number,
                previous: self.last_option,
            })?;
        let len = value.len();
        let nibble_len = u16::try_from(len).unwrap_or(u16::MAX);
        if delta > MAX_NIBBLE || nibble_len > MAX_NIBBLE {
            return Err(CoapError::ExtendedOption { number, delta, len });
        }

        // Both values fit in four bits after the check above.
        self.buf.push(((delta as u8) << 4) | nibble_len as u8);
        self.buf.extend_from_slice(value);
        self.last_option = number;
        Ok(())
    }

    fn payload(mut self, payload: &[u8]) -> Vec<u8> {
        self.buf.push(PAYLOAD_MARKER);
        self.buf.extend_from_slice(payload);
        self.buf
    }
}

/// Build the POST request carrying `moisture` to the gateway.
pub fn encode_moisture_request(moisture: u32) -> Result<[u8; COAP_REQUEST_SIZE], CoapError> {
    let mut writer = RequestWriter::new();
    writer.option(OPTION_URI_HOST, GATEWAY_HOST.as_bytes())?;
    writer.option(OPTION_URI_PORT, &GATEWAY_PORT.to_be_bytes())?;
    writer.option(OPTION_URI_PATH, GATEWAY_PATH.as_bytes())?;
    let buf = writer.payload(&moisture.to_ne_bytes());

    let actual = buf.len();
    buf.try_into().map_err(|_| CoapError::Size { actual })
}
