// Three-tier error taxonomy for the relay.
//
// - `Defect`: the controller or a device is running a different protocol
//   version, or an encoder broke its own size invariant. Nothing downstream
//   can be trusted; the outermost caller (the binary) aborts the process.
// - `Connection`: a device socket failed. Only the thread that owns the read
//   side of that socket stops; everything else keeps running.
// - `Advisory`: logged and forgotten. The message involved is dropped, never
//   retried or requeued.
//
// Threads never unwind across each other with these. Each thread logs its
// own failures; receiver threads additionally hand their terminal error to
// the fault channel returned by `Controller::start`.

use std::io;

use soil_link_protocol::{CoapError, DecodeError, DeviceSlot};
use thiserror::Error;

/// How bad a `RelayError` is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Defect,
    Connection,
    Advisory,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("defect: {0}")]
    Defect(#[from] Defect),
    #[error("connection to the {slot} device failed: {source}")]
    Connection {
        slot: DeviceSlot,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Advisory(#[from] Advisory),
}

impl RelayError {
    pub fn severity(&self) -> Severity {
        match self {
            RelayError::Defect(_) => Severity::Defect,
            RelayError::Connection { .. } => Severity::Connection,
            RelayError::Advisory(_) => Severity::Advisory,
        }
    }

    pub fn is_defect(&self) -> bool {
        self.severity() == Severity::Defect
    }

    pub(crate) fn connection(slot: DeviceSlot, source: io::Error) -> Self {
        RelayError::Connection { slot, source }
    }
}

#[derive(Debug, Error)]
pub enum Defect {
    #[error("the {slot} device sent unrecognized message type {tag}")]
    UnknownMessageType { slot: DeviceSlot, tag: u16 },
    #[error("CoAP request encoding failed: {0}")]
    CoapEncoding(#[from] CoapError),
}

#[derive(Debug, Error)]
pub enum Advisory {
    #[error("failed to send the message to the {slot} device: {source}")]
    SendFailed {
        slot: DeviceSlot,
        #[source]
        source: io::Error,
    },
    #[error("failed to receive the preamble from the {slot} device: {source}")]
    MissingPreamble {
        slot: DeviceSlot,
        #[source]
        source: io::Error,
    },
    #[error("the {slot} device is not connected")]
    UnboundSlot { slot: DeviceSlot },
    #[error("received an invalid message from the {slot} device: {source}")]
    Rejected {
        slot: DeviceSlot,
        #[source]
        source: DecodeError,
    },
}

impl From<CoapError> for RelayError {
    fn from(err: CoapError) -> Self {
        RelayError::Defect(Defect::CoapEncoding(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_variant() {
        let defect: RelayError = Defect::UnknownMessageType {
            slot: DeviceSlot::Monitor,
            tag: 77,
        }
        .into();
        assert!(defect.is_defect());

        let connection = RelayError::connection(
            DeviceSlot::Actuator,
            io::Error::from(io::ErrorKind::UnexpectedEof),
        );
        assert_eq!(connection.severity(), Severity::Connection);

        let advisory: RelayError = Advisory::UnboundSlot {
            slot: DeviceSlot::Gateway,
        }
        .into();
        assert_eq!(advisory.severity(), Severity::Advisory);
    }

    #[test]
    fn coap_errors_are_defects() {
        let err: RelayError = CoapError::Size { actual: 31 }.into();
        assert!(err.is_defect());
        assert!(err.to_string().contains("31 bytes"));
    }

    #[test]
    fn messages_name_the_device() {
        let err: RelayError = Advisory::UnboundSlot {
            slot: DeviceSlot::Gateway,
        }
        .into();
        assert_eq!(err.to_string(), "the Gateway device is not connected");
    }
}
