//! Peer-originated messages from the write-without-response characteristic.

use crate::config::MAX_INBOUND_LEN;
use crate::supervisor::ModeEvent;
use heapless::Vec;

/// A bounded inbound payload. Anything that does not fit is malformed
/// and becomes an empty message instead of an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InboundMessage {
    bytes: Vec<u8, MAX_INBOUND_LEN>,
}

impl InboundMessage {
    pub fn from_bytes(data: &[u8]) -> Self {
        match Vec::from_slice(data) {
            Ok(bytes) => Self { bytes },
            Err(()) => {
                warn!(
                    "Inbound: {} bytes exceeds limit of {}, treating as empty",
                    data.len(),
                    MAX_INBOUND_LEN
                );
                Self::default()
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Something that consumes inbound payloads.
pub trait InboundHandler {
    fn on_message(&mut self, data: &[u8]);
}

impl<F: FnMut(&[u8])> InboundHandler for F {
    fn on_message(&mut self, data: &[u8]) {
        self(data)
    }
}

/// Commands a peer may send as a single ASCII byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboundCommand {
    /// `+` - publish more often.
    Faster,
    /// `-` - publish less often.
    Slower,
}

impl InboundCommand {
    /// Recognise a command; anything else (including empty) is `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match data {
            b"+" => Some(InboundCommand::Faster),
            b"-" => Some(InboundCommand::Slower),
            _ => None,
        }
    }

    pub fn mode_event(self) -> ModeEvent {
        match self {
            InboundCommand::Faster => ModeEvent::CadenceUp,
            InboundCommand::Slower => ModeEvent::CadenceDown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_keeps_bytes_within_limit() {
        let msg = InboundMessage::from_bytes(b"hello");
        assert_eq!(msg.as_bytes(), b"hello");

        let full = [0xAAu8; MAX_INBOUND_LEN];
        assert_eq!(InboundMessage::from_bytes(&full).as_bytes(), &full);
    }

    #[test]
    fn oversize_message_becomes_empty() {
        let big = [1u8; MAX_INBOUND_LEN + 1];
        assert!(InboundMessage::from_bytes(&big).is_empty());
        assert!(InboundMessage::from_bytes(&[]).is_empty());
    }

    #[test]
    fn largest_stack_write_is_malformed_not_rejected() {
        use crate::config::MAX_STACK_WRITE_LEN;
        let write = [0x55u8; MAX_STACK_WRITE_LEN];
        let msg = InboundMessage::from_bytes(&write);
        assert!(msg.is_empty());
        assert_eq!(msg, InboundMessage::default());
    }

    #[test]
    fn closures_are_handlers() {
        let mut seen = 0usize;
        let mut handler = |data: &[u8]| seen += data.len();
        handler.on_message(b"abc");
        handler.on_message(b"");
        assert_eq!(seen, 3);
    }

    #[test]
    fn commands_parse_single_bytes_only() {
        assert_eq!(InboundCommand::parse(b"+"), Some(InboundCommand::Faster));
        assert_eq!(InboundCommand::parse(b"-"), Some(InboundCommand::Slower));
        assert_eq!(InboundCommand::parse(b"++"), None);
        assert_eq!(InboundCommand::parse(b""), None);
        assert_eq!(InboundCommand::parse(&[0xFF]), None);
        assert_eq!(InboundCommand::Faster.mode_event(), ModeEvent::CadenceUp);
        assert_eq!(InboundCommand::Slower.mode_event(), ModeEvent::CadenceDown);
    }
}
