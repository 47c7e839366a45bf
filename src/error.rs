//! Unified error types for sigmon.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Every kind is recoverable except `HardwareUnready`, and each one is
//! handled where it occurs: logged, then degraded rather than propagated
//! into the sampling loop.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A peripheral or the BLE stack could not be brought up at boot.
    /// Fatal: the pipeline does not start.
    HardwareUnready,

    /// An ADC reading could not be converted to millivolts.
    ConversionFailure,

    /// No subscribed peer, or the link refused the notification.
    TransportUnavailable,

    /// A peer wrote a payload we cannot interpret.
    MalformedInbound,

    /// Flash read/write/erase failed.
    Storage,

    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Failure of a single `AnalogSource::read_channel` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleError {
    /// The converter produced nothing for this channel.
    Read,
    /// A raw count was read but could not be scaled to millivolts.
    Conversion { raw: i32 },
}

/// Failure reported by the transport when sending a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The peer went away between the state check and the send.
    Disconnected,
    /// Raw stack error code (e.g. no TX buffers left, link congested).
    Raw(u32),
}

/// Why a `publish` call did not reach the peer. The data is dropped
/// in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    /// Not connected, or the peer has notifications turned off.
    NotDeliverable,
    /// The transport accepted the request but failed to send it.
    DeliveryFailed(TransportError),
    /// The serialized vector does not fit into one notification.
    PayloadTooLarge,
}

impl PublishError {
    /// `true` when trying again later could succeed without any peer action.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::DeliveryFailed(_))
    }
}

// Convenience conversions

impl From<SampleError> for Error {
    fn from(_: SampleError) -> Self {
        Error::ConversionFailure
    }
}

impl From<TransportError> for Error {
    fn from(_: TransportError) -> Self {
        Error::TransportUnavailable
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        match e {
            PublishError::PayloadTooLarge => Error::BufferOverflow,
            PublishError::NotDeliverable | PublishError::DeliveryFailed(_) => {
                Error::TransportUnavailable
            }
        }
    }
}
