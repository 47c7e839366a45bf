//! Telemetry link state machine - gates RMS notifications to the peer.
//!
//! ```text
//!                on_connect              on_subscribe
//! Disconnected ─────────────▶ NotifyOff ──────────────▶ NotifyOn
//!      ▲                         ▲   ◀──────────────       │
//!      │                         │     on_unsubscribe      │
//!      └──────── on_disconnect ──┴─────────────────────────┘
//! ```
//!
//! Transport callbacks run outside the monitor loop, so the firmware does
//! not call into [`Telemetry`] from them. They queue a [`LinkEvent`] and
//! the monitor loop dispatches it, which keeps the loop the only mutator.
//!
//! The subscription level is not queued with the other events. It is
//! latest-value-wins state, applied by [`sync_link`] after every queued
//! event, so a flood of peer writes can never drop a subscribe.
//!
//! Publishing is fire-and-forget: a vector that cannot be delivered right
//! now is dropped, never queued or retried.

mod inbound;

pub use inbound::{InboundCommand, InboundHandler, InboundMessage};

use crate::config::{MAX_INBOUND_LEN, MAX_NOTIFY_LEN};
use crate::error::{PublishError, TransportError};
use crate::rms::RmsVector;

/// Link state as seen by `publish`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    ConnectedNotifyOff,
    ConnectedNotifyOn,
}

/// The transport side of the notify/read characteristic.
pub trait TelemetrySink<C> {
    /// Replace the value returned to peer reads.
    fn store(&mut self, payload: &[u8]);

    /// Send one notification on `conn`. Must not block.
    fn notify(&mut self, conn: &C, payload: &[u8]) -> Result<(), TransportError>;
}

/// Transport events, one method per kind.
pub trait LinkCallbacks<C> {
    fn on_connected(&mut self, conn: C);
    fn on_disconnected(&mut self);
    fn on_notify_changed(&mut self, enabled: bool);
    fn on_data_rx(&mut self, data: &[u8]);
}

/// A transport event queued for the monitor loop.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent<C> {
    Connected(C),
    Disconnected,
    NotifyChanged(bool),
    DataRx(InboundMessage),
}

impl<C> LinkEvent<C> {
    /// Hand the event to its callback.
    pub fn dispatch<T: LinkCallbacks<C> + ?Sized>(self, target: &mut T) {
        match self {
            LinkEvent::Connected(conn) => target.on_connected(conn),
            LinkEvent::Disconnected => target.on_disconnected(),
            LinkEvent::NotifyChanged(enabled) => target.on_notify_changed(enabled),
            LinkEvent::DataRx(msg) => target.on_data_rx(msg.as_bytes()),
        }
    }
}

/// Apply queued link events in order, then the latest subscription level.
///
/// Connection events are queued before the link can deliver a CCCD write,
/// so draining the queue first guarantees `subscribed` lands on the link
/// it was written on.
pub fn sync_link<C, T, I>(target: &mut T, queued: I, subscribed: Option<bool>)
where
    T: LinkCallbacks<C> + ?Sized,
    I: IntoIterator<Item = LinkEvent<C>>,
{
    for event in queued {
        event.dispatch(target);
    }
    if let Some(enabled) = subscribed {
        target.on_notify_changed(enabled);
    }
}

/// Connection slot, notify flag and inbound handler for one peer.
pub struct Telemetry<C, H> {
    conn: Option<C>,
    notify_enabled: bool,
    inbound: H,
}

impl<C, H: InboundHandler> Telemetry<C, H> {
    pub const fn new(inbound: H) -> Self {
        Self {
            conn: None,
            notify_enabled: false,
            inbound,
        }
    }

    pub fn state(&self) -> LinkState {
        match (&self.conn, self.notify_enabled) {
            (None, _) => LinkState::Disconnected,
            (Some(_), false) => LinkState::ConnectedNotifyOff,
            (Some(_), true) => LinkState::ConnectedNotifyOn,
        }
    }

    /// Current connection handle, if any.
    pub fn connection(&self) -> Option<&C> {
        self.conn.as_ref()
    }

    /// Update the read value with the latest snapshot. Allowed in every state.
    pub fn stage<const S: usize, const N: usize>(
        &self,
        vector: &RmsVector<S, N>,
        sink: &mut impl TelemetrySink<C>,
    ) -> Result<(), PublishError> {
        let mut buf = [0u8; MAX_NOTIFY_LEN];
        let len = encode(vector, &mut buf)?;
        sink.store(&buf[..len]);
        Ok(())
    }

    /// Notify the peer with `vector` if it is subscribed.
    ///
    /// Returns immediately. On any error the vector is dropped and the
    /// telemetry state is left untouched.
    pub fn publish<const S: usize, const N: usize>(
        &self,
        vector: &RmsVector<S, N>,
        sink: &mut impl TelemetrySink<C>,
    ) -> Result<(), PublishError> {
        let conn = match (&self.conn, self.notify_enabled) {
            (Some(conn), true) => conn,
            _ => {
                debug!("Telemetry: publish dropped, {:?}", self.state());
                return Err(PublishError::NotDeliverable);
            }
        };

        let mut buf = [0u8; MAX_NOTIFY_LEN];
        let len = encode(vector, &mut buf)?;
        sink.notify(conn, &buf[..len]).map_err(|e| {
            warn!("Telemetry: notify failed ({:?}), dropping vector", e);
            PublishError::DeliveryFailed(e)
        })
    }

    /// Forward a peer write to the inbound handler. Oversize payloads are
    /// malformed and forwarded as empty; nothing is rejected.
    pub fn write_inbound(&mut self, data: &[u8]) {
        let data = if data.len() > MAX_INBOUND_LEN {
            warn!("Telemetry: malformed inbound ({} bytes), forwarding as empty", data.len());
            &[][..]
        } else {
            data
        };
        debug!("Telemetry: inbound {} bytes", data.len());
        self.inbound.on_message(data);
    }
}

impl<C, H: InboundHandler> LinkCallbacks<C> for Telemetry<C, H> {
    fn on_connected(&mut self, conn: C) {
        if self.conn.is_some() {
            warn!("Telemetry: new connection replaces existing handle");
        }
        info!("Telemetry: connected");
        self.conn = Some(conn);
        self.notify_enabled = false;
    }

    fn on_disconnected(&mut self) {
        info!("Telemetry: disconnected");
        self.conn = None;
        self.notify_enabled = false;
    }

    fn on_notify_changed(&mut self, enabled: bool) {
        if self.conn.is_none() {
            warn!("Telemetry: notify change while disconnected, ignored");
            return;
        }
        info!(
            "Telemetry: notifications {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.notify_enabled = enabled;
    }

    fn on_data_rx(&mut self, data: &[u8]) {
        self.write_inbound(data);
    }
}

fn encode<const S: usize, const N: usize>(
    vector: &RmsVector<S, N>,
    buf: &mut [u8; MAX_NOTIFY_LEN],
) -> Result<usize, PublishError> {
    match vector.serialize(buf) {
        0 if !vector.is_empty() => {
            error!("Telemetry: {} values do not fit a notification", vector.len());
            Err(PublishError::PayloadTooLarge)
        }
        len => Ok(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct RecordingSink {
        stored: Vec<u8, 64>,
        notified: Vec<(u8, Vec<u8, 64>), 8>,
        fail_with: Option<TransportError>,
    }

    impl TelemetrySink<u8> for RecordingSink {
        fn store(&mut self, payload: &[u8]) {
            self.stored = Vec::from_slice(payload).unwrap();
        }

        fn notify(&mut self, conn: &u8, payload: &[u8]) -> Result<(), TransportError> {
            if let Some(e) = self.fail_with {
                return Err(e);
            }
            self.notified
                .push((*conn, Vec::from_slice(payload).unwrap()))
                .unwrap();
            Ok(())
        }
    }

    fn ignore(_: &[u8]) {}

    fn telemetry() -> Telemetry<u8, fn(&[u8])> {
        Telemetry::new(ignore as fn(&[u8]))
    }

    fn vector() -> RmsVector<2, 2> {
        RmsVector::from_channels([[1, 2], [3, 0x0400]])
    }

    #[test]
    fn transitions_follow_link_events() {
        let mut t = telemetry();
        assert_eq!(t.state(), LinkState::Disconnected);
        t.on_connected(7);
        assert_eq!(t.state(), LinkState::ConnectedNotifyOff);
        t.on_notify_changed(true);
        assert_eq!(t.state(), LinkState::ConnectedNotifyOn);
        t.on_notify_changed(false);
        assert_eq!(t.state(), LinkState::ConnectedNotifyOff);
        t.on_notify_changed(true);
        t.on_disconnected();
        assert_eq!(t.state(), LinkState::Disconnected);
        assert_eq!(t.connection(), None);
    }

    #[test]
    fn subscribe_while_disconnected_is_ignored() {
        let mut t = telemetry();
        t.on_notify_changed(true);
        assert_eq!(t.state(), LinkState::Disconnected);
        t.on_connected(1);
        assert_eq!(t.state(), LinkState::ConnectedNotifyOff);
    }

    #[test]
    fn publish_only_when_subscribed() {
        let mut t = telemetry();
        let mut sink = RecordingSink::default();

        assert_eq!(t.publish(&vector(), &mut sink), Err(PublishError::NotDeliverable));
        t.on_connected(3);
        assert_eq!(t.publish(&vector(), &mut sink), Err(PublishError::NotDeliverable));
        assert!(sink.notified.is_empty());

        t.on_notify_changed(true);
        assert_eq!(t.publish(&vector(), &mut sink), Ok(()));
        assert_eq!(sink.notified.len(), 1);
        assert_eq!(sink.notified[0].0, 3);
        assert_eq!(sink.notified[0].1.as_slice(), &[1, 0, 2, 0, 3, 0, 0x00, 0x04]);
    }

    #[test]
    fn failed_publish_leaves_state_unchanged() {
        let mut t = telemetry();
        let mut sink = RecordingSink::default();
        t.on_connected(1);
        let before = t.state();
        let _ = t.publish(&vector(), &mut sink);
        assert_eq!(t.state(), before);
        assert_eq!(t.connection(), Some(&1));
    }

    #[test]
    fn transport_failure_is_transient_and_dropped() {
        let mut t = telemetry();
        let mut sink = RecordingSink {
            fail_with: Some(TransportError::Raw(0x13)),
            ..Default::default()
        };
        t.on_connected(1);
        t.on_notify_changed(true);

        let err = t.publish(&vector(), &mut sink).unwrap_err();
        assert_eq!(err, PublishError::DeliveryFailed(TransportError::Raw(0x13)));
        assert!(err.is_transient());
        assert_eq!(t.state(), LinkState::ConnectedNotifyOn);

        sink.fail_with = None;
        assert_eq!(t.publish(&vector(), &mut sink), Ok(()));
        assert_eq!(sink.notified.len(), 1);
    }

    #[test]
    fn stage_updates_read_value_in_any_state() {
        let t = telemetry();
        let mut sink = RecordingSink::default();
        t.stage(&vector(), &mut sink).unwrap();
        assert_eq!(sink.stored.as_slice(), &[1, 0, 2, 0, 3, 0, 0x00, 0x04]);
    }

    #[test]
    fn reconnect_replaces_handle_and_clears_subscription() {
        let mut t = telemetry();
        t.on_connected(1);
        t.on_notify_changed(true);
        t.on_connected(2);
        assert_eq!(t.connection(), Some(&2));
        assert_eq!(t.state(), LinkState::ConnectedNotifyOff);
    }

    #[test]
    fn oversize_vector_is_rejected() {
        let mut t = telemetry();
        let mut sink = RecordingSink::default();
        t.on_connected(1);
        t.on_notify_changed(true);
        let huge: RmsVector<200, 1> = RmsVector::zeroed();
        assert_eq!(t.publish(&huge, &mut sink), Err(PublishError::PayloadTooLarge));
        assert_eq!(t.stage(&huge, &mut sink), Err(PublishError::PayloadTooLarge));
    }

    #[test]
    fn inbound_forwarded_verbatim_or_as_empty() {
        let mut lens: Vec<usize, 4> = Vec::new();
        {
            let mut t: Telemetry<u8, _> = Telemetry::new(|data: &[u8]| {
                lens.push(data.len()).unwrap();
            });
            t.write_inbound(b"ping");
            t.write_inbound(&[]);
            t.write_inbound(&[0u8; MAX_INBOUND_LEN + 5]);
            LinkEvent::DataRx(InboundMessage::from_bytes(b"ok")).dispatch(&mut t);
        }
        assert_eq!(lens.as_slice(), &[4, 0, 0, 2]);
    }

    #[test]
    fn subscription_survives_a_flood_of_writes() {
        let mut t = telemetry();
        let mut queued: Vec<LinkEvent<u8>, 16> = Vec::new();
        queued.push(LinkEvent::Connected(5)).unwrap();
        for _ in 0..12 {
            queued
                .push(LinkEvent::DataRx(InboundMessage::from_bytes(b"12345678")))
                .unwrap();
        }

        sync_link(&mut t, queued, Some(true));
        assert_eq!(t.state(), LinkState::ConnectedNotifyOn);
        assert_eq!(t.connection(), Some(&5));

        // latest level wins, with or without queued events
        sync_link(&mut t, core::iter::empty(), Some(false));
        assert_eq!(t.state(), LinkState::ConnectedNotifyOff);
        sync_link(&mut t, core::iter::empty(), None);
        assert_eq!(t.state(), LinkState::ConnectedNotifyOff);
    }

    #[test]
    fn stale_subscription_after_disconnect_is_ignored() {
        let mut t = telemetry();
        t.on_connected(1);
        sync_link(&mut t, [LinkEvent::Disconnected], Some(true));
        assert_eq!(t.state(), LinkState::Disconnected);
    }

    #[test]
    fn dispatch_routes_each_event() {
        let mut t = telemetry();
        LinkEvent::Connected(9).dispatch(&mut t);
        LinkEvent::NotifyChanged(true).dispatch(&mut t);
        assert_eq!(t.state(), LinkState::ConnectedNotifyOn);
        LinkEvent::<u8>::Disconnected.dispatch(&mut t);
        assert_eq!(t.state(), LinkState::Disconnected);
    }
}
