//! Reaction to controller events.
//!
//! Tracks which peers are connected and decides what each event means for the advertising
//! sets. The caller carries out the returned [`Reaction`].
use bt_hci::param::{AdvHandle, ConnHandle};

use crate::config::MAX_ADVERTISING_SETS;
use crate::event::{ControllerEvent, EventStatus};
use crate::indicator::Indicator;

/// What the owner of the advertising sets has to do after an event.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Nothing, the event was informational.
    None,
    /// Controller initialization finished.
    InitComplete(EventStatus),
    /// The set behind `handle` no longer advertises.
    SetEnded { handle: AdvHandle, connected: bool },
    /// The connection went away, advertising should resume.
    Restart,
}

/// At most one peer per connectable set.
const MAX_CONNECTIONS: usize = MAX_ADVERTISING_SETS;

pub struct EventReaction<I> {
    indicator: I,
    connections: heapless::Vec<ConnHandle, MAX_CONNECTIONS>,
}

impl<I: Indicator> EventReaction<I> {
    pub fn new(mut indicator: I) -> Self {
        indicator.set_connected(false);
        Self {
            indicator,
            connections: heapless::Vec::new(),
        }
    }

    /// Whether at least one peer is connected.
    pub fn connection_active(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn connections(&self) -> &[ConnHandle] {
        &self.connections
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn handle(&mut self, event: &ControllerEvent) -> Reaction {
        match *event {
            ControllerEvent::InitComplete(status) => Reaction::InitComplete(status),
            ControllerEvent::AdvertisingStart { handle } => {
                debug!("[event] advertising started on handle {:?}", handle);
                Reaction::None
            }
            ControllerEvent::AdvertisingEnd { handle, connected } => {
                if connected {
                    debug!("[event] advertising on handle {:?} ended by connection", handle);
                } else {
                    info!("[event] advertising on handle {:?} ended", handle);
                }
                Reaction::SetEnded { handle, connected }
            }
            ControllerEvent::ScanRequestReceived { handle, peer } => {
                debug!("[event] scan request on handle {:?} from {:?}", handle, peer.addr);
                Reaction::None
            }
            ControllerEvent::ConnectionComplete { status, conn, peer } => {
                if status.is_success() {
                    info!("[event] connected {:?} to {:?}", conn, peer.addr);
                    let first = self.connections.is_empty();
                    if !self.connections.contains(&conn) && self.connections.push(conn).is_err() {
                        warn!("[event] too many connections, not tracking {:?}", conn);
                    }
                    if first {
                        self.indicator.set_connected(true);
                    }
                } else {
                    warn!("[event] connection to {:?} failed: {:?}", peer.addr, status);
                }
                Reaction::None
            }
            ControllerEvent::DisconnectionComplete { conn, reason } => {
                info!("[event] disconnected {:?}, reason {:02x}", conn, reason);
                if let Some(idx) = self.connections.iter().position(|c| *c == conn) {
                    self.connections.swap_remove(idx);
                }
                if self.connections.is_empty() {
                    self.indicator.set_connected(false);
                }
                Reaction::Restart
            }
            ControllerEvent::PhyUpdateComplete {
                status,
                conn,
                tx_phy,
                rx_phy,
            }
            | ControllerEvent::ReadPhy {
                status,
                conn,
                tx_phy,
                rx_phy,
            } => {
                if status.is_success() {
                    info!("[event] {:?} phy tx {:?} rx {:?}", conn, tx_phy, rx_phy);
                } else {
                    warn!("[event] {:?} phy query failed: {:?}", conn, status);
                }
                Reaction::None
            }
            ControllerEvent::DataLengthChange {
                conn,
                max_tx_octets,
                max_rx_octets,
            } => {
                info!(
                    "[event] {:?} data length tx {} rx {}",
                    conn, max_tx_octets, max_rx_octets
                );
                Reaction::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Phy;
    use crate::Address;

    #[derive(Default)]
    struct Led {
        on: bool,
        changes: usize,
    }

    impl Indicator for &mut Led {
        fn set_connected(&mut self, connected: bool) {
            self.on = connected;
            self.changes += 1;
        }
    }

    fn peer() -> Address {
        Address::random([0xff, 0x8f, 0x1a, 0x05, 0xe4, 0xff])
    }

    #[test]
    fn connection_drives_indicator() {
        let mut led = Led::default();
        {
            let mut r = EventReaction::new(&mut led);
            assert!(!r.connection_active());

            let reaction = r.handle(&ControllerEvent::ConnectionComplete {
                status: EventStatus::Success,
                conn: ConnHandle::new(1),
                peer: peer(),
            });
            assert_eq!(reaction, Reaction::None);
            assert!(r.connection_active());
            assert!(r.indicator().on);

            let reaction = r.handle(&ControllerEvent::DisconnectionComplete {
                conn: ConnHandle::new(1),
                reason: 0x13,
            });
            assert_eq!(reaction, Reaction::Restart);
            assert!(!r.connection_active());
        }
        assert!(!led.on);
        assert_eq!(led.changes, 3);
    }

    #[test]
    fn indicator_stays_on_while_any_peer_is_connected() {
        let mut led = Led::default();
        let mut r = EventReaction::new(&mut led);
        for conn in [1, 2] {
            r.handle(&ControllerEvent::ConnectionComplete {
                status: EventStatus::Success,
                conn: ConnHandle::new(conn),
                peer: peer(),
            });
        }
        assert_eq!(r.connections().len(), 2);

        let reaction = r.handle(&ControllerEvent::DisconnectionComplete {
            conn: ConnHandle::new(1),
            reason: 0x13,
        });
        assert_eq!(reaction, Reaction::Restart);
        assert!(r.connection_active());
        assert!(r.indicator().on);

        r.handle(&ControllerEvent::DisconnectionComplete {
            conn: ConnHandle::new(2),
            reason: 0x13,
        });
        assert!(!r.connection_active());
        assert!(!r.indicator().on);
        // Off at start, on once, off once.
        assert_eq!(r.indicator().changes, 3);
    }

    #[test]
    fn failed_connection_keeps_state() {
        let mut led = Led::default();
        let mut r = EventReaction::new(&mut led);
        r.handle(&ControllerEvent::ConnectionComplete {
            status: EventStatus::from_u8(0x3e),
            conn: ConnHandle::new(1),
            peer: peer(),
        });
        assert!(!r.connection_active());
    }

    #[test]
    fn advertising_end_is_reported() {
        let mut r = EventReaction::new(());
        let handle = AdvHandle::new(2);
        assert_eq!(
            r.handle(&ControllerEvent::AdvertisingEnd {
                handle,
                connected: false
            }),
            Reaction::SetEnded {
                handle,
                connected: false
            }
        );
    }

    #[test]
    fn telemetry_changes_nothing() {
        let mut r = EventReaction::new(());
        let conn = ConnHandle::new(4);
        let events = [
            ControllerEvent::AdvertisingStart { handle: AdvHandle::new(0) },
            ControllerEvent::ScanRequestReceived {
                handle: AdvHandle::new(0),
                peer: peer(),
            },
            ControllerEvent::PhyUpdateComplete {
                status: EventStatus::Success,
                conn,
                tx_phy: Phy::Le2M,
                rx_phy: Phy::Le2M,
            },
            ControllerEvent::ReadPhy {
                status: EventStatus::Success,
                conn,
                tx_phy: Phy::LeCoded,
                rx_phy: Phy::Le1M,
            },
            ControllerEvent::DataLengthChange {
                conn,
                max_tx_octets: 251,
                max_rx_octets: 251,
            },
        ];
        for event in events.iter() {
            assert_eq!(r.handle(event), Reaction::None);
        }
        assert!(!r.connection_active());
    }
}
