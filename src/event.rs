//! Events pushed by the controller.
use bt_hci::param::{AdvHandle, ConnHandle};

use crate::descriptor::Phy;
use crate::Address;

/// Outcome reported by an event, with the raw HCI status code on failure.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Success,
    Failed(u8),
}

impl EventStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => EventStatus::Success,
            code => EventStatus::Failed(code),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EventStatus::Success)
    }
}

/// Everything the controller can tell the advertising stack.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Initialization requested through [`AdvertisingDriver::init`](crate::driver::AdvertisingDriver::init) finished.
    InitComplete(EventStatus),
    AdvertisingStart {
        handle: AdvHandle,
    },
    /// A set stopped advertising, either because a peer connected to it or because its
    /// timeout or event budget ran out.
    AdvertisingEnd {
        handle: AdvHandle,
        connected: bool,
    },
    ScanRequestReceived {
        handle: AdvHandle,
        peer: Address,
    },
    ConnectionComplete {
        status: EventStatus,
        conn: ConnHandle,
        peer: Address,
    },
    DisconnectionComplete {
        conn: ConnHandle,
        reason: u8,
    },
    PhyUpdateComplete {
        status: EventStatus,
        conn: ConnHandle,
        tx_phy: Phy,
        rx_phy: Phy,
    },
    ReadPhy {
        status: EventStatus,
        conn: ConnHandle,
        tx_phy: Phy,
        rx_phy: Phy,
    },
    DataLengthChange {
        conn: ConnHandle,
        max_tx_octets: u16,
        max_rx_octets: u16,
    },
}
