//! Advertising set configuration.
use bt_hci::param::{AdvChannelMap, AdvEventProps, PhyKind};
use embassy_time::Duration;

use crate::Error;

/// Shortest advertising interval a controller accepts (0x0020 units).
pub const MIN_INTERVAL: Duration = Duration::from_micros(20_000);
/// Longest legacy advertising interval (0x4000 units).
pub const MAX_LEGACY_INTERVAL: Duration = Duration::from_micros(10_240_000);
/// Longest extended advertising interval (0xFFFFFF units).
pub const MAX_EXTENDED_INTERVAL: Duration = Duration::from_micros(0xFF_FFFF * 625);

/// Length of one controller interval unit, in microseconds.
const INTERVAL_UNIT_US: u64 = 625;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// The pre-allocated set behind [`legacy_handle`](crate::lifecycle::legacy_handle).
    Legacy,
    /// A set created on demand through the driver.
    Extended,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phy {
    Le1M,
    Le2M,
    /// Coded PHY, lower throughput for longer range.
    LeCoded,
}

impl From<Phy> for PhyKind {
    fn from(phy: Phy) -> Self {
        match phy {
            Phy::Le1M => PhyKind::Le1M,
            Phy::Le2M => PhyKind::Le2M,
            Phy::LeCoded => PhyKind::LeCoded,
        }
    }
}

/// Configuration of one advertising set.
///
/// A descriptor is copied into the manager when the set is added and never changes after that.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingSetDescriptor<'d> {
    pub kind: SetKind,
    /// Connectable undirected when set, non-connectable undirected otherwise.
    pub connectable: bool,

    /// Advertising interval
    pub interval_min: Duration,
    pub interval_max: Duration,

    pub primary_phy: Phy,
    pub secondary_phy: Phy,

    /// Requested TX power. The driver rejects values the radio can't do.
    pub tx_power_dbm: i8,
    /// Include the TX power in the extended advertising header.
    pub include_tx_power_in_header: bool,
    /// Advertise the TX power level as part of the payload.
    pub advertise_tx_power: bool,
    pub scan_request_notification: bool,

    /// Timeout duration
    pub timeout: Option<Duration>,
    pub max_events: Option<u8>,

    pub name: &'d str,
}

impl Default for AdvertisingSetDescriptor<'_> {
    fn default() -> Self {
        Self {
            kind: SetKind::Legacy,
            connectable: true,
            interval_min: Duration::from_millis(250),
            interval_max: Duration::from_millis(250),
            primary_phy: Phy::Le1M,
            secondary_phy: Phy::Le1M,
            tx_power_dbm: 0,
            include_tx_power_in_header: false,
            advertise_tx_power: false,
            scan_request_notification: false,
            timeout: None,
            max_events: None,
            name: "",
        }
    }
}

impl<'d> AdvertisingSetDescriptor<'d> {
    pub fn legacy(name: &'d str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn extended(name: &'d str) -> Self {
        Self {
            kind: SetKind::Extended,
            connectable: false,
            name,
            ..Default::default()
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.kind == SetKind::Legacy
    }

    /// TX power value for the payload, if it should carry one.
    pub fn payload_tx_power(&self) -> Option<i8> {
        self.advertise_tx_power.then_some(self.tx_power_dbm)
    }

    /// Check the interval bounds and the PHY choice.
    pub fn validate(&self) -> Result<(), Error> {
        let max = match self.kind {
            SetKind::Legacy => MAX_LEGACY_INTERVAL,
            SetKind::Extended => MAX_EXTENDED_INTERVAL,
        };
        if self.interval_min < MIN_INTERVAL || self.interval_min > self.interval_max || self.interval_max > max {
            warn!(
                "[adv] invalid interval {:?}..{:?} for {:?} set",
                self.interval_min, self.interval_max, self.kind
            );
            return Err(Error::InvalidValue);
        }
        // Legacy PDUs only go out on the 1M PHY.
        if self.is_legacy() && self.primary_phy != Phy::Le1M {
            warn!("[adv] legacy set cannot use primary phy {:?}", self.primary_phy);
            return Err(Error::InvalidValue);
        }
        Ok(())
    }

    /// Interval bounds in controller units of 0.625 ms.
    pub fn interval_units(&self) -> (u32, u32) {
        (to_units(self.interval_min), to_units(self.interval_max))
    }

    /// Controller parameters for this set.
    pub fn parameters(&self) -> AdvertisingParameters {
        let legacy = self.is_legacy();
        // Extended connectable PDUs can't also be scannable.
        let scannable = legacy && (self.connectable || self.scan_request_notification);
        AdvertisingParameters {
            props: AdvEventProps::new()
                .set_connectable_adv(self.connectable)
                .set_scannable_adv(scannable)
                .set_anonymous_adv(false)
                .set_legacy_adv(legacy),
            interval_min: self.interval_min,
            interval_max: self.interval_max,
            channel_map: AdvChannelMap::ALL,
            primary_phy: self.primary_phy,
            secondary_phy: self.secondary_phy,
            tx_power: self.tx_power_dbm,
            include_tx_power: self.include_tx_power_in_header,
            scan_request_notification: self.scan_request_notification,
            timeout: self.timeout,
            max_events: self.max_events,
        }
    }
}

fn to_units(d: Duration) -> u32 {
    (d.as_micros() / INTERVAL_UNIT_US) as u32
}

/// Parameters handed to the driver when configuring a set.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct AdvertisingParameters {
    pub props: AdvEventProps,
    pub interval_min: Duration,
    pub interval_max: Duration,
    pub channel_map: AdvChannelMap,
    pub primary_phy: Phy,
    pub secondary_phy: Phy,
    pub tx_power: i8,
    pub include_tx_power: bool,
    pub scan_request_notification: bool,
    pub timeout: Option<Duration>,
    pub max_events: Option<u8>,
}

impl AdvertisingParameters {
    /// Interval bounds in controller units of 0.625 ms.
    pub fn interval_units(&self) -> (u32, u32) {
        (to_units(self.interval_min), to_units(self.interval_max))
    }
}
