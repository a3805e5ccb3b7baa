//! Interface to the controller driver.
//!
//! The driver owns the radio. Calls return as soon as the controller has accepted or refused a
//! request; outcomes that take longer come back later as [`ControllerEvent`](crate::event::ControllerEvent)s.
use bt_hci::param::AdvHandle;
pub use embedded_io_async::ErrorKind;

use crate::descriptor::{AdvertisingParameters, Phy};

///
/// This trait allows generic code to do limited inspecting of errors,
/// to react differently to different kinds.
pub trait Error: core::fmt::Debug {
    /// Get the kind of this error.
    fn kind(&self) -> ErrorKind;
}

impl Error for core::convert::Infallible {
    fn kind(&self) -> ErrorKind {
        match *self {}
    }
}

impl Error for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

/// Optional controller capabilities.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Extended advertising, and with it more than one advertising set.
    ExtendedAdvertising,
    Le2MPhy,
    LeCodedPhy,
}

/// Advertising operations of a BLE controller.
pub trait AdvertisingDriver {
    type Error: Error;

    /// Start controller initialization.
    ///
    /// Completion is reported with [`ControllerEvent::InitComplete`](crate::event::ControllerEvent::InitComplete).
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Number of advertising sets the controller supports, the legacy set included.
    fn max_advertising_sets(&self) -> u8;

    fn is_feature_supported(&self, feature: Feature) -> bool;

    /// Allocate a new extended advertising set.
    fn create_advertising_set(&mut self, params: &AdvertisingParameters) -> Result<AdvHandle, Self::Error>;

    fn set_advertising_parameters(
        &mut self,
        handle: AdvHandle,
        params: &AdvertisingParameters,
    ) -> Result<(), Self::Error>;

    fn set_advertising_payload(&mut self, handle: AdvHandle, payload: &[u8]) -> Result<(), Self::Error>;

    /// Enable advertising on a configured set.
    ///
    /// `timeout` and `max_events` bound how long the set advertises, `None` means no bound.
    fn start_advertising(
        &mut self,
        handle: AdvHandle,
        timeout: Option<embassy_time::Duration>,
        max_events: Option<u8>,
    ) -> Result<(), Self::Error>;

    fn stop_advertising(&mut self, handle: AdvHandle) -> Result<(), Self::Error>;

    /// Release an extended advertising set.
    fn remove_advertising_set(&mut self, handle: AdvHandle) -> Result<(), Self::Error>;

    /// Set the PHYs preferred for new connections.
    fn set_preferred_phys(&mut self, tx: Phy, rx: Phy) -> Result<(), Self::Error>;
}
