//! Sequenced BLE advertising for controllers that run several advertising sets.
//!
//! Some controller firmware accepts only one "add an advertising set" request per dispatch
//! cycle and silently drops the rest. This crate activates sets one at a time, spaced out on a
//! single-threaded dispatch queue, and re-arms advertising when a connection goes away.
#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

use bt_hci::param::{AddrKind, BdAddr};

mod fmt;

mod codec;
mod cursor;

pub mod ad_structure;
pub mod config;
pub mod descriptor;
pub mod driver;
pub mod event;
pub mod indicator;
pub mod lifecycle;
pub mod manager;
pub mod payload;
pub mod queue;
pub mod reaction;
pub mod runner;
pub mod scheduler;

pub use codec::Error as CodecError;

/// Commonly used types.
pub mod prelude {
    pub use bt_hci::param::{AdvHandle, BdAddr, ConnHandle};
    pub use embassy_time::Duration;

    pub use crate::ad_structure::{AdStructure, BR_EDR_NOT_SUPPORTED, LE_GENERAL_DISCOVERABLE};
    pub use crate::descriptor::{AdvertisingParameters, AdvertisingSetDescriptor, Phy, SetKind};
    pub use crate::driver::{AdvertisingDriver, Feature};
    pub use crate::event::{ControllerEvent, EventStatus};
    pub use crate::indicator::{Indicator, PinIndicator};
    pub use crate::lifecycle::{legacy_handle, SetId, SetState};
    pub use crate::manager::{AdvertisingManager, Capabilities, ManagerState, SchedulerConfig};
    pub use crate::payload::{Payload, PayloadBuilder, MAX_PAYLOAD_LEN};
    pub use crate::queue::{DispatchQueue, Job, TaskQueue};
    pub use crate::runner::{EventChannel, Runner};
    pub use crate::scheduler::ActivationSpacing;
    pub use crate::{Address, AdvertisingError, Error};
}

/// A BLE address.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub kind: AddrKind,
    pub addr: BdAddr,
}

impl Address {
    /// A random device address.
    pub fn random(val: [u8; 6]) -> Self {
        Self {
            kind: AddrKind::RANDOM,
            addr: BdAddr::new(val),
        }
    }

    /// A public device address.
    pub fn public(val: [u8; 6]) -> Self {
        Self {
            kind: AddrKind::PUBLIC,
            addr: BdAddr::new(val),
        }
    }
}

/// Errors returned by the advertising stack.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The controller refused to create an extended set, or the set limit is reached.
    CreateRejected,
    /// The controller refused the advertising parameters.
    ConfigurationRejected,
    /// The encoded payload exceeds [`payload::MAX_PAYLOAD_LEN`].
    PayloadTooLarge,
    /// The controller refused the payload.
    PayloadRejected,
    /// The controller refused to start advertising.
    StartRejected,
    /// The controller refused to stop advertising.
    StopRejected,
    /// The controller failed to initialize. Nothing can advertise.
    InitializationFailed,
    /// The controller lacks a capability the operation depends on.
    FeatureUnsupported,
    /// The operation is not valid in the current state.
    InvalidState,
    /// A value is out of range or inconsistent.
    InvalidValue,
    /// A fixed capacity buffer is full.
    InsufficientSpace,
    /// No such advertising set.
    NotFound,
}

impl From<codec::Error> for Error {
    fn from(error: codec::Error) -> Self {
        match error {
            codec::Error::InsufficientSpace => Error::InsufficientSpace,
            codec::Error::InvalidValue => Error::InvalidValue,
        }
    }
}

/// Errors that carry either a controller driver error or an advertising stack error.
#[derive(Debug)]
pub enum AdvertisingError<E> {
    Controller(E),
    Advertising(Error),
}

impl<E> From<Error> for AdvertisingError<E> {
    fn from(value: Error) -> Self {
        Self::Advertising(value)
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for AdvertisingError<E>
where
    E: defmt::Format,
{
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            AdvertisingError::Controller(value) => {
                defmt::write!(fmt, "Controller({})", value)
            }
            AdvertisingError::Advertising(value) => {
                defmt::write!(fmt, "Advertising({})", value)
            }
        }
    }
}
