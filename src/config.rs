//! Compile-time configuration.
//!
//! `trouble-advertiser` has some configuration settings that are set at compile time.
//!
//! They are set via environment variables at build time: set the variable named
//! `TROUBLE_ADVERTISER_<value>`. For example `TROUBLE_ADVERTISER_ACTIVATION_SPACING_MS=750 cargo build`.
//! You can also set them in the `[env]` section of `.cargo/config.toml`.
//!
//! Runtime settings that a caller may want to change per instance live in
//! [`SchedulerConfig`](crate::manager::SchedulerConfig), which takes its defaults from here.

mod raw {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// Minimum spacing between two advertising set activations, in milliseconds.
///
/// The controller only ingests one "add a set" request per dispatch cycle. Activations
/// issued closer together than this are silently dropped by some firmware.
///
/// Default: 500.
pub const ACTIVATION_SPACING_MS: u64 = raw::ACTIVATION_SPACING_MS as u64;

const _: () = assert!(ACTIVATION_SPACING_MS > 0, "activation spacing must be non-zero");

/// Number of advertising sets a manager can hold, legacy set included.
///
/// Default: 4.
pub const MAX_ADVERTISING_SETS: usize = raw::MAX_ADVERTISING_SETS;

/// Capacity of the dispatch queue used by the runner.
///
/// Must hold every pending activation plus any controller events waiting to be dispatched.
///
/// Default: 16.
pub const DISPATCH_QUEUE_SIZE: usize = raw::DISPATCH_QUEUE_SIZE;

/// Capacity of the channel carrying controller events into the runner.
///
/// Default: 8.
pub const EVENT_CHANNEL_SIZE: usize = raw::EVENT_CHANNEL_SIZE;
