//! Per-set lifecycle: create, configure, set payload, start.
//!
//! Each step runs only if the previous one succeeded. A failing step moves the set to
//! [`SetState::Failed`] and leaves every other set alone.
use bt_hci::param::AdvHandle;

use crate::descriptor::AdvertisingSetDescriptor;
use crate::driver::AdvertisingDriver;
use crate::payload::Payload;
use crate::Error;

/// Handle of the set the controller reserves for legacy advertising.
///
/// Valid from power-on, it is never created or removed.
pub fn legacy_handle() -> AdvHandle {
    AdvHandle::new(0)
}

/// Index of a set within an [`AdvertisingManager`](crate::manager::AdvertisingManager).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SetId(pub(crate) usize);

impl SetId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetState {
    Uninitialized,
    Created,
    ParametersSet,
    PayloadSet,
    Advertising,
    Stopped,
    /// A step failed. The set takes no further part in advertising.
    Failed(Error),
    /// The controller lacks a capability the set needs.
    Skipped,
}

impl SetState {
    /// Failed and skipped sets refuse every operation.
    pub fn is_dead(&self) -> bool {
        matches!(self, SetState::Failed(_) | SetState::Skipped)
    }
}

/// Lifecycle step, used to label failures.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Configure,
    SetPayload,
    Start,
    Stop,
    Remove,
}

impl Step {
    fn error(self) -> Error {
        match self {
            Step::Create => Error::CreateRejected,
            Step::Configure => Error::ConfigurationRejected,
            Step::SetPayload => Error::PayloadRejected,
            Step::Start => Error::StartRejected,
            Step::Stop | Step::Remove => Error::StopRejected,
        }
    }
}

/// One advertising set and the controller handle it owns.
pub struct AdvertisingSet<'d> {
    id: SetId,
    descriptor: AdvertisingSetDescriptor<'d>,
    payload: Payload,
    handle: Option<AdvHandle>,
    state: SetState,
    activated: bool,
    last_error: Option<Error>,
}

impl<'d> AdvertisingSet<'d> {
    pub fn new(id: SetId, descriptor: AdvertisingSetDescriptor<'d>, payload: Payload) -> Self {
        let handle = descriptor.is_legacy().then(legacy_handle);
        Self {
            id,
            descriptor,
            payload,
            handle,
            state: SetState::Uninitialized,
            activated: false,
            last_error: None,
        }
    }

    pub fn id(&self) -> SetId {
        self.id
    }

    pub fn descriptor(&self) -> &AdvertisingSetDescriptor<'d> {
        &self.descriptor
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Controller handle. Always set for the legacy set, set for extended sets between
    /// creation and teardown.
    pub fn handle(&self) -> Option<AdvHandle> {
        self.handle
    }

    pub fn state(&self) -> SetState {
        self.state
    }

    /// Whether the set reached [`SetState::Advertising`] at least once.
    pub fn was_activated(&self) -> bool {
        self.activated
    }

    /// The most recent error, including restart failures that don't fail the set.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Allocate the controller handle for an extended set.
    ///
    /// `created` is the number of extended sets created so far and `max_sets` the controller
    /// limit, legacy set included.
    pub fn create<D: AdvertisingDriver>(&mut self, driver: &mut D, created: u8, max_sets: u8) -> Result<(), Error> {
        self.expect_state(SetState::Uninitialized)?;
        if self.descriptor.is_legacy() {
            return Err(Error::InvalidState);
        }
        if created >= max_sets.saturating_sub(1) {
            warn!(
                "[adv] set {}: create rejected, {} of {} extended sets in use",
                self.id.0,
                created,
                max_sets.saturating_sub(1)
            );
            return Err(self.fail(Step::Create));
        }
        match driver.create_advertising_set(&self.descriptor.parameters()) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = SetState::Created;
                Ok(())
            }
            Err(e) => Err(self.driver_failure(Step::Create, e)),
        }
    }

    pub fn configure<D: AdvertisingDriver>(&mut self, driver: &mut D) -> Result<(), Error> {
        if self.descriptor.is_legacy() {
            self.expect_state(SetState::Uninitialized)?;
        } else {
            self.expect_state(SetState::Created)?;
        }
        let handle = self.current_handle()?;
        match driver.set_advertising_parameters(handle, &self.descriptor.parameters()) {
            Ok(()) => {
                self.state = SetState::ParametersSet;
                Ok(())
            }
            Err(e) => Err(self.driver_failure(Step::Configure, e)),
        }
    }

    pub fn set_payload<D: AdvertisingDriver>(&mut self, driver: &mut D) -> Result<(), Error> {
        self.expect_state(SetState::ParametersSet)?;
        let handle = self.current_handle()?;
        match driver.set_advertising_payload(handle, &self.payload) {
            Ok(()) => {
                self.state = SetState::PayloadSet;
                Ok(())
            }
            Err(e) => Err(self.driver_failure(Step::SetPayload, e)),
        }
    }

    pub fn start<D: AdvertisingDriver>(&mut self, driver: &mut D) -> Result<(), Error> {
        self.expect_state(SetState::PayloadSet)?;
        let handle = self.current_handle()?;
        match self.enable(driver, handle) {
            Ok(()) => {
                self.activated = true;
                Ok(())
            }
            Err(e) => Err(self.driver_failure(Step::Start, e)),
        }
    }

    /// Run every step from the current state up to [`SetState::Advertising`].
    ///
    /// The legacy set has no create step.
    pub fn activate<D: AdvertisingDriver>(&mut self, driver: &mut D, created: u8, max_sets: u8) -> Result<(), Error> {
        if self.state.is_dead() {
            debug!("[adv] set {} is {:?}, not activating", self.id.0, self.state);
            return Err(Error::InvalidState);
        }
        if !self.descriptor.is_legacy() && self.state == SetState::Uninitialized {
            self.create(driver, created, max_sets)?;
        }
        if matches!(self.state, SetState::Uninitialized | SetState::Created) {
            self.configure(driver)?;
        }
        if self.state == SetState::ParametersSet {
            self.set_payload(driver)?;
        }
        self.start(driver)?;
        info!("[adv] set {} advertising", self.id.0);
        Ok(())
    }

    /// Stop advertising. Stopping a set that isn't advertising does nothing.
    pub fn stop<D: AdvertisingDriver>(&mut self, driver: &mut D) -> Result<(), Error> {
        if self.state.is_dead() {
            return Err(Error::InvalidState);
        }
        if self.state != SetState::Advertising {
            return Ok(());
        }
        let handle = self.current_handle()?;
        match driver.stop_advertising(handle) {
            Ok(()) => {
                self.state = SetState::Stopped;
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                let e = defmt::Debug2Format(&e);
                warn!("[adv] set {}: stop failed: {:?}", self.id.0, e);
                self.last_error = Some(Error::StopRejected);
                Err(Error::StopRejected)
            }
        }
    }

    /// Start advertising again on an already configured set.
    ///
    /// Only the start step is repeated. A failure is recorded in [`AdvertisingSet::last_error`]
    /// and leaves the set stopped rather than failed, so a later restart may succeed.
    pub fn restart<D: AdvertisingDriver>(&mut self, driver: &mut D) -> Result<(), Error> {
        if !matches!(self.state, SetState::Stopped | SetState::Advertising) {
            return Err(Error::InvalidState);
        }
        let handle = self.current_handle()?;
        match self.enable(driver, handle) {
            Ok(()) => {
                info!("[adv] set {} advertising again", self.id.0);
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                let e = defmt::Debug2Format(&e);
                warn!("[adv] set {}: restart failed: {:?}", self.id.0, e);
                self.state = SetState::Stopped;
                self.last_error = Some(Error::StartRejected);
                Err(Error::StartRejected)
            }
        }
    }

    /// The controller ended advertising on its own.
    pub fn mark_ended(&mut self) {
        if self.state == SetState::Advertising {
            self.state = SetState::Stopped;
        }
    }

    pub fn mark_skipped(&mut self) {
        if self.state == SetState::Uninitialized {
            self.state = SetState::Skipped;
        }
    }

    /// Record a failure that happened outside the lifecycle steps, e.g. when the activation
    /// could not be queued.
    pub fn mark_failed(&mut self, error: Error) {
        self.state = SetState::Failed(error);
        self.last_error = Some(error);
    }

    /// Stop advertising and release the controller handle of an extended set.
    ///
    /// Driver failures are logged and teardown continues. The set ends up stopped, unless it had
    /// failed or been skipped before.
    pub fn teardown<D: AdvertisingDriver>(&mut self, driver: &mut D) {
        if self.state == SetState::Advertising {
            if let Some(handle) = self.handle {
                if let Err(e) = driver.stop_advertising(handle) {
                    self.log_driver_error(Step::Stop, e);
                }
            }
        }
        if !self.descriptor.is_legacy() {
            if let Some(handle) = self.handle.take() {
                if let Err(e) = driver.remove_advertising_set(handle) {
                    self.log_driver_error(Step::Remove, e);
                }
            }
        }
        if !self.state.is_dead() {
            self.state = SetState::Stopped;
        }
    }

    fn enable<D: AdvertisingDriver>(&mut self, driver: &mut D, handle: AdvHandle) -> Result<(), D::Error> {
        driver.start_advertising(handle, self.descriptor.timeout, self.descriptor.max_events)?;
        self.state = SetState::Advertising;
        Ok(())
    }

    fn expect_state(&self, expected: SetState) -> Result<(), Error> {
        if self.state != expected {
            debug!(
                "[adv] set {}: expected state {:?}, was {:?}",
                self.id.0, expected, self.state
            );
            return Err(Error::InvalidState);
        }
        Ok(())
    }

    fn current_handle(&self) -> Result<AdvHandle, Error> {
        self.handle.ok_or(Error::InvalidState)
    }

    fn fail(&mut self, step: Step) -> Error {
        let error = step.error();
        self.state = SetState::Failed(error);
        self.last_error = Some(error);
        error
    }

    fn driver_failure<E: crate::driver::Error>(&mut self, step: Step, e: E) -> Error {
        self.log_driver_error(step, e);
        self.fail(step)
    }

    fn log_driver_error<E: crate::driver::Error>(&self, step: Step, e: E) {
        #[cfg(feature = "defmt")]
        let e = defmt::Debug2Format(&e);
        warn!("[adv] set {}: {:?} failed: {:?}", self.id.0, step, e);
    }
}
