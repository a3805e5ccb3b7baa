//! AdvertisingManager
//!
//! The manager owns the controller driver and every advertising set. It is the only place where
//! queued jobs touch the driver.
use embassy_time::Instant;

use crate::ad_structure::{BR_EDR_NOT_SUPPORTED, LE_GENERAL_DISCOVERABLE};
use crate::descriptor::{AdvertisingSetDescriptor, Phy, SetKind};
use crate::driver::{AdvertisingDriver, Feature};
use crate::event::{ControllerEvent, EventStatus};
use crate::indicator::Indicator;
use crate::lifecycle::{AdvertisingSet, SetId, SetState};
use crate::payload::PayloadBuilder;
use crate::queue::{Job, TaskQueue};
use crate::reaction::{EventReaction, Reaction};
use crate::scheduler::{ActivationSpacing, AdvertisingScheduler, Outcome};
use crate::{AdvertisingError, Error};

/// Runtime settings of an [`AdvertisingManager`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub spacing: ActivationSpacing,
    /// Flags field put in every payload. 0 leaves the field out.
    pub flags: u8,
    /// PHYs requested for connections, as (tx, rx). Applied once the controller is up, if it
    /// supports both.
    pub preferred_phys: Option<(Phy, Phy)>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            spacing: ActivationSpacing::default(),
            flags: LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED,
            preferred_phys: None,
        }
    }
}

/// Controller capabilities, read once after initialization.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Advertising sets the controller can run, legacy set included.
    pub max_sets: u8,
    pub extended: bool,
    pub le_2m: bool,
    pub le_coded: bool,
}

impl Capabilities {
    fn read<D: AdvertisingDriver>(driver: &D) -> Self {
        Self {
            max_sets: driver.max_advertising_sets(),
            extended: driver.is_feature_supported(Feature::ExtendedAdvertising),
            le_2m: driver.is_feature_supported(Feature::Le2MPhy),
            le_coded: driver.is_feature_supported(Feature::LeCodedPhy),
        }
    }

    pub fn supports(&self, phy: Phy) -> bool {
        match phy {
            Phy::Le1M => true,
            Phy::Le2M => self.le_2m,
            Phy::LeCoded => self.le_coded,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Sets can be added.
    Idle,
    /// Waiting for the controller to finish initialization.
    Initializing,
    Running,
    /// The controller failed to initialize. Every job is ignored.
    Halted,
    /// Every set was torn down.
    ShutDown,
}

/// Owner of the driver, the advertising sets and the event state machine.
pub struct AdvertisingManager<'d, D, I, const SETS: usize> {
    driver: D,
    config: SchedulerConfig,
    reaction: EventReaction<I>,
    scheduler: AdvertisingScheduler<SETS>,
    sets: heapless::Vec<AdvertisingSet<'d>, SETS>,
    payloads: PayloadBuilder,
    capabilities: Option<Capabilities>,
    created: u8,
    last_activation: Option<Instant>,
    state: ManagerState,
}

impl<'d, D: AdvertisingDriver, I: Indicator, const SETS: usize> AdvertisingManager<'d, D, I, SETS> {
    pub fn new(driver: D, indicator: I, config: SchedulerConfig) -> Self {
        Self {
            driver,
            config,
            reaction: EventReaction::new(indicator),
            scheduler: AdvertisingScheduler::new(config.spacing),
            sets: heapless::Vec::new(),
            payloads: PayloadBuilder::new(),
            capabilities: None,
            created: 0,
            last_activation: None,
            state: ManagerState::Idle,
        }
    }

    /// Register an advertising set.
    ///
    /// The payload is built here, so a name that doesn't fit fails now with
    /// [`Error::PayloadTooLarge`]. At most one legacy set is accepted.
    pub fn add_set(&mut self, descriptor: AdvertisingSetDescriptor<'d>) -> Result<SetId, Error> {
        if self.state != ManagerState::Idle {
            return Err(Error::InvalidState);
        }
        descriptor.validate()?;
        if descriptor.is_legacy() && self.sets.iter().any(|s| s.descriptor().is_legacy()) {
            warn!("[adv] only one legacy set is available");
            return Err(Error::InvalidValue);
        }
        if self.sets.is_full() {
            return Err(Error::InsufficientSpace);
        }

        let payload = self
            .payloads
            .build(self.config.flags, descriptor.name, descriptor.payload_tx_power())?;
        let id = SetId(self.sets.len());
        self.scheduler.enqueue(id, descriptor.kind)?;
        self.sets
            .push(AdvertisingSet::new(id, descriptor, payload))
            .map_err(|_| Error::InsufficientSpace)?;
        debug!("[adv] added {:?} set {}", descriptor.kind, id.0);
        Ok(id)
    }

    /// Ask the controller to initialize.
    ///
    /// Advertising starts once [`ControllerEvent::InitComplete`] is dispatched.
    pub fn begin(&mut self) -> Result<(), AdvertisingError<D::Error>> {
        if self.state != ManagerState::Idle {
            return Err(Error::InvalidState.into());
        }
        if let Err(e) = self.driver.init() {
            {
                #[cfg(feature = "defmt")]
                let e = defmt::Debug2Format(&e);
                error!("[adv] controller initialization failed: {:?}", e);
            }
            self.state = ManagerState::Halted;
            return Err(AdvertisingError::Controller(e));
        }
        self.state = ManagerState::Initializing;
        Ok(())
    }

    /// Run one job. New jobs go to `queue`.
    pub fn dispatch<Q: TaskQueue>(&mut self, job: Job, queue: &mut Q) {
        match self.state {
            ManagerState::Halted | ManagerState::ShutDown => {
                trace!("[adv] {:?}, ignoring {:?}", self.state, job);
                return;
            }
            _ => {}
        }
        match job {
            Job::Activate(id) => self.activate(id, queue),
            Job::Event(event) => self.on_event(event, queue),
        }
    }

    fn on_event<Q: TaskQueue>(&mut self, event: ControllerEvent, queue: &mut Q) {
        match self.reaction.handle(&event) {
            Reaction::None => {}
            Reaction::InitComplete(status) => self.on_init_complete(status, queue),
            Reaction::SetEnded { handle, .. } => {
                if let Some(set) = self.sets.iter_mut().find(|s| s.handle() == Some(handle)) {
                    set.mark_ended();
                }
            }
            Reaction::Restart => self.restart_all(),
        }
    }

    fn on_init_complete<Q: TaskQueue>(&mut self, status: EventStatus, queue: &mut Q) {
        if self.state != ManagerState::Initializing {
            warn!("[adv] unexpected init completion in state {:?}", self.state);
            return;
        }
        if let EventStatus::Failed(code) = status {
            error!("[adv] {:?}: controller status {:02x}", Error::InitializationFailed, code);
            self.state = ManagerState::Halted;
            return;
        }

        let caps = Capabilities::read(&self.driver);
        info!(
            "[adv] controller ready: {} sets, extended {}, 2M {}, coded {}",
            caps.max_sets, caps.extended, caps.le_2m, caps.le_coded
        );
        self.capabilities = Some(caps);
        self.state = ManagerState::Running;

        if let Some((tx, rx)) = self.config.preferred_phys {
            if caps.supports(tx) && caps.supports(rx) {
                if let Err(e) = self.driver.set_preferred_phys(tx, rx) {
                    #[cfg(feature = "defmt")]
                    let e = defmt::Debug2Format(&e);
                    warn!("[adv] unable to set preferred phys: {:?}", e);
                }
            } else {
                info!(
                    "[adv] preferred phys {:?}/{:?} not set: {:?}",
                    tx,
                    rx,
                    Error::FeatureUnsupported
                );
            }
        }

        match self.scheduler.schedule(queue, caps.extended) {
            Ok(activations) => {
                for activation in activations.iter() {
                    let Some(set) = self.sets.get_mut(activation.id.0) else {
                        continue;
                    };
                    match activation.outcome {
                        Outcome::Submitted { .. } => {}
                        Outcome::Skipped => set.mark_skipped(),
                        Outcome::Rejected(e) => set.mark_failed(e),
                    }
                }
            }
            Err(e) => warn!("[sched] activations not scheduled: {:?}", e),
        }
    }

    /// Activate one set, keeping activations at least one spacing apart.
    ///
    /// An activation that arrives too early goes back on the queue until the spacing has elapsed.
    fn activate<Q: TaskQueue>(&mut self, id: SetId, queue: &mut Q) {
        if self.state != ManagerState::Running {
            warn!("[adv] set {} activation while {:?}", id.0, self.state);
            return;
        }
        let max_sets = self.capabilities.map(|c| c.max_sets).unwrap_or(0);
        let Some(set) = self.sets.get_mut(id.0) else {
            warn!("[adv] activation of unknown set {}", id.0);
            return;
        };
        match set.state() {
            SetState::Uninitialized => {}
            // Refused by the set itself, without touching the driver.
            state if state.is_dead() => {
                let _ = set.activate(&mut self.driver, self.created, max_sets);
                return;
            }
            state => {
                debug!("[adv] set {} already activated ({:?})", id.0, state);
                return;
            }
        }

        let now = queue.now();
        if let Some(last) = self.last_activation {
            let due = last + self.config.spacing.duration();
            if now < due {
                debug!("[sched] set {} activation deferred by {} ms", id.0, (due - now).as_millis());
                if let Err(e) = queue.submit_after(due - now, Job::Activate(id)) {
                    warn!("[sched] unable to defer set {}: {:?}", id.0, e);
                    set.mark_failed(e);
                }
                return;
            }
        }
        self.last_activation = Some(now);

        let had_handle = set.handle().is_some();
        let result = set.activate(&mut self.driver, self.created, max_sets);
        if !set.descriptor().is_legacy() && !had_handle && set.handle().is_some() {
            self.created += 1;
        }
        if let Err(e) = result {
            warn!("[adv] set {} not advertising: {:?}", id.0, e);
        }
    }

    /// Start advertising again after a disconnection, legacy set first.
    fn restart_all(&mut self) {
        if self.state != ManagerState::Running {
            return;
        }
        let extended = self.capabilities.map(|c| c.extended).unwrap_or(false);
        for (id, kind) in self.scheduler.order() {
            if kind == SetKind::Extended && !extended {
                continue;
            }
            let Some(set) = self.sets.get_mut(id.0) else {
                continue;
            };
            if !set.was_activated() || set.state().is_dead() {
                continue;
            }
            // Failures are recorded on the set and not retried.
            let _ = set.restart(&mut self.driver);
        }
    }

    /// Stop advertising on one set. Stopping a stopped set does nothing.
    pub fn stop(&mut self, id: SetId) -> Result<(), Error> {
        if self.state != ManagerState::Running {
            return Err(Error::InvalidState);
        }
        let set = self.sets.get_mut(id.0).ok_or(Error::NotFound)?;
        set.stop(&mut self.driver)
    }

    /// Resume advertising on a stopped set without recreating it. Starting an advertising set
    /// does nothing.
    pub fn start(&mut self, id: SetId) -> Result<(), Error> {
        if self.state != ManagerState::Running {
            return Err(Error::InvalidState);
        }
        let set = self.sets.get_mut(id.0).ok_or(Error::NotFound)?;
        match set.state() {
            SetState::Advertising => Ok(()),
            SetState::Stopped => set.restart(&mut self.driver),
            _ => Err(Error::InvalidState),
        }
    }

    /// Stop every set and release the extended handles.
    pub fn shutdown(&mut self) {
        if self.state == ManagerState::ShutDown {
            return;
        }
        for set in self.sets.iter_mut() {
            set.teardown(&mut self.driver);
        }
        self.created = 0;
        self.state = ManagerState::ShutDown;
        info!("[adv] shut down");
    }

    pub fn manager_state(&self) -> ManagerState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == ManagerState::Halted
    }

    pub fn state(&self, id: SetId) -> Option<SetState> {
        self.sets.get(id.0).map(|s| s.state())
    }

    pub fn set(&self, id: SetId) -> Option<&AdvertisingSet<'d>> {
        self.sets.get(id.0)
    }

    pub fn sets(&self) -> impl Iterator<Item = &AdvertisingSet<'d>> {
        self.sets.iter()
    }

    pub fn connection_active(&self) -> bool {
        self.reaction.connection_active()
    }

    /// `None` until the controller finished initialization.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn indicator(&self) -> &I {
        self.reaction.indicator()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
