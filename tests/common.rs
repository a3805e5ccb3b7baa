#![allow(dead_code)]
use std::cell::RefCell;
use std::rc::Rc;

use embassy_time::{Duration, Instant};
use trouble_advertiser::driver::{self, ErrorKind};
use trouble_advertiser::prelude::*;

/// Driver calls in the order they were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    Create,
    Configure(AdvHandle),
    SetPayload(AdvHandle, Vec<u8>),
    Start(AdvHandle),
    Stop(AdvHandle),
    Remove(AdvHandle),
    PreferredPhys(Phy, Phy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl driver::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Default)]
pub struct Log {
    pub calls: Vec<Call>,
    pub fail_create: Vec<usize>,
    pub fail_start: Vec<AdvHandle>,
    pub fail_configure: Vec<AdvHandle>,
    pub fail_payload: Vec<AdvHandle>,
    pub fail_init: bool,
}

impl Log {
    pub fn creates(&self) -> usize {
        self.calls.iter().filter(|c| **c == Call::Create).count()
    }

    pub fn starts(&self) -> Vec<AdvHandle> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Start(h) => Some(*h),
                _ => None,
            })
            .collect()
    }
}

/// Recording controller driver.
///
/// The call log is shared so it can be inspected while a manager owns the driver.
#[derive(Clone)]
pub struct MockDriver {
    pub log: Rc<RefCell<Log>>,
    pub max_sets: u8,
    pub extended: bool,
    pub le_2m: bool,
    pub le_coded: bool,
    next_handle: u8,
}

impl MockDriver {
    pub fn new(max_sets: u8, extended: bool) -> Self {
        Self {
            log: Rc::new(RefCell::new(Log::default())),
            max_sets,
            extended,
            le_2m: true,
            le_coded: true,
            next_handle: 1,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().calls.clone()
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().calls.push(call);
    }
}

impl AdvertisingDriver for MockDriver {
    type Error = MockError;

    fn init(&mut self) -> Result<(), MockError> {
        self.record(Call::Init);
        if self.log.borrow().fail_init {
            return Err(MockError);
        }
        Ok(())
    }

    fn max_advertising_sets(&self) -> u8 {
        self.max_sets
    }

    fn is_feature_supported(&self, feature: Feature) -> bool {
        match feature {
            Feature::ExtendedAdvertising => self.extended,
            Feature::Le2MPhy => self.le_2m,
            Feature::LeCodedPhy => self.le_coded,
        }
    }

    fn create_advertising_set(&mut self, _params: &AdvertisingParameters) -> Result<AdvHandle, MockError> {
        let nth = self.log.borrow().creates();
        self.record(Call::Create);
        if self.log.borrow().fail_create.contains(&nth) {
            return Err(MockError);
        }
        let handle = AdvHandle::new(self.next_handle);
        self.next_handle += 1;
        Ok(handle)
    }

    fn set_advertising_parameters(&mut self, handle: AdvHandle, _params: &AdvertisingParameters) -> Result<(), MockError> {
        self.record(Call::Configure(handle));
        if self.log.borrow().fail_configure.contains(&handle) {
            return Err(MockError);
        }
        Ok(())
    }

    fn set_advertising_payload(&mut self, handle: AdvHandle, payload: &[u8]) -> Result<(), MockError> {
        self.record(Call::SetPayload(handle, payload.to_vec()));
        if self.log.borrow().fail_payload.contains(&handle) {
            return Err(MockError);
        }
        Ok(())
    }

    fn start_advertising(
        &mut self,
        handle: AdvHandle,
        _timeout: Option<Duration>,
        _max_events: Option<u8>,
    ) -> Result<(), MockError> {
        self.record(Call::Start(handle));
        if self.log.borrow().fail_start.contains(&handle) {
            return Err(MockError);
        }
        Ok(())
    }

    fn stop_advertising(&mut self, handle: AdvHandle) -> Result<(), MockError> {
        self.record(Call::Stop(handle));
        Ok(())
    }

    fn remove_advertising_set(&mut self, handle: AdvHandle) -> Result<(), MockError> {
        self.record(Call::Remove(handle));
        Ok(())
    }

    fn set_preferred_phys(&mut self, tx: Phy, rx: Phy) -> Result<(), MockError> {
        self.record(Call::PreferredPhys(tx, rx));
        Ok(())
    }
}

pub type Manager<'d> = AdvertisingManager<'d, MockDriver, (), 4>;

pub fn manager<'d>(driver: MockDriver) -> Manager<'d> {
    AdvertisingManager::new(driver, (), SchedulerConfig::default())
}

pub fn legacy<'d>(name: &'d str) -> AdvertisingSetDescriptor<'d> {
    let mut d = AdvertisingSetDescriptor::legacy(name);
    d.interval_min = Duration::from_millis(80);
    d.interval_max = Duration::from_millis(160);
    d
}

pub fn coded<'d>(name: &'d str) -> AdvertisingSetDescriptor<'d> {
    let mut d = AdvertisingSetDescriptor::extended(name);
    d.primary_phy = Phy::LeCoded;
    d.secondary_phy = Phy::LeCoded;
    d.interval_min = Duration::from_millis(160);
    d.interval_max = Duration::from_millis(320);
    d
}

/// Dispatch every job, moving the queue clock to each deadline in turn.
///
/// Returns the time at which each job ran.
pub fn drain<const N: usize>(manager: &mut Manager<'_>, queue: &mut DispatchQueue<N>) -> Vec<(Instant, Job)> {
    let mut ran = Vec::new();
    loop {
        if let Some(job) = queue.pop_due() {
            ran.push((queue.now(), job));
            manager.dispatch(job, queue);
            continue;
        }
        match queue.next_deadline() {
            Some(deadline) => queue.advance(deadline),
            None => break,
        }
    }
    ran
}

/// Initialize the controller and run every resulting job.
pub fn bring_up<const N: usize>(manager: &mut Manager<'_>, queue: &mut DispatchQueue<N>) -> Vec<(Instant, Job)> {
    manager.begin().unwrap();
    queue
        .submit_now(Job::Event(ControllerEvent::InitComplete(EventStatus::Success)))
        .unwrap();
    drain(manager, queue)
}

pub fn event<const N: usize>(manager: &mut Manager<'_>, queue: &mut DispatchQueue<N>, event: ControllerEvent) {
    queue.submit_now(Job::Event(event)).unwrap();
    drain(manager, queue);
}

pub fn peer() -> Address {
    Address::random([0xff, 0x8f, 0x1a, 0x05, 0xe4, 0xff])
}
