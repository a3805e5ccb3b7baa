//! Async event loop.
use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, Timer};

use crate::driver::AdvertisingDriver;
use crate::event::ControllerEvent;
use crate::indicator::Indicator;
use crate::manager::{AdvertisingManager, ManagerState};
use crate::queue::{DispatchQueue, Job, TaskQueue};
use crate::{AdvertisingError, Error};

/// Channel carrying controller events from the driver's event source into the [`Runner`].
pub type EventChannel<const N: usize> = Channel<NoopRawMutex, ControllerEvent, N>;

/// Drives an [`AdvertisingManager`] from a [`DispatchQueue`] and an [`EventChannel`].
///
/// The runner is the dispatch loop: it dispatches one job per iteration, in queue order, and
/// sleeps until either the next delayed job is due or an event arrives.
pub struct Runner<'a, const JOBS: usize, const EVENTS: usize> {
    queue: DispatchQueue<JOBS>,
    events: &'a EventChannel<EVENTS>,
}

impl<'a, const JOBS: usize, const EVENTS: usize> Runner<'a, JOBS, EVENTS> {
    pub fn new(events: &'a EventChannel<EVENTS>) -> Self {
        Self {
            queue: DispatchQueue::new(),
            events,
        }
    }

    pub fn queue(&self) -> &DispatchQueue<JOBS> {
        &self.queue
    }

    /// Initialize the controller and dispatch jobs until initialization fails.
    ///
    /// Only returns on failure. Drop the future to stop, then call
    /// [`AdvertisingManager::shutdown`].
    pub async fn run<'d, D, I, const SETS: usize>(
        &mut self,
        manager: &mut AdvertisingManager<'d, D, I, SETS>,
    ) -> Result<(), AdvertisingError<D::Error>>
    where
        D: AdvertisingDriver,
        I: Indicator,
    {
        if manager.manager_state() == ManagerState::Idle {
            manager.begin()?;
        }
        self.queue.advance(Instant::now());
        loop {
            while let Ok(event) = self.events.try_receive() {
                self.enqueue(event);
            }

            self.queue.advance(Instant::now());
            if let Some(job) = self.queue.pop_due() {
                manager.dispatch(job, &mut self.queue);
                match manager.manager_state() {
                    ManagerState::Halted => return Err(Error::InitializationFailed.into()),
                    ManagerState::ShutDown => return Ok(()),
                    _ => {}
                }
                yield_now().await;
                continue;
            }

            match self.queue.next_deadline() {
                Some(deadline) => match select(self.events.receive(), Timer::at(deadline)).await {
                    Either::First(event) => self.enqueue(event),
                    Either::Second(_) => {}
                },
                None => {
                    let event = self.events.receive().await;
                    self.enqueue(event);
                }
            }
        }
    }

    fn enqueue(&mut self, event: ControllerEvent) {
        if let Err(e) = self.queue.submit_now(Job::Event(event)) {
            warn!("[sched] dropping event {:?}: {:?}", event, e);
        }
    }
}
