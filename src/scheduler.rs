//! Staggered activation of advertising sets.
use embassy_time::Duration;

use crate::config::ACTIVATION_SPACING_MS;
use crate::descriptor::SetKind;
use crate::lifecycle::SetId;
use crate::queue::{Job, TaskQueue};
use crate::Error;

/// Time between two consecutive set activations. Never zero.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationSpacing(Duration);

impl ActivationSpacing {
    /// Returns [`Error::InvalidValue`] for a zero duration.
    pub fn new(spacing: Duration) -> Result<Self, Error> {
        if spacing.as_ticks() == 0 {
            return Err(Error::InvalidValue);
        }
        Ok(Self(spacing))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl Default for ActivationSpacing {
    fn default() -> Self {
        Self(Duration::from_millis(ACTIVATION_SPACING_MS))
    }
}

/// What happened to one set when the activations were scheduled.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// An activation job was queued to run after `delay`.
    Submitted { delay: Duration },
    /// Extended advertising is not available, the set will never run.
    Skipped,
    /// The queue refused the job.
    Rejected(Error),
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub id: SetId,
    pub outcome: Outcome,
}

/// Orders set activations and spaces them out on a [`TaskQueue`].
///
/// Sets are activated legacy first, then extended sets in the order they were added. The first
/// activation runs as soon as possible, activation `k` is delayed by `k` times the spacing.
pub struct AdvertisingScheduler<const N: usize> {
    spacing: ActivationSpacing,
    pending: heapless::Vec<(SetId, SetKind), N>,
    scheduled: bool,
}

impl<const N: usize> AdvertisingScheduler<N> {
    pub fn new(spacing: ActivationSpacing) -> Self {
        Self {
            spacing,
            pending: heapless::Vec::new(),
            scheduled: false,
        }
    }

    pub fn spacing(&self) -> ActivationSpacing {
        self.spacing
    }

    /// Add a set to the activation order.
    pub fn enqueue(&mut self, id: SetId, kind: SetKind) -> Result<(), Error> {
        if self.scheduled {
            return Err(Error::InvalidState);
        }
        let at = match kind {
            // Behind any legacy set already queued, ahead of every extended one.
            SetKind::Legacy => self
                .pending
                .iter()
                .position(|(_, k)| *k == SetKind::Extended)
                .unwrap_or(self.pending.len()),
            SetKind::Extended => self.pending.len(),
        };
        self.pending.insert(at, (id, kind)).map_err(|_| Error::InsufficientSpace)
    }

    /// Activation order.
    pub fn order(&self) -> impl Iterator<Item = (SetId, SetKind)> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Submit one activation job per set.
    ///
    /// Extended sets are left out when `extended_supported` is false. Runs once; a second call
    /// returns [`Error::InvalidState`].
    pub fn schedule<Q: TaskQueue>(
        &mut self,
        queue: &mut Q,
        extended_supported: bool,
    ) -> Result<heapless::Vec<Activation, N>, Error> {
        if self.scheduled {
            return Err(Error::InvalidState);
        }
        self.scheduled = true;

        let mut activations = heapless::Vec::new();
        let mut slot: u32 = 0;
        for &(id, kind) in self.pending.iter() {
            let outcome = if kind == SetKind::Extended && !extended_supported {
                info!("[sched] extended advertising unsupported, skipping set {}", id.index());
                Outcome::Skipped
            } else {
                let delay = self.spacing.duration() * slot;
                let submitted = if slot == 0 {
                    queue.submit_now(Job::Activate(id))
                } else {
                    queue.submit_after(delay, Job::Activate(id))
                };
                match submitted {
                    Ok(()) => {
                        debug!("[sched] set {} activates in {} ms", id.index(), delay.as_millis());
                        slot += 1;
                        Outcome::Submitted { delay }
                    }
                    Err(e) => {
                        warn!("[sched] unable to queue set {}: {:?}", id.index(), e);
                        Outcome::Rejected(e)
                    }
                }
            };
            // Same capacity as `pending`.
            let _ = activations.push(Activation { id, outcome });
        }
        Ok(activations)
    }
}

#[cfg(test)]
mod tests {
    use embassy_time::Instant;

    use super::*;
    use crate::queue::DispatchQueue;

    #[test]
    fn zero_spacing_is_rejected() {
        assert_eq!(ActivationSpacing::new(Duration::from_ticks(0)), Err(Error::InvalidValue));
        assert!(ActivationSpacing::new(Duration::from_millis(1)).is_ok());
        assert_eq!(
            ActivationSpacing::default().duration(),
            Duration::from_millis(ACTIVATION_SPACING_MS)
        );
    }

    #[test]
    fn legacy_goes_first() {
        let mut s: AdvertisingScheduler<4> = AdvertisingScheduler::new(ActivationSpacing::default());
        s.enqueue(SetId(0), SetKind::Extended).unwrap();
        s.enqueue(SetId(1), SetKind::Extended).unwrap();
        s.enqueue(SetId(2), SetKind::Legacy).unwrap();

        let order: Vec<_> = s.order().map(|(id, _)| id).collect();
        assert_eq!(order, [SetId(2), SetId(0), SetId(1)]);
    }

    #[test]
    fn activations_are_spaced() {
        let spacing = ActivationSpacing::new(Duration::from_millis(500)).unwrap();
        let mut s: AdvertisingScheduler<4> = AdvertisingScheduler::new(spacing);
        let mut q: DispatchQueue<4> = DispatchQueue::new();
        s.enqueue(SetId(0), SetKind::Legacy).unwrap();
        s.enqueue(SetId(1), SetKind::Extended).unwrap();
        s.enqueue(SetId(2), SetKind::Extended).unwrap();

        let activations = s.schedule(&mut q, true).unwrap();
        let delays: Vec<_> = activations.iter().map(|a| a.outcome).collect();
        assert_eq!(
            delays,
            [
                Outcome::Submitted {
                    delay: Duration::from_millis(0)
                },
                Outcome::Submitted {
                    delay: Duration::from_millis(500)
                },
                Outcome::Submitted {
                    delay: Duration::from_millis(1000)
                },
            ]
        );

        assert_eq!(q.pop_due(), Some(Job::Activate(SetId(0))));
        assert_eq!(q.pop_due(), None);
        q.advance(Instant::from_millis(500));
        assert_eq!(q.pop_due(), Some(Job::Activate(SetId(1))));
        assert_eq!(q.pop_due(), None);
        q.advance(Instant::from_millis(1000));
        assert_eq!(q.pop_due(), Some(Job::Activate(SetId(2))));
    }

    #[test]
    fn extended_sets_skipped_without_support() {
        let mut s: AdvertisingScheduler<4> = AdvertisingScheduler::new(ActivationSpacing::default());
        let mut q: DispatchQueue<4> = DispatchQueue::new();
        s.enqueue(SetId(0), SetKind::Legacy).unwrap();
        s.enqueue(SetId(1), SetKind::Extended).unwrap();

        let activations = s.schedule(&mut q, false).unwrap();
        assert_eq!(activations[1].outcome, Outcome::Skipped);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn schedules_only_once() {
        let mut s: AdvertisingScheduler<2> = AdvertisingScheduler::new(ActivationSpacing::default());
        let mut q: DispatchQueue<4> = DispatchQueue::new();
        s.enqueue(SetId(0), SetKind::Legacy).unwrap();
        s.schedule(&mut q, true).unwrap();
        assert_eq!(s.schedule(&mut q, true), Err(Error::InvalidState));
        assert_eq!(s.enqueue(SetId(1), SetKind::Extended), Err(Error::InvalidState));
        assert_eq!(q.len(), 1);
    }
}
