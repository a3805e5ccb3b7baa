//! Single-threaded dispatch queue.
//!
//! Every lifecycle operation and every controller event is a [`Job`]. Jobs are dispatched one at
//! a time; one dispatched job is one tick. Jobs submitted "now" run in submission order, delayed
//! jobs run once their deadline has passed, earliest deadline first.
use embassy_time::{Duration, Instant};

use crate::event::ControllerEvent;
use crate::lifecycle::SetId;
use crate::Error;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Drive one advertising set through create, configure, payload and start.
    Activate(SetId),
    /// React to a controller event.
    Event(ControllerEvent),
}

/// Where jobs get submitted.
pub trait TaskQueue {
    /// Current time as seen by the queue. Delays are relative to it.
    fn now(&self) -> Instant;

    /// Run `job` on a later tick, after every job already submitted for now.
    fn submit_now(&mut self, job: Job) -> Result<(), Error>;

    /// Run `job` no earlier than `delay` after submission.
    fn submit_after(&mut self, delay: Duration, job: Job) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: Instant,
    seq: u32,
    job: Job,
}

/// Fixed-capacity [`TaskQueue`] driven by an externally supplied clock.
///
/// The queue never reads a clock itself. The owner moves time forward with
/// [`DispatchQueue::advance`] and takes due jobs with [`DispatchQueue::pop_due`].
pub struct DispatchQueue<const N: usize> {
    entries: heapless::Vec<Entry, N>,
    now: Instant,
    seq: u32,
    ticks: u32,
}

impl<const N: usize> Default for DispatchQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DispatchQueue<N> {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
            now: Instant::from_ticks(0),
            seq: 0,
            ticks: 0,
        }
    }

    /// Move the queue clock forward. Time never goes backwards.
    pub fn advance(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Number of jobs dispatched so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deadline of the next job to run.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next().map(|idx| self.entries[idx].deadline)
    }

    /// Take the next job whose deadline has passed. Each call is one tick.
    pub fn pop_due(&mut self) -> Option<Job> {
        let idx = self.next()?;
        if self.entries[idx].deadline > self.now {
            return None;
        }
        let entry = self.entries.swap_remove(idx);
        self.ticks += 1;
        trace!("[queue] tick {}: {:?}", self.ticks, entry.job);
        Some(entry.job)
    }

    fn next(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.deadline, e.seq))
            .map(|(idx, _)| idx)
    }

    fn push(&mut self, deadline: Instant, job: Job) -> Result<(), Error> {
        let seq = self.seq;
        self.entries
            .push(Entry { deadline, seq, job })
            .map_err(|_| Error::InsufficientSpace)?;
        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }
}

impl<const N: usize> TaskQueue for DispatchQueue<N> {
    fn now(&self) -> Instant {
        self.now
    }

    fn submit_now(&mut self, job: Job) -> Result<(), Error> {
        self.push(self.now, job)
    }

    fn submit_after(&mut self, delay: Duration, job: Job) -> Result<(), Error> {
        self.push(self.now + delay, job)
    }
}

#[cfg(test)]
mod tests {
    use bt_hci::param::AdvHandle;

    use super::*;

    fn start(handle: u8) -> Job {
        Job::Event(ControllerEvent::AdvertisingStart {
            handle: AdvHandle::new(handle),
        })
    }

    #[test]
    fn immediate_jobs_run_in_submission_order() {
        let mut q: DispatchQueue<4> = DispatchQueue::new();
        q.submit_now(start(1)).unwrap();
        q.submit_now(start(2)).unwrap();
        q.submit_now(start(3)).unwrap();
        assert_eq!(q.pop_due(), Some(start(1)));
        assert_eq!(q.pop_due(), Some(start(2)));
        assert_eq!(q.pop_due(), Some(start(3)));
        assert_eq!(q.pop_due(), None);
        assert_eq!(q.ticks(), 3);
    }

    #[test]
    fn delayed_jobs_follow_deadline_order() {
        let mut q: DispatchQueue<4> = DispatchQueue::new();
        q.submit_after(Duration::from_millis(300), start(1)).unwrap();
        q.submit_after(Duration::from_millis(100), start(2)).unwrap();
        q.submit_now(start(3)).unwrap();

        assert_eq!(q.pop_due(), Some(start(3)));
        assert_eq!(q.pop_due(), None);
        assert_eq!(q.next_deadline(), Some(Instant::from_millis(100)));

        q.advance(Instant::from_millis(99));
        assert_eq!(q.pop_due(), None);

        q.advance(Instant::from_millis(1000));
        assert_eq!(q.pop_due(), Some(start(2)));
        assert_eq!(q.pop_due(), Some(start(1)));
        assert!(q.is_empty());
    }

    #[test]
    fn delay_is_relative_to_submission_time() {
        let mut q: DispatchQueue<2> = DispatchQueue::new();
        q.advance(Instant::from_millis(50));
        q.submit_after(Duration::from_millis(10), start(1)).unwrap();
        assert_eq!(q.next_deadline(), Some(Instant::from_millis(60)));
        q.advance(Instant::from_millis(20));
        assert_eq!(q.now(), Instant::from_millis(50));
    }

    #[test]
    fn full_queue_rejects_jobs() {
        let mut q: DispatchQueue<1> = DispatchQueue::new();
        q.submit_now(start(1)).unwrap();
        assert_eq!(q.submit_now(start(2)), Err(Error::InsufficientSpace));
        assert_eq!(q.len(), 1);
    }
}
