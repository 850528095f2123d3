// Priority-aware admission control for fetches
// Author: kelexine (https://github.com/kelexine)

use crate::config::PrefetchSettings;
use crate::metrics;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

struct Waiter {
    priority: i32,
    seq: u64,
    tx: oneshot::Sender<AdmissionPermit>,
}

// Max-heap order: higher priority first, then earlier arrival.
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

struct AdmissionState {
    running: usize,
    max_concurrent: usize,
    queue: BinaryHeap<Waiter>,
    next_seq: u64,
}

/// Gate that bounds how many fetches execute at once.
///
/// Requests below the urgent threshold wait in a priority queue (highest
/// priority first, FIFO among equals) until a slot frees up. Urgent requests
/// are admitted immediately even when every slot is taken; they still
/// occupy a slot while running.
///
/// The queue is shared by every prefetch manager built from the same
/// context, so one ceiling covers all fetch traffic.
pub struct AdmissionQueue {
    urgent_priority: i32,
    state: Mutex<AdmissionState>,
}

impl AdmissionQueue {
    pub fn new(max_concurrent: usize, urgent_priority: i32) -> Arc<Self> {
        Arc::new(Self {
            urgent_priority,
            state: Mutex::new(AdmissionState {
                running: 0,
                max_concurrent: max_concurrent.max(1),
                queue: BinaryHeap::new(),
                next_seq: 0,
            }),
        })
    }

    pub fn from_settings(settings: &PrefetchSettings) -> Arc<Self> {
        Self::new(settings.max_concurrent, settings.urgent_priority)
    }

    pub fn urgent_priority(&self) -> i32 {
        self.urgent_priority
    }

    pub fn is_urgent(&self, priority: i32) -> bool {
        priority >= self.urgent_priority
    }

    /// Ask for a slot. The decision (admit now, or enqueue) is made before
    /// this returns, so arrival order is fixed at call time.
    pub fn request(self: &Arc<Self>, priority: i32) -> AdmissionTicket {
        let mut state = self.state.lock();

        if self.is_urgent(priority) {
            state.running += 1;
            metrics::record_prefetch("urgent");
            debug!("Admitting urgent request (priority {}) past the limit", priority);
            self.publish(&state);
            return AdmissionTicket::ready(self.permit());
        }

        if state.running < state.max_concurrent && state.queue.is_empty() {
            state.running += 1;
            self.publish(&state);
            return AdmissionTicket::ready(self.permit());
        }

        let (tx, rx) = oneshot::channel();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Waiter { priority, seq, tx });
        metrics::record_prefetch("queued");
        debug!(
            "Queued request (priority {}), {} waiting, {} running",
            priority,
            state.queue.len(),
            state.running
        );
        self.publish(&state);

        AdmissionTicket {
            inner: TicketState::Waiting {
                rx,
                queue: self.clone(),
            },
        }
    }

    /// Change the concurrency ceiling. Running fetches are never interrupted;
    /// a lower ceiling only holds back later admissions.
    pub fn set_max_concurrent(self: &Arc<Self>, max_concurrent: usize) {
        let mut state = self.state.lock();
        let max_concurrent = max_concurrent.max(1);
        if state.max_concurrent != max_concurrent {
            debug!(
                "Prefetch concurrency ceiling {} -> {}",
                state.max_concurrent, max_concurrent
            );
        }
        state.max_concurrent = max_concurrent;
        self.admit_waiting(&mut state);
    }

    pub fn max_concurrent(&self) -> usize {
        self.state.lock().max_concurrent
    }

    pub fn running(&self) -> usize {
        self.state.lock().running
    }

    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn permit(self: &Arc<Self>) -> AdmissionPermit {
        AdmissionPermit {
            queue: self.clone(),
            armed: true,
        }
    }

    fn release(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.running = state.running.saturating_sub(1);
        self.admit_waiting(&mut state);
    }

    /// Hand free slots to the best queued waiters.
    fn admit_waiting(self: &Arc<Self>, state: &mut AdmissionState) {
        while state.running < state.max_concurrent {
            let Some(waiter) = state.queue.pop() else {
                break;
            };
            state.running += 1;
            if let Err(mut permit) = waiter.tx.send(self.permit()) {
                // Waiter went away; the slot was never used
                permit.armed = false;
                state.running -= 1;
            } else {
                debug!("Admitted queued request (priority {})", waiter.priority);
            }
        }
        self.publish(state);
    }

    fn publish(&self, state: &AdmissionState) {
        metrics::update_admission(state.running, state.queue.len(), state.max_concurrent);
    }
}

enum TicketState {
    Ready(AdmissionPermit),
    Waiting {
        rx: oneshot::Receiver<AdmissionPermit>,
        queue: Arc<AdmissionQueue>,
    },
}

/// A pending or granted claim on an execution slot.
pub struct AdmissionTicket {
    inner: TicketState,
}

impl AdmissionTicket {
    fn ready(permit: AdmissionPermit) -> Self {
        Self {
            inner: TicketState::Ready(permit),
        }
    }

    /// Whether the slot was granted at request time.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, TicketState::Ready(_))
    }

    /// Wait until the slot is granted.
    pub async fn admitted(self) -> AdmissionPermit {
        match self.inner {
            TicketState::Ready(permit) => permit,
            TicketState::Waiting { rx, queue } => match rx.await {
                Ok(permit) => permit,
                // The sender lives in the queue we hold, so this is unreachable
                // in practice; run anyway rather than hang.
                Err(_) => {
                    let mut state = queue.state.lock();
                    state.running += 1;
                    queue.publish(&state);
                    drop(state);
                    queue.permit()
                }
            },
        }
    }
}

/// Occupies one execution slot until dropped.
pub struct AdmissionPermit {
    queue: Arc<AdmissionQueue>,
    armed: bool,
}

impl fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if self.armed {
            self.queue.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_admits_up_to_ceiling() {
        let queue = AdmissionQueue::new(2, 5);
        let a = queue.request(1);
        let b = queue.request(1);
        let c = queue.request(1);

        assert!(a.is_ready());
        assert!(b.is_ready());
        assert!(!c.is_ready());
        assert_eq!(queue.running(), 2);
        assert_eq!(queue.queued(), 1);
    }

    #[test]
    fn test_urgent_bypasses_ceiling() {
        let queue = AdmissionQueue::new(1, 5);
        let _busy = queue.request(1);
        let urgent = queue.request(5);

        assert!(urgent.is_ready());
        assert_eq!(queue.running(), 2);
    }

    #[test]
    fn test_release_admits_highest_priority_then_fifo() {
        let queue = AdmissionQueue::new(1, 10);
        let first = queue.request(1);
        let low = queue.request(1);
        let high_a = queue.request(4);
        let high_b = queue.request(4);

        let mut low = task::spawn(low.admitted());
        let mut high_a = task::spawn(high_a.admitted());
        let mut high_b = task::spawn(high_b.admitted());
        assert_pending!(low.poll());
        assert_pending!(high_a.poll());
        assert_pending!(high_b.poll());

        let permit = match first.inner {
            TicketState::Ready(permit) => permit,
            TicketState::Waiting { .. } => panic!("first request should be admitted"),
        };
        drop(permit);

        assert!(high_a.is_woken());
        let permit_a = assert_ready!(high_a.poll());
        assert_pending!(high_b.poll());
        assert_pending!(low.poll());

        drop(permit_a);
        let permit_b = assert_ready!(high_b.poll());
        assert_pending!(low.poll());

        drop(permit_b);
        let _permit_low = assert_ready!(low.poll());
        assert_eq!(queue.queued(), 0);
    }

    #[test]
    fn test_lowering_ceiling_keeps_running_permits() {
        let queue = AdmissionQueue::new(3, 5);
        let tickets: Vec<_> = (0..3).map(|_| queue.request(1)).collect();
        assert!(tickets.iter().all(AdmissionTicket::is_ready));

        queue.set_max_concurrent(1);
        assert_eq!(queue.running(), 3);
        assert!(!queue.request(1).is_ready());

        drop(tickets);
        assert_eq!(queue.max_concurrent(), 1);
    }

    #[test]
    fn test_raising_ceiling_admits_waiters() {
        let queue = AdmissionQueue::new(1, 5);
        let _busy = queue.request(1);
        let waiting = queue.request(1);
        let mut waiting = task::spawn(waiting.admitted());
        assert_pending!(waiting.poll());

        queue.set_max_concurrent(2);
        let _permit = assert_ready!(waiting.poll());
        assert_eq!(queue.running(), 2);
    }

    #[test]
    fn test_abandoned_waiter_does_not_leak_slot() {
        let queue = AdmissionQueue::new(1, 5);
        let busy = queue.request(1);
        let abandoned = queue.request(1);
        drop(abandoned);
        drop(busy);

        assert_eq!(queue.running(), 0);
        assert!(queue.request(1).is_ready());
    }
}
