//! Audio thread to message thread hand-off.
//!
//! The audio thread must never block on, or allocate for, the consumers of
//! what it produces. A bridge splits the work in two:
//!
//! - The [`BridgeSender`] (audio side) appends items to a pending list under a
//!   short lock that only the receiver's buffer swap ever contends, then
//!   requests a notification. Repeated requests before the receiver wakes up
//!   collapse into a single wakeup.
//! - The [`BridgeReceiver`] (message side) swaps the pending list with its own
//!   empty scratch list under the lock, releases the lock, and only then hands
//!   each item to its listeners, in registration order.
//!
//! The pending list is bounded by the capacity given to [`channel()`] and
//! never reallocates. Items that arrive while it is full are dropped and
//! counted ([`BridgeReceiver::dropped()`]); [`BridgeSender::try_send()`]
//! hands a rejected item back instead. Every accepted item is delivered
//! exactly once, in send order.
//!
//! ```rust
//! use tandem_graph::bridge;
//!
//! let (tx, mut rx) = bridge::channel::<u32>(16);
//! let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! rx.add_listener(move |v: &u32| sink.lock().push(*v));
//!
//! tx.send(1);
//! tx.send(2);
//! assert_eq!(rx.dispatch_pending(), 2);
//! assert_eq!(*seen.lock(), vec![1, 2]);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;

/// Receives items delivered on the message thread.
pub trait BridgeListener<T>: Send {
    /// Called once per item, outside any lock.
    fn on_event(&mut self, item: &T);
}

impl<T, F> BridgeListener<T> for F
where
    F: FnMut(&T) + Send,
{
    fn on_event(&mut self, item: &T) {
        self(item);
    }
}

/// Handle returned by [`BridgeReceiver::add_listener()`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Coalescing wakeup: any number of requests between two
/// [`acknowledge()`](Self::acknowledge) calls produce one wakeup.
struct AsyncNotifier {
    requested: AtomicBool,
    wake_tx: Sender<()>,
}

impl AsyncNotifier {
    fn request(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            // Capacity 1: a full channel already holds the wakeup.
            let _ = self.wake_tx.try_send(());
        }
    }

    fn acknowledge(&self) {
        self.requested.store(false, Ordering::Release);
    }
}

struct Shared<T> {
    pending: Mutex<Vec<T>>,
    capacity: usize,
    dropped: AtomicUsize,
    notifier: AsyncNotifier,
}

/// Audio-thread end of a bridge.
pub struct BridgeSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BridgeSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Message-thread end of a bridge.
pub struct BridgeReceiver<T> {
    shared: Arc<Shared<T>>,
    wake_rx: Receiver<()>,
    scratch: Vec<T>,
    listeners: Vec<(ListenerId, Box<dyn BridgeListener<T>>)>,
    next_listener: u64,
}

/// Creates a bridge that holds at most `capacity` undelivered items.
pub fn channel<T: Send>(capacity: usize) -> (BridgeSender<T>, BridgeReceiver<T>) {
    let (wake_tx, wake_rx) = bounded(1);
    let shared = Arc::new(Shared {
        pending: Mutex::new(Vec::with_capacity(capacity)),
        capacity,
        dropped: AtomicUsize::new(0),
        notifier: AsyncNotifier {
            requested: AtomicBool::new(false),
            wake_tx,
        },
    });
    (
        BridgeSender {
            shared: Arc::clone(&shared),
        },
        BridgeReceiver {
            shared,
            wake_rx,
            scratch: Vec::with_capacity(capacity),
            listeners: Vec::new(),
            next_listener: 0,
        },
    )
}

impl<T> BridgeSender<T> {
    /// Queues one item and requests delivery.
    ///
    /// Returns the item if the pending list is full.
    pub fn try_send(&self, item: T) -> Result<(), T> {
        {
            let mut pending = self.shared.pending.lock();
            if pending.len() >= self.shared.capacity {
                return Err(item);
            }
            pending.push(item);
        }
        self.shared.notifier.request();
        Ok(())
    }

    /// Queues one item and requests delivery, dropping it if the pending
    /// list is full. Returns true if the item was queued.
    pub fn send(&self, item: T) -> bool {
        let queued = self.try_send(item).is_ok();
        if !queued {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    /// Queues several items under one lock and requests delivery once.
    ///
    /// Items past the free space are dropped. Returns the number queued.
    pub fn send_all<I: IntoIterator<Item = T>>(&self, items: I) -> usize {
        let mut items = items.into_iter();
        let queued = {
            let mut pending = self.shared.pending.lock();
            let room = self.shared.capacity.saturating_sub(pending.len());
            let before = pending.len();
            pending.extend(items.by_ref().take(room));
            pending.len() - before
        };
        let overflow = items.count();
        if overflow > 0 {
            self.shared.dropped.fetch_add(overflow, Ordering::Relaxed);
        }
        if queued > 0 {
            self.shared.notifier.request();
        }
        queued
    }

    /// Returns the most items the bridge holds undelivered.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<T> BridgeReceiver<T> {
    /// Registers a listener. Listeners are called in registration order.
    pub fn add_listener<L: BridgeListener<T> + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregisters a listener. Returns false if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers everything queued so far. Never blocks on the audio thread
    /// beyond the buffer swap. Returns the number of items delivered.
    pub fn dispatch_pending(&mut self) -> usize {
        // Drain, then acknowledge, then swap: any send after the swap raises a
        // fresh wakeup into an empty channel.
        while self.wake_rx.try_recv().is_ok() {}
        self.shared.notifier.acknowledge();

        {
            let mut pending = self.shared.pending.lock();
            core::mem::swap(&mut *pending, &mut self.scratch);
        }

        let count = self.scratch.len();
        for item in &self.scratch {
            for (_, listener) in &mut self.listeners {
                listener.on_event(item);
            }
        }
        self.scratch.clear();
        count
    }

    /// Waits up to `timeout` for a wakeup, then delivers everything queued.
    ///
    /// Returns the number of items delivered, 0 on timeout.
    pub fn wait_and_dispatch(&mut self, timeout: Duration) -> usize {
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) => self.dispatch_pending(),
            Err(_) => 0,
        }
    }

    /// Returns true if a wakeup is outstanding.
    pub fn has_pending(&self) -> bool {
        self.shared.notifier.requested.load(Ordering::Acquire)
    }

    /// Returns how many items were dropped because the bridge was full.
    pub fn dropped(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
