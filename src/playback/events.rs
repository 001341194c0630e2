use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::SUBSCRIBER_CHAN_SIZE;
use crate::errors::PlaybackError;
use crate::types::{PlaybackState, SessionId};

type SubscriberMap = HashMap<SessionId, HashMap<u64, Listener>>;

/// Newest state that did not fit a lagging listener's queue.
type LatestSlot = Arc<Mutex<Option<PlaybackState>>>;

/// Fans state changes out to the listeners of each session.
///
/// Delivery never blocks: each listener has its own bounded queue. Once a
/// queue is full, further updates collapse into a single latest-state slot
/// that the listener reads after draining, so it always ends on the
/// committed state.
#[derive(Debug, Default)]
pub struct NotificationHub {
    subscribers: Mutex<SubscriberMap>,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct Listener {
    sender: mpsc::Sender<PlaybackState>,
    latest: LatestSlot,
}

enum Offer {
    Queued,
    Lagged,
    Coalesced,
    Closed,
}

impl Listener {
    fn offer(&self, state: &PlaybackState) -> Offer {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.is_some() {
            if self.sender.is_closed() {
                return Offer::Closed;
            }
            *latest = Some(state.clone());
            return Offer::Coalesced;
        }
        match self.sender.try_send(state.clone()) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(state)) => {
                *latest = Some(state);
                Offer::Lagged
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

/// Live feed of one session's state. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    session_id: SessionId,
    receiver: mpsc::Receiver<PlaybackState>,
    latest: LatestSlot,
    hub: Weak<NotificationHub>,
}

impl NotificationHub {
    pub fn new() -> Arc<Self> {
        Arc::new(NotificationHub::default())
    }

    fn lock_subscribers(&self) -> Result<MutexGuard<'_, SubscriberMap>, PlaybackError> {
        self.subscribers
            .lock()
            .map_err(|e| PlaybackError::LockError(format!("subscriber registry: {}", e)))
    }

    /// Registers a listener and queues `current` as its first delivery.
    pub fn subscribe(
        self: &Arc<Self>,
        session_id: &SessionId,
        current: &PlaybackState,
    ) -> Result<Subscription, PlaybackError> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CHAN_SIZE);
        // Fresh channel with spare capacity, cannot fail.
        let _ = sender.try_send(current.clone());
        let latest = LatestSlot::default();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Listener {
            sender,
            latest: latest.clone(),
        };
        self.lock_subscribers()?
            .entry(session_id.clone())
            .or_default()
            .insert(id, listener);
        log::debug!("Hub: subscriber {} joined session '{}'", id, session_id);

        Ok(Subscription {
            id,
            session_id: session_id.clone(),
            receiver,
            latest,
            hub: Arc::downgrade(self),
        })
    }

    /// Delivers `state` to every listener of the session and returns how many
    /// accepted it. Closed listeners are pruned.
    pub fn publish(
        &self,
        session_id: &SessionId,
        state: &PlaybackState,
    ) -> Result<usize, PlaybackError> {
        let mut subscribers = self.lock_subscribers()?;
        let Some(listeners) = subscribers.get_mut(session_id) else {
            return Ok(0);
        };

        let mut delivered = 0;
        listeners.retain(|id, listener| match listener.offer(state) {
            Offer::Queued | Offer::Coalesced => {
                delivered += 1;
                true
            }
            Offer::Lagged => {
                log::warn!(
                    "Hub: subscriber {} of session '{}' is lagging, keeping only its latest update",
                    id,
                    session_id
                );
                delivered += 1;
                true
            }
            Offer::Closed => {
                log::debug!("Hub: pruning closed subscriber {} of session '{}'", id, session_id);
                false
            }
        });
        if listeners.is_empty() {
            subscribers.remove(session_id);
        }
        Ok(delivered)
    }

    /// Removes the listener behind `subscription`. Calling it again is a no-op.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.remove(&subscription.session_id, subscription.id);
    }

    fn remove(&self, session_id: &SessionId, id: u64) {
        let mut subscribers = match self.lock_subscribers() {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("Hub: cannot unsubscribe {}: {}", id, e);
                return;
            }
        };
        if let Some(listeners) = subscribers.get_mut(session_id) {
            if listeners.remove(&id).is_some() {
                log::debug!("Hub: subscriber {} left session '{}'", id, session_id);
            }
            if listeners.is_empty() {
                subscribers.remove(session_id);
            }
        }
    }

    /// Drops every listener of the session; their feeds end after draining.
    pub fn close_session(&self, session_id: &SessionId) -> Result<(), PlaybackError> {
        if let Some(listeners) = self.lock_subscribers()?.remove(session_id) {
            log::info!(
                "Hub: closed {} subscriber(s) of session '{}'",
                listeners.len(),
                session_id
            );
        }
        Ok(())
    }

    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.lock_subscribers()
            .map(|subscribers| subscribers.get(session_id).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

impl Subscription {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Next state for this listener, `None` once it is unsubscribed or the
    /// session has ended and everything pending is drained.
    pub async fn recv(&mut self) -> Option<PlaybackState> {
        if let Some(state) = self.try_recv() {
            return Some(state);
        }
        match self.receiver.recv().await {
            Some(state) => Some(state),
            None => self.take_latest(),
        }
    }

    /// Queued states come first; the coalesced slot only holds what arrived
    /// after the queue filled, so it is read once the queue is empty.
    pub fn try_recv(&mut self) -> Option<PlaybackState> {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        match self.receiver.try_recv() {
            Ok(state) => Some(state),
            Err(_) => latest.take(),
        }
    }

    fn take_latest(&mut self) -> Option<PlaybackState> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self);
        }
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.session_id, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> SessionId {
        SessionId::parse(name).unwrap()
    }

    fn state_at(current_time: f64) -> PlaybackState {
        let mut state = PlaybackState::new(180.0).unwrap();
        state.current_time = current_time;
        state
    }

    #[tokio::test]
    async fn new_subscriber_gets_current_state_first() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe(&session("a"), &state_at(42.0)).unwrap();
        assert_eq!(sub.recv().await.unwrap().current_time, 42.0);
    }

    #[tokio::test]
    async fn publish_reaches_only_that_session() {
        let hub = NotificationHub::new();
        let mut a1 = hub.subscribe(&session("a"), &state_at(0.0)).unwrap();
        let mut a2 = hub.subscribe(&session("a"), &state_at(0.0)).unwrap();
        let mut b = hub.subscribe(&session("b"), &state_at(0.0)).unwrap();
        for sub in [&mut a1, &mut a2, &mut b] {
            sub.recv().await.unwrap();
        }

        assert_eq!(hub.publish(&session("a"), &state_at(7.0)).unwrap(), 2);
        assert_eq!(a1.recv().await.unwrap().current_time, 7.0);
        assert_eq!(a2.recv().await.unwrap().current_time, 7.0);
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let hub = NotificationHub::new();
        let id = session("a");
        let mut sub = hub.subscribe(&id, &state_at(0.0)).unwrap();
        assert_eq!(hub.subscriber_count(&id), 1);

        hub.unsubscribe(&sub);
        hub.unsubscribe(&sub);
        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(&id), 0);
        assert_eq!(hub.publish(&id, &state_at(1.0)).unwrap(), 0);
    }

    #[tokio::test]
    async fn dropping_the_handle_unsubscribes() {
        let hub = NotificationHub::new();
        let id = session("a");
        let sub = hub.subscribe(&id, &state_at(0.0)).unwrap();
        drop(sub);
        assert_eq!(hub.subscriber_count(&id), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_others() {
        let hub = NotificationHub::new();
        let id = session("a");
        let _stalled = hub.subscribe(&id, &state_at(0.0)).unwrap();
        let mut live = hub.subscribe(&id, &state_at(0.0)).unwrap();

        for i in 0..(SUBSCRIBER_CHAN_SIZE * 2) {
            hub.publish(&id, &state_at(i as f64 % 180.0)).unwrap();
            live.recv().await.unwrap();
        }
        assert_eq!(hub.subscriber_count(&id), 2);
    }

    #[tokio::test]
    async fn lagging_subscriber_ends_on_the_latest_state() {
        let hub = NotificationHub::new();
        let id = session("a");
        let mut sub = hub.subscribe(&id, &state_at(0.0)).unwrap();

        let last = (SUBSCRIBER_CHAN_SIZE * 2) as f64;
        for i in 1..=(SUBSCRIBER_CHAN_SIZE * 2) {
            assert_eq!(hub.publish(&id, &state_at(i as f64)).unwrap(), 1);
        }

        let mut seen = Vec::new();
        while let Some(state) = sub.try_recv() {
            seen.push(state.current_time);
        }
        // Full queue in order, then only the newest state.
        assert_eq!(seen.len(), SUBSCRIBER_CHAN_SIZE + 1);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(seen.last(), Some(&last));

        hub.publish(&id, &state_at(7.0)).unwrap();
        assert_eq!(sub.recv().await.unwrap().current_time, 7.0);
    }

    #[tokio::test]
    async fn closed_session_still_yields_the_coalesced_state() {
        let hub = NotificationHub::new();
        let id = session("a");
        let mut sub = hub.subscribe(&id, &state_at(0.0)).unwrap();
        for i in 1..=(SUBSCRIBER_CHAN_SIZE + 5) {
            hub.publish(&id, &state_at(i as f64)).unwrap();
        }
        hub.close_session(&id).unwrap();

        let mut last = None;
        while let Some(state) = sub.recv().await {
            last = Some(state.current_time);
        }
        assert_eq!(last, Some((SUBSCRIBER_CHAN_SIZE + 5) as f64));
    }

    #[tokio::test]
    async fn closing_a_session_ends_its_feeds() {
        let hub = NotificationHub::new();
        let id = session("a");
        let mut sub = hub.subscribe(&id, &state_at(3.0)).unwrap();
        hub.close_session(&id).unwrap();

        assert_eq!(sub.recv().await.unwrap().current_time, 3.0);
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.subscriber_count(&id), 0);
    }
}
