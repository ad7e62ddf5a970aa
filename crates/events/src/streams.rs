//! Execution stream registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use runbook_core::exec::ExecutionEvent;

/// Bound on the executor-side channel; a script flooding stdout blocks
/// its own reader rather than growing memory.
const EXECUTOR_CHANNEL_CAPACITY: usize = 256;
/// Broadcast lag window for slow subscribers.
const BROADCAST_CAPACITY: usize = 256;

struct EntryState {
    replay: Vec<ExecutionEvent>,
    /// `None` once the execution has finished; dropping the sender ends
    /// every live receiver.
    sender: Option<broadcast::Sender<ExecutionEvent>>,
}

struct ExecutionEntry {
    state: Mutex<EntryState>,
    cancel: CancellationToken,
}

/// What a subscriber gets: the full history so far, and a live receiver
/// unless the execution already finished.
pub struct Subscription {
    pub replay: Vec<ExecutionEvent>,
    pub live: Option<broadcast::Receiver<ExecutionEvent>>,
}

/// Maps execution ids to their event streams. Entries stay around after
/// the execution finishes so reconnecting tabs can still replay; they
/// live until the process exits.
#[derive(Default)]
pub struct StreamRegistry {
    entries: Mutex<HashMap<Uuid, Arc<ExecutionEntry>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stream for a new execution. Returns the execution id
    /// and the sender the executor writes events into. A pump task
    /// appends each event to the replay log and fans it out; when the
    /// executor drops the sender the stream is marked finished.
    pub fn register(&self, cancel: CancellationToken) -> (Uuid, mpsc::Sender<ExecutionEvent>) {
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel::<ExecutionEvent>(EXECUTOR_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let entry = Arc::new(ExecutionEntry {
            state: Mutex::new(EntryState {
                replay: Vec::new(),
                sender: Some(broadcast_tx),
            }),
            cancel,
        });
        self.entries
            .lock()
            .expect("stream registry lock poisoned")
            .insert(id, Arc::clone(&entry));

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut state = entry.state.lock().expect("stream entry lock poisoned");
                state.replay.push(event.clone());
                if let Some(sender) = &state.sender {
                    // No receivers is fine; the replay log has it.
                    let _ = sender.send(event);
                }
            }
            let mut state = entry.state.lock().expect("stream entry lock poisoned");
            state.sender = None;
            tracing::debug!(execution_id = %id, events = state.replay.len(), "stream finished");
        });

        (id, tx)
    }

    /// Subscribes to an execution's stream. Replay and live receiver
    /// are taken under one lock, so the subscriber sees every event
    /// exactly once with no gap between history and live.
    pub fn subscribe(&self, id: &Uuid) -> Option<Subscription> {
        let entry = {
            let entries = self.entries.lock().expect("stream registry lock poisoned");
            entries.get(id).cloned()
        }?;
        let state = entry.state.lock().expect("stream entry lock poisoned");
        Some(Subscription {
            replay: state.replay.clone(),
            live: state.sender.as_ref().map(broadcast::Sender::subscribe),
        })
    }

    /// Fires the execution's cancellation token. Returns false for an
    /// unknown id.
    pub fn cancel(&self, id: &Uuid) -> bool {
        let entries = self.entries.lock().expect("stream registry lock poisoned");
        match entries.get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether the execution exists at all.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries
            .lock()
            .expect("stream registry lock poisoned")
            .contains_key(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use runbook_core::exec::ExecutionState;

    fn stdout(line: &str) -> ExecutionEvent {
        ExecutionEvent::Stdout {
            line: line.to_string(),
        }
    }

    async fn drain_until_finished(registry: &StreamRegistry, id: &Uuid, expected: usize) {
        // The pump task runs concurrently; wait for it to retire.
        for _ in 0..100 {
            if let Some(sub) = registry.subscribe(id) {
                if sub.live.is_none() && sub.replay.len() == expected {
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("stream never finished");
    }

    #[tokio::test]
    async fn late_subscriber_gets_full_replay() {
        let registry = StreamRegistry::new();
        let (id, tx) = registry.register(CancellationToken::new());

        tx.send(stdout("one")).await.expect("send");
        tx.send(stdout("two")).await.expect("send");
        drop(tx);
        drain_until_finished(&registry, &id, 2).await;

        let sub = registry.subscribe(&id).expect("subscription");
        assert_eq!(sub.replay.len(), 2);
        assert!(sub.live.is_none(), "finished stream has no live side");
        assert_matches!(&sub.replay[0], ExecutionEvent::Stdout { line } if line == "one");
    }

    #[tokio::test]
    async fn live_subscriber_receives_events_as_they_happen() {
        let registry = StreamRegistry::new();
        let (id, tx) = registry.register(CancellationToken::new());

        tx.send(stdout("early")).await.expect("send");
        // Give the pump a moment to log the first event.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let sub = registry.subscribe(&id).expect("subscription");
        assert_eq!(sub.replay.len(), 1);
        let mut live = sub.live.expect("running stream has a live side");

        tx.send(stdout("late")).await.expect("send");
        let event = live.recv().await.expect("live event");
        assert_matches!(event, ExecutionEvent::Stdout { line } if line == "late");

        drop(tx);
        assert_matches!(
            live.recv().await,
            Err(broadcast::error::RecvError::Closed)
        );
    }

    #[tokio::test]
    async fn cancel_fires_the_token() {
        let registry = StreamRegistry::new();
        let token = CancellationToken::new();
        let (id, _tx) = registry.register(token.clone());

        assert!(!token.is_cancelled());
        assert!(registry.cancel(&id));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn unknown_id_has_no_subscription() {
        let registry = StreamRegistry::new();
        assert!(registry.subscribe(&Uuid::new_v4()).is_none());
        assert!(!registry.contains(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn status_events_flow_through() {
        let registry = StreamRegistry::new();
        let (id, tx) = registry.register(CancellationToken::new());
        tx.send(ExecutionEvent::Status {
            state: ExecutionState::Running,
        })
        .await
        .expect("send");
        drop(tx);
        drain_until_finished(&registry, &id, 1).await;

        let sub = registry.subscribe(&id).expect("subscription");
        assert_matches!(
            sub.replay[0],
            ExecutionEvent::Status {
                state: ExecutionState::Running
            }
        );
    }
}
