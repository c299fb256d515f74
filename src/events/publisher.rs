use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::{Event, EventPayload};
use crate::config::EventsConfig;

struct EventLog {
    next_seq: u64,
    buffer: VecDeque<Event>,
    capacity: usize,
}

/// Fan-out of events to observers.
///
/// Each `publish` stamps the next sequence number, appends to a bounded
/// replay buffer for pull consumers and broadcasts to push subscribers.
/// Callers publish from inside the critical section that produced the event
/// so that per-job and per-finding order is preserved.
#[derive(Clone)]
pub struct EventPublisher {
    log: Arc<Mutex<EventLog>>,
    tx: broadcast::Sender<Event>,
}

impl EventPublisher {
    pub fn new(config: &EventsConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            log: Arc::new(Mutex::new(EventLog {
                next_seq: 1,
                buffer: VecDeque::with_capacity(config.buffer_size.min(4096)),
                capacity: config.buffer_size.max(1),
            })),
            tx,
        }
    }

    pub fn publish(&self, payload: EventPayload) -> u64 {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        let seq = log.next_seq;
        log.next_seq += 1;

        let event = Event { payload, timestamp: Utc::now(), seq };
        debug!(seq, kind = event.payload.kind(), "Publishing event");

        if log.buffer.len() == log.capacity {
            log.buffer.pop_front();
        }
        log.buffer.push_back(event.clone());
        // No subscribers is fine; pull consumers still see the buffer.
        let _ = self.tx.send(event);
        seq
    }

    /// Buffered events with `seq > since`, oldest first. Events that have
    /// aged out of the buffer are gone; callers compare the first returned
    /// seq against `since + 1` to detect the gap.
    pub fn events_since(&self, since: u64, limit: Option<usize>) -> Vec<Event> {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.buffer
            .iter()
            .filter(|e| e.seq > since)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Sequence number of the most recent event, 0 when none.
    pub fn last_seq(&self) -> u64 {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.next_seq - 1
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobId;

    fn cancelled() -> EventPayload {
        EventPayload::JobCancelled { job_id: JobId::new(), project_id: "p".into() }
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let publisher = EventPublisher::new(&EventsConfig::default());
        assert_eq!(publisher.last_seq(), 0);
        assert_eq!(publisher.publish(cancelled()), 1);
        assert_eq!(publisher.publish(cancelled()), 2);
        assert_eq!(publisher.last_seq(), 2);
    }

    #[test]
    fn test_events_since_and_buffer_bound() {
        let publisher = EventPublisher::new(&EventsConfig { buffer_size: 3, broadcast_capacity: 8 });
        for _ in 0..5 {
            publisher.publish(cancelled());
        }
        let all: Vec<u64> = publisher.events_since(0, None).iter().map(|e| e.seq).collect();
        assert_eq!(all, vec![3, 4, 5]);
        let tail: Vec<u64> = publisher.events_since(4, None).iter().map(|e| e.seq).collect();
        assert_eq!(tail, vec![5]);
        assert_eq!(publisher.events_since(0, Some(1)).len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let publisher = EventPublisher::new(&EventsConfig::default());
        let mut rx = publisher.subscribe();
        publisher.publish(cancelled());
        publisher.publish(cancelled());
        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
    }
}
