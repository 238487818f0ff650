use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use mstore_types::{FolderId, MessageId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A durable change to a top-level message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub folder: FolderId,
    pub message: MessageId,
    pub associated: bool,
    /// Generation after the change; the last generation for deletions.
    pub generation: u64,
}

/// Receiver of durable change events.
///
/// Called after the store has released its locks, so a sink may read the
/// store back.
pub trait ChangeSink: Send + Sync {
    fn notify(&self, event: &ChangeEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn notify(&self, _event: &ChangeEvent) {}
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Remove and return the events seen so far.
    pub fn take(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

impl ChangeSink for RecordingSink {
    fn notify(&self, event: &ChangeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order_and_drains() {
        let sink = RecordingSink::new();
        for (i, kind) in [ChangeKind::Created, ChangeKind::Modified].into_iter().enumerate() {
            sink.notify(&ChangeEvent {
                kind,
                folder: FolderId::from_parts(1, 1),
                message: MessageId::from_parts(1, 2),
                associated: false,
                generation: i as u64 + 1,
            });
        }
        let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Created, ChangeKind::Modified]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }
}
