// src/sink.rs
use crate::types::{EventKind, ResolutionRecord, ScanEvent};
use log::debug;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Clone)]
enum Channel {
    Direct(mpsc::UnboundedSender<ScanEvent>),
    Broadcast(broadcast::Sender<ScanEvent>),
}

/// Where a scan reports its records and errors. Every event is tagged with
/// the scan's correlation id so multiplexed scans stay distinguishable.
#[derive(Debug, Clone)]
pub struct EventSink {
    channel: Channel,
    sync_id: Option<String>,
}

impl EventSink {
    /// Sink feeding a single consumer, e.g. the console printer.
    pub fn direct(sync_id: Option<String>) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                channel: Channel::Direct(tx),
                sync_id,
            },
            rx,
        )
    }

    /// Sink publishing onto a stream shared with other scans.
    pub fn broadcast(tx: broadcast::Sender<ScanEvent>, sync_id: Option<String>) -> Self {
        Self {
            channel: Channel::Broadcast(tx),
            sync_id,
        }
    }

    pub fn record(&self, record: ResolutionRecord) {
        self.emit(EventKind::Domain(record));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(EventKind::Error(message.into()));
    }

    pub fn done(&self) {
        self.emit(EventKind::Done);
    }

    fn emit(&self, kind: EventKind) {
        let event = ScanEvent {
            sync_id: self.sync_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
        };

        let delivered = match &self.channel {
            Channel::Direct(tx) => tx.send(event).is_ok(),
            Channel::Broadcast(tx) => tx.send(event).is_ok(),
        };
        if !delivered {
            debug!("No listener for scan events, event dropped");
        }
    }
}
