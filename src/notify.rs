use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::domain::{DataFormat, ProcessingStatus};

/// Emitted on every successful record creation and status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub upload_id: String,
    pub status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_format: Option<DataFormat>,
}

/// Delivery target for status events. Notification is best-effort: a failed
/// delivery is logged and never fails the pipeline operation that caused it.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Discards every event. Used when no consumer is attached.
pub struct NopNotifier;

impl Notifier for NopNotifier {
    fn notify(&self, _event: StatusEvent) {}
}

/// Forwards events over an in-process channel to whatever consumer holds the
/// receiving end.
pub struct ChannelNotifier {
    sender: Sender<StatusEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<StatusEvent>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: StatusEvent) {
        if let Err(err) = self.sender.send(event) {
            tracing::warn!(%err, "status event dropped, consumer is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn event(status: ProcessingStatus) -> StatusEvent {
        StatusEvent {
            upload_id: "u1_x.vcf".to_string(),
            status,
            detected_format: Some(DataFormat::Vcf),
        }
    }

    #[test]
    fn channel_notifier_delivers() {
        let (tx, rx) = mpsc::channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.notify(event(ProcessingStatus::Queued));
        let received = rx.recv().unwrap();
        assert_eq!(received.status, ProcessingStatus::Queued);
        assert_eq!(received.detected_format, Some(DataFormat::Vcf));
    }

    #[test]
    fn channel_notifier_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let notifier = ChannelNotifier::new(tx);
        notifier.notify(event(ProcessingStatus::Processing));
    }

    #[test]
    fn event_serializes_with_contract_field_names() {
        let json = serde_json::to_value(event(ProcessingStatus::Completed)).unwrap();
        assert_eq!(json["uploadId"], "u1_x.vcf");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["detectedFormat"], "vcf");
    }
}
