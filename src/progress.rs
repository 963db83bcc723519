//! Console progress for a running transfer.
//!
//! Consumes the orchestrator's event bus and turns the events a user cares
//! about into one-line messages.

use core_runtime::events::{EventStream, RecvError, TransferEvent};
use tracing::warn;

/// Formats an event as a progress line, or `None` for events that are not
/// worth printing.
pub fn progress_line(event: &TransferEvent) -> Option<String> {
    match event {
        TransferEvent::Started { run_id, roots } => Some(format!(
            "Run {} started: walking {}",
            run_id,
            roots
                .iter()
                .map(|r| if r.is_empty() { "/" } else { r.as_str() })
                .collect::<Vec<_>>()
                .join(", ")
        )),
        TransferEvent::IndexPageLoaded {
            page,
            fingerprints_total,
            has_more,
            ..
        } => Some(format!(
            "Indexed destination page {} ({} fingerprints{})",
            page,
            fingerprints_total,
            if *has_more { ", more to come" } else { "" }
        )),
        TransferEvent::PhotoCopied { path, .. } => Some(format!("Copied {}", path)),
        TransferEvent::Failed {
            message, copied, ..
        } => Some(format!("Failed after copying {}: {}", copied, message)),
        TransferEvent::PhotoSkipped { .. } | TransferEvent::Completed { .. } => None,
    }
}

/// Drains `stream` until every sender is gone, handing each printable
/// event to `sink`.
pub async fn report_progress<F>(mut stream: EventStream, mut sink: F)
where
    F: FnMut(String),
{
    loop {
        match stream.recv().await {
            Ok(event) => {
                if let Some(line) = progress_line(&event) {
                    sink(line);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "Progress reporter fell behind; some events were dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::{EventBus, EventSeverity, SkipReason};
    use std::sync::{Arc, Mutex};

    fn copied(path: &str) -> TransferEvent {
        TransferEvent::PhotoCopied {
            run_id: "run-1".to_string(),
            path: path.to_string(),
            fingerprint: Some("abc".to_string()),
            destination_id: "file-1".to_string(),
        }
    }

    #[test]
    fn test_progress_line() {
        let started = TransferEvent::Started {
            run_id: "run-1".to_string(),
            roots: vec!["/Photos".to_string(), String::new()],
        };
        assert_eq!(
            progress_line(&started).unwrap(),
            "Run run-1 started: walking /Photos, /"
        );
        assert_eq!(
            progress_line(&copied("/Photos/a.jpg")).unwrap(),
            "Copied /Photos/a.jpg"
        );

        let page = TransferEvent::IndexPageLoaded {
            run_id: "run-1".to_string(),
            page: 2,
            fingerprints_total: 150,
            has_more: true,
        };
        assert_eq!(
            progress_line(&page).unwrap(),
            "Indexed destination page 2 (150 fingerprints, more to come)"
        );

        let skipped = TransferEvent::PhotoSkipped {
            run_id: "run-1".to_string(),
            path: "/Photos/b.jpg".to_string(),
            fingerprint: None,
            reason: SkipReason::Unfingerprinted,
        };
        assert!(progress_line(&skipped).is_none());
    }

    #[tokio::test]
    async fn test_report_progress_until_bus_dropped() {
        let bus = EventBus::new(16);
        let stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Info);

        let lines = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&lines);
        let handle = tokio::spawn(report_progress(stream, move |line| {
            collected.lock().unwrap().push(line);
        }));

        bus.emit(TransferEvent::IndexPageLoaded {
            run_id: "run-1".to_string(),
            page: 1,
            fingerprints_total: 3,
            has_more: false,
        })
        .unwrap();
        bus.emit(copied("/Photos/a.jpg")).unwrap();
        bus.emit(TransferEvent::Failed {
            run_id: "run-1".to_string(),
            message: "upload rejected".to_string(),
            copied: 1,
        })
        .unwrap();
        drop(bus);

        handle.await.unwrap();
        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                "Copied /Photos/a.jpg".to_string(),
                "Failed after copying 1: upload rejected".to_string(),
            ]
        );
    }
}
