use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{TaskHandle, UpdateEvent};
use crate::host::CompletionObserver;

/// Forwards the host's "download finished" notification onto the
/// orchestrator's event channel. Matching against the current task happens on
/// the receiving side.
pub struct CompletionListener {
    events: UnboundedSender<UpdateEvent>,
}

impl CompletionListener {
    pub fn new(events: UnboundedSender<UpdateEvent>) -> Self {
        Self { events }
    }
}

impl CompletionObserver for CompletionListener {
    fn on_download_complete(&self, handle: TaskHandle) {
        if self.events.send(UpdateEvent::DownloadComplete(handle)).is_err() {
            log::debug!("Completion of {} arrived after the orchestrator closed", handle);
        }
    }
}
