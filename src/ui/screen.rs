use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::dialogs::{Dialog, DialogKind};

/// The host surface dialogs are presented on.
///
/// The screen owns its dialogs; everything else refers to it through a
/// [`ScreenHandle`] and must check it is still alive before touching the UI.
#[derive(Default)]
pub struct Screen {
    finishing: AtomicBool,
    dialogs: Mutex<Vec<Arc<Dialog>>>,
    notices: Mutex<Vec<String>>,
}

pub type ScreenHandle = Weak<Screen>;

impl Screen {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_finishing(&self) -> bool {
        self.finishing.load(Ordering::SeqCst)
    }

    /// Marks the screen as going away and drops every dialog it owns.
    pub fn finish(&self) {
        self.finishing.store(true, Ordering::SeqCst);
        let dialogs = std::mem::take(&mut *self.dialogs.lock());
        for dialog in &dialogs {
            dialog.dismiss();
        }
    }

    pub(crate) fn attach(&self, dialog: Arc<Dialog>) {
        self.dialogs.lock().push(dialog);
    }

    /// Dialogs currently on screen, oldest first.
    pub fn visible_dialogs(&self) -> Vec<Arc<Dialog>> {
        self.dialogs
            .lock()
            .iter()
            .filter(|d| d.is_showing())
            .cloned()
            .collect()
    }

    pub fn dialog(&self, kind: DialogKind) -> Option<Arc<Dialog>> {
        self.dialogs.lock().iter().rev().find(|d| d.kind() == kind).cloned()
    }

    pub fn is_showing(&self, kind: DialogKind) -> bool {
        self.dialog(kind).is_some_and(|d| d.is_showing())
    }

    pub fn toast(&self, message: impl Into<String>) {
        self.notices.lock().push(message.into());
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().clone()
    }

    pub fn dismiss_notices(&self) {
        self.notices.lock().clear();
    }
}
