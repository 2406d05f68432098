use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::utils::{format_file_size, progress_percent};

use super::screen::{Screen, ScreenHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogKind {
    Confirm,
    Progress,
    Retry,
    Install,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogButton {
    Positive,
    Negative,
}

/// A button press on one of the update dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogAction {
    pub kind: DialogKind,
    pub button: DialogButton,
}

impl DialogAction {
    pub fn positive(kind: DialogKind) -> Self {
        Self {
            kind,
            button: DialogButton::Positive,
        }
    }

    pub fn negative(kind: DialogKind) -> Self {
        Self {
            kind,
            button: DialogButton::Negative,
        }
    }
}

/// Progress bar value plus the "X/Y" byte label. The "/Y" part is kept
/// separate so it can be rendered de-emphasised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub percent: u8,
    pub downloaded_label: String,
    pub total_label: String,
}

impl ProgressView {
    pub fn new(bytes: i64, total: i64) -> Self {
        Self {
            percent: progress_percent(bytes, total),
            downloaded_label: format_file_size(bytes),
            total_label: format!("/{}", format_file_size(total)),
        }
    }

    pub fn label(&self) -> String {
        format!("{}{}", self.downloaded_label, self.total_label)
    }
}

/// Static content of a dialog, used when it is first built.
pub struct DialogSpec {
    pub title: String,
    pub message: String,
    pub positive: Option<&'static str>,
    pub negative: Option<&'static str>,
}

pub struct Dialog {
    kind: DialogKind,
    title: String,
    message: Mutex<String>,
    positive: Option<&'static str>,
    negative: Option<&'static str>,
    showing: AtomicBool,
    progress: Mutex<Option<ProgressView>>,
}

impl Dialog {
    fn new(kind: DialogKind, content: DialogSpec) -> Self {
        Self {
            kind,
            title: content.title,
            message: Mutex::new(content.message),
            positive: content.positive,
            negative: content.negative,
            showing: AtomicBool::new(false),
            progress: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> DialogKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> String {
        self.message.lock().clone()
    }

    pub fn positive(&self) -> Option<&'static str> {
        self.positive
    }

    pub fn negative(&self) -> Option<&'static str> {
        self.negative
    }

    pub fn progress(&self) -> Option<ProgressView> {
        self.progress.lock().clone()
    }

    pub fn is_showing(&self) -> bool {
        self.showing.load(Ordering::SeqCst)
    }

    fn show(&self) {
        self.showing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn dismiss(&self) {
        self.showing.store(false, Ordering::SeqCst);
    }
}

/// Presents the update dialogs on a screen it does not own.
///
/// Each kind is built at most once and cached weakly; the screen holds the
/// only strong reference. Nothing is shown once the screen is gone or
/// finishing.
pub struct DialogPresenter {
    screen: ScreenHandle,
    cache: HashMap<DialogKind, Weak<Dialog>>,
}

impl DialogPresenter {
    pub fn new(screen: ScreenHandle) -> Self {
        Self {
            screen,
            cache: HashMap::new(),
        }
    }

    pub fn screen(&self) -> ScreenHandle {
        self.screen.clone()
    }

    pub fn live_screen(&self) -> Option<Arc<Screen>> {
        live(&self.screen)
    }

    fn obtain(&mut self, kind: DialogKind, build: impl FnOnce() -> DialogSpec) -> Option<Arc<Dialog>> {
        let screen = self.live_screen()?;
        if let Some(dialog) = self.cache.get(&kind).and_then(Weak::upgrade) {
            return Some(dialog);
        }
        let dialog = Arc::new(Dialog::new(kind, build()));
        screen.attach(dialog.clone());
        self.cache.insert(kind, Arc::downgrade(&dialog));
        Some(dialog)
    }

    pub fn show(&mut self, kind: DialogKind, build: impl FnOnce() -> DialogSpec) -> bool {
        match self.obtain(kind, build) {
            Some(dialog) => {
                dialog.show();
                true
            }
            None => false,
        }
    }

    /// Shows a dialog whose body changes between presentations.
    pub fn show_message(
        &mut self,
        kind: DialogKind,
        message: &str,
        build: impl FnOnce() -> DialogSpec,
    ) -> bool {
        match self.obtain(kind, build) {
            Some(dialog) => {
                *dialog.message.lock() = message.to_string();
                dialog.show();
                true
            }
            None => false,
        }
    }

    pub fn show_progress(&mut self, view: ProgressView, build: impl FnOnce() -> DialogSpec) -> bool {
        match self.obtain(DialogKind::Progress, build) {
            Some(dialog) => {
                *dialog.progress.lock() = Some(view);
                dialog.show();
                true
            }
            None => false,
        }
    }

    pub fn dismiss(&self, kind: DialogKind) {
        if self.live_screen().is_none() {
            return;
        }
        if let Some(dialog) = self.cache.get(&kind).and_then(Weak::upgrade) {
            dialog.dismiss();
        }
    }

    pub fn is_showing(&self, kind: DialogKind) -> bool {
        self.cache
            .get(&kind)
            .and_then(Weak::upgrade)
            .is_some_and(|d| d.is_showing())
    }

    pub fn toast(&self, message: &str) {
        if let Some(screen) = self.live_screen() {
            screen.toast(message);
        }
    }

    /// Dismisses every dialog this presenter created and forgets them.
    pub fn clear(&mut self) {
        for dialog in self.cache.values().filter_map(Weak::upgrade) {
            dialog.dismiss();
        }
        self.cache.clear();
    }
}

/// Upgrades the handle, treating a finishing screen as already gone.
pub fn live(screen: &ScreenHandle) -> Option<Arc<Screen>> {
    screen.upgrade().filter(|s| !s.is_finishing())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dialog() -> DialogSpec {
        DialogSpec {
            title: "title".to_string(),
            message: "message".to_string(),
            positive: Some("OK"),
            negative: None,
        }
    }

    #[test]
    fn test_dialog_is_built_once_and_reused() {
        let screen = Screen::new();
        let mut presenter = DialogPresenter::new(Arc::downgrade(&screen));

        assert!(presenter.show(DialogKind::Confirm, sample_dialog));
        let first = screen.dialog(DialogKind::Confirm).unwrap();
        presenter.dismiss(DialogKind::Confirm);
        assert!(!screen.is_showing(DialogKind::Confirm));

        assert!(presenter.show(DialogKind::Confirm, || panic!("must reuse cached dialog")));
        let second = screen.dialog(DialogKind::Confirm).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(screen.is_showing(DialogKind::Confirm));
    }

    #[test]
    fn test_no_op_when_screen_is_gone() {
        let screen = Screen::new();
        let mut presenter = DialogPresenter::new(Arc::downgrade(&screen));
        drop(screen);

        assert!(!presenter.show(DialogKind::Retry, sample_dialog));
        assert!(!presenter.is_showing(DialogKind::Retry));
        presenter.dismiss(DialogKind::Retry);
        presenter.toast("ignored");
    }

    #[test]
    fn test_no_op_when_screen_is_finishing() {
        let screen = Screen::new();
        let mut presenter = DialogPresenter::new(Arc::downgrade(&screen));
        presenter.show(DialogKind::Install, sample_dialog);
        screen.finish();

        assert!(!presenter.show(DialogKind::Install, sample_dialog));
        assert!(screen.visible_dialogs().is_empty());
    }

    #[test]
    fn test_message_refreshes_on_each_show() {
        let screen = Screen::new();
        let mut presenter = DialogPresenter::new(Arc::downgrade(&screen));
        presenter.show_message(DialogKind::Retry, "first", sample_dialog);
        presenter.show_message(DialogKind::Retry, "second", sample_dialog);
        assert_eq!(screen.dialog(DialogKind::Retry).unwrap().message(), "second");
    }

    #[test]
    fn test_progress_view_labels() {
        let view = ProgressView::new(512, 2048);
        assert_eq!(view.percent, 25);
        assert_eq!(view.label(), "512 B/2.00 KB");

        let unknown = ProgressView::new(-1, 2048);
        assert_eq!(unknown.percent, 0);
        assert_eq!(unknown.downloaded_label, "--");
        assert_eq!(unknown.total_label, "/2.00 KB");
    }

    #[test]
    fn test_clear_dismisses_everything() {
        let screen = Screen::new();
        let mut presenter = DialogPresenter::new(Arc::downgrade(&screen));
        presenter.show(DialogKind::Confirm, sample_dialog);
        presenter.show_progress(ProgressView::new(1, 2), sample_dialog);
        assert_eq!(screen.visible_dialogs().len(), 2);

        presenter.clear();
        presenter.clear();
        assert!(screen.visible_dialogs().is_empty());
    }
}
