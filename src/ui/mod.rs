pub mod dialogs;
pub mod screen;
pub mod strings;

pub use dialogs::{
    Dialog, DialogAction, DialogButton, DialogKind, DialogPresenter, DialogSpec, ProgressView,
};
pub use screen::{Screen, ScreenHandle};

use iced::{
    widget::{button, column, container, progress_bar, text, Column, Row, Space},
    Color, Element, Length,
};

const DE_EMPHASIZED: Color = Color::from_rgb(0.6, 0.6, 0.6);

/// Main view state
pub struct UpdateView {
    pub status_message: String,
}

impl Default for UpdateView {
    fn default() -> Self {
        Self {
            status_message: "Press the button to check for a new version".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ViewMessage {
    CheckPressed,
    Dialog(DialogAction),
    DismissNotices,
}

impl UpdateView {
    pub fn view(&self, screen: &Screen) -> Element<'_, ViewMessage> {
        let mut content = column![
            text("App Update Manager").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text(&self.status_message).size(14),
            Space::new().height(Length::Fixed(20.0)),
            button("Check for updates")
                .on_press(ViewMessage::CheckPressed)
                .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10);

        let notices = screen.notices();
        if !notices.is_empty() {
            for notice in notices {
                content = content.push(text(notice).size(14).color(DE_EMPHASIZED));
            }
            content = content.push(button("OK").on_press(ViewMessage::DismissNotices));
        }

        // Dialogs stack below the main controls, newest last.
        for dialog in screen.visible_dialogs() {
            content = content.push(dialog_card(&dialog));
        }

        content.into()
    }
}

fn dialog_card<'a>(dialog: &Dialog) -> Element<'a, ViewMessage> {
    let kind = dialog.kind();
    let mut body = Column::new()
        .spacing(10)
        .push(text(dialog.title().to_string()).size(20));

    let message = dialog.message();
    if !message.is_empty() {
        body = body.push(text(message).size(14));
    }

    if let Some(progress) = dialog.progress() {
        body = body
            .push(progress_bar(0.0..=100.0, f32::from(progress.percent)))
            .push(
                Row::new()
                    .push(text(progress.downloaded_label).size(14))
                    .push(text(progress.total_label).size(14).color(DE_EMPHASIZED)),
            );
    }

    let mut buttons = Row::new().spacing(10);
    if let Some(label) = dialog.negative() {
        buttons = buttons.push(
            button(label)
                .on_press(ViewMessage::Dialog(DialogAction::negative(kind)))
                .padding([6, 16]),
        );
    }
    if let Some(label) = dialog.positive() {
        buttons = buttons.push(
            button(label)
                .on_press(ViewMessage::Dialog(DialogAction::positive(kind)))
                .padding([6, 16]),
        );
    }

    container(body.push(buttons))
        .padding(20)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}
