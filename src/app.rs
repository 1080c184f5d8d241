use std::sync::Arc;

use ratatui::layout::Rect;

use crate::backend::{ChatBackend, ChatError, ChatReply};
use crate::config::Config;
use crate::view::{InputField, MessagePanel, SendButton};
use crate::widget::{ChatWidget, TurnHandle};

pub type TerminalWidget<B> = ChatWidget<B, MessagePanel, InputField, SendButton>;

pub struct App<B> {
    pub should_quit: bool,
    pub widget: TerminalWidget<B>,
    /// Backend call of the current turn, polled by the event loop.
    pub in_flight: Option<TurnHandle>,

    pub title: String,
    pub endpoint: String,
    pub typing_label: String,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub messages_area: Option<Rect>,
    pub send_area: Option<Rect>,
}

impl<B: ChatBackend + 'static> App<B> {
    pub fn new(backend: Arc<B>, config: &Config, endpoint: impl Into<String>) -> Self {
        let widget = ChatWidget::new(
            backend,
            MessagePanel::new(),
            InputField::new(),
            SendButton::default(),
            config.apology_message.clone(),
        );

        Self {
            should_quit: false,
            widget,
            in_flight: None,
            title: config.title.clone(),
            endpoint: endpoint.into(),
            typing_label: config.typing_label.clone(),
            animation_frame: 0,
            messages_area: None,
            send_area: None,
        }
    }

    /// Keep the handle of a freshly started turn, if any.
    pub fn track(&mut self, handle: Option<TurnHandle>) {
        if let Some(handle) = handle {
            self.in_flight = Some(handle);
        }
    }

    /// Resolves when the in-flight reply settles; never resolves when idle.
    pub async fn next_reply(&mut self) -> Result<Result<ChatReply, ChatError>, tokio::task::JoinError> {
        match self.in_flight.as_mut() {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    }

    pub fn settle(&mut self, joined: Result<Result<ChatReply, ChatError>, tokio::task::JoinError>) {
        self.in_flight = None;
        self.widget.complete_turn(joined);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.widget.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        } else {
            self.animation_frame = 0;
        }
    }

    pub fn status(&self) -> &'static str {
        if self.widget.is_waiting() {
            "Waiting"
        } else {
            "Ready"
        }
    }
}
