//! The chat widget controller.
//!
//! `ChatWidget` owns the three UI handles it drives (a message container, a
//! text input and a send control) plus the input gate that keeps at most one
//! turn in flight. It knows nothing about terminals; the `view` module
//! provides the terminal handles and tests provide their own.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatError, ChatReply, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Bot,
}

/// A rendered conversation entry. Never mutated once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub origin: Origin,
    pub sources: Vec<Source>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::User,
            sources: Vec::new(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::Bot,
            sources: Vec::new(),
        }
    }

    fn from_reply(reply: ChatReply) -> Self {
        Self {
            text: reply.response,
            origin: Origin::Bot,
            sources: reply.sources,
        }
    }
}

/// Scrolling list of rendered messages with an optional pending indicator.
pub trait MessageContainer {
    fn append(&mut self, message: Message);
    /// Idempotent: at most one indicator is ever shown.
    fn show_pending(&mut self);
    fn hide_pending(&mut self);
    fn scroll_to_latest(&mut self);
    /// Drop rendered messages. The pending indicator is left alone.
    fn clear(&mut self);
}

pub trait TextInput {
    fn text(&self) -> &str;
    fn clear(&mut self);
}

pub trait SendControl {
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// Outcome of a spawned backend call, as seen by the host loop.
pub type TurnHandle = JoinHandle<Result<ChatReply, ChatError>>;

pub struct ChatWidget<B, L, I, S> {
    backend: Arc<B>,
    messages: L,
    input: I,
    send: S,
    /// True while a turn is in flight.
    gate: bool,
    apology: String,
}

impl<B, L, I, S> ChatWidget<B, L, I, S>
where
    B: ChatBackend,
    L: MessageContainer,
    I: TextInput,
    S: SendControl,
{
    pub fn new(backend: Arc<B>, messages: L, input: I, send: S, apology: impl Into<String>) -> Self {
        let mut widget = Self {
            backend,
            messages,
            input,
            send,
            gate: false,
            apology: apology.into(),
        };
        widget.on_input_changed();
        widget
    }

    pub fn is_waiting(&self) -> bool {
        self.gate
    }

    pub fn messages(&self) -> &L {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut L {
        &mut self.messages
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Edits through this handle must be followed by `on_input_changed`.
    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn send_control(&self) -> &S {
        &self.send
    }

    /// Enable the send control iff there is something to send and no turn
    /// is in flight.
    pub fn on_input_changed(&mut self) {
        let has_text = !self.input.text().trim().is_empty();
        self.send.set_enabled(has_text && !self.gate);
    }

    /// Synchronous half of a turn. Returns the text to send, or `None` when
    /// the input is blank or a turn is already in flight.
    pub fn start_turn(&mut self) -> Option<String> {
        if self.gate {
            debug!("submission ignored, a reply is still pending");
            return None;
        }

        let text = self.input.text().trim().to_string();
        if text.is_empty() {
            return None;
        }

        self.messages.append(Message::user(text.clone()));
        self.messages.scroll_to_latest();
        self.input.clear();

        self.gate = true;
        self.send.set_enabled(false);
        self.messages.show_pending();
        self.messages.scroll_to_latest();

        info!(chars = text.chars().count(), "turn started");
        Some(text)
    }

    /// Settling half of a turn. Appends exactly one bot message and releases
    /// the gate as its last step, whatever the outcome.
    pub fn finish_turn(&mut self, outcome: Result<ChatReply, ChatError>) {
        self.messages.hide_pending();

        let message = match outcome {
            Ok(reply) => {
                info!(sources = reply.sources.len(), "turn settled");
                Message::from_reply(reply)
            }
            Err(err) => {
                warn!(error = %err, "turn failed");
                Message::bot(self.apology.clone())
            }
        };
        self.messages.append(message);
        self.messages.scroll_to_latest();

        self.gate = false;
        self.send.set_enabled(true);
    }

    /// Run one whole turn inline.
    pub async fn submit_current_input(&mut self) {
        let Some(text) = self.start_turn() else {
            return;
        };
        let outcome = self.backend.send_chat(&text).await;
        self.finish_turn(outcome);
    }

    /// Start a turn and hand the backend call to a tokio task. The caller
    /// must pass the joined result to `complete_turn`.
    pub fn spawn_turn(&mut self) -> Option<TurnHandle>
    where
        B: 'static,
    {
        let text = self.start_turn()?;
        let backend = Arc::clone(&self.backend);
        Some(tokio::spawn(async move { backend.send_chat(&text).await }))
    }

    pub fn complete_turn(&mut self, joined: Result<Result<ChatReply, ChatError>, JoinError>) {
        let outcome = joined.unwrap_or_else(|err| Err(ChatError::unavailable(err)));
        self.finish_turn(outcome);
    }

    /// Pointer activation of the send control; suppressed while disabled.
    pub fn on_send_clicked(&mut self) -> Option<TurnHandle>
    where
        B: 'static,
    {
        if !self.send.is_enabled() {
            return None;
        }
        self.spawn_turn()
    }

    /// The commit key behaves like activating the send control.
    pub fn on_key_press(&mut self, key: CommitKey) -> Option<TurnHandle>
    where
        B: 'static,
    {
        match key {
            CommitKey::Enter => self.spawn_turn(),
            CommitKey::Other => None,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Keys the widget cares about. Everything other than Enter is editing and
/// belongs to the input handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKey {
    Enter,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const APOLOGY: &str = "দুঃখিত, একটি ত্রুটি হয়েছে। আবার চেষ্টা করুন।";

    #[derive(Default)]
    struct FakeList {
        messages: Vec<Message>,
        pending: bool,
        pending_shown: usize,
        // (messages, pending) at each scroll request
        scrolls: Vec<(usize, bool)>,
    }

    impl MessageContainer for FakeList {
        fn append(&mut self, message: Message) {
            self.messages.push(message);
        }
        fn show_pending(&mut self) {
            if !self.pending {
                self.pending_shown += 1;
            }
            self.pending = true;
        }
        fn hide_pending(&mut self) {
            self.pending = false;
        }
        fn scroll_to_latest(&mut self) {
            self.scrolls.push((self.messages.len(), self.pending));
        }
        fn clear(&mut self) {
            self.messages.clear();
        }
    }

    #[derive(Default)]
    struct FakeInput(String);

    impl TextInput for FakeInput {
        fn text(&self) -> &str {
            &self.0
        }
        fn clear(&mut self) {
            self.0.clear();
        }
    }

    #[derive(Default)]
    struct FakeButton {
        enabled: bool,
        enables: usize,
        disables: usize,
    }

    impl SendControl for FakeButton {
        fn set_enabled(&mut self, enabled: bool) {
            if enabled {
                self.enables += 1;
            } else {
                self.disables += 1;
            }
            self.enabled = enabled;
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    struct ScriptedBackend {
        reply: Result<String, String>,
        calls: Mutex<Vec<String>>,
        release: tokio::sync::Notify,
        hold: bool,
    }

    impl ScriptedBackend {
        fn answering(text: &str) -> Self {
            Self::new(Ok(text.to_string()), false)
        }

        fn failing() -> Self {
            Self::new(Err("connection refused".to_string()), false)
        }

        fn new(reply: Result<String, String>, hold: bool) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
                release: tokio::sync::Notify::new(),
                hold,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn send_chat(&self, message: &str) -> Result<ChatReply, ChatError> {
            self.calls.lock().unwrap().push(message.to_string());
            if self.hold {
                self.release.notified().await;
            }
            self.reply
                .clone()
                .map(ChatReply::text)
                .map_err(ChatError::BackendUnavailable)
        }
    }

    type TestWidget = ChatWidget<ScriptedBackend, FakeList, FakeInput, FakeButton>;

    fn widget(backend: ScriptedBackend, input: &str) -> (TestWidget, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let widget = ChatWidget::new(
            Arc::clone(&backend),
            FakeList::default(),
            FakeInput(input.to_string()),
            FakeButton::default(),
            APOLOGY,
        );
        (widget, backend)
    }

    fn rendered(widget: &TestWidget) -> Vec<(Origin, &str)> {
        widget
            .messages()
            .messages
            .iter()
            .map(|m| (m.origin, m.text.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn successful_turn_renders_user_then_bot() {
        let (mut widget, backend) = widget(ScriptedBackend::answering("কেমন আছেন?"), "হ্যালো");

        widget.submit_current_input().await;

        assert_eq!(
            rendered(&widget),
            vec![(Origin::User, "হ্যালো"), (Origin::Bot, "কেমন আছেন?")]
        );
        assert_eq!(widget.input().text(), "");
        assert!(!widget.is_waiting());
        assert!(!widget.messages().pending);
        assert_eq!(backend.calls(), vec!["হ্যালো".to_string()]);
    }

    #[tokio::test]
    async fn whitespace_input_is_a_no_op() {
        let (mut widget, backend) = widget(ScriptedBackend::answering("unused"), "   ");

        widget.submit_current_input().await;

        assert!(rendered(&widget).is_empty());
        assert!(!widget.is_waiting());
        assert!(backend.calls().is_empty());
        assert_eq!(widget.input().text(), "   ");
    }

    #[tokio::test]
    async fn failed_turn_renders_apology() {
        let (mut widget, _backend) = widget(ScriptedBackend::failing(), "test");

        widget.submit_current_input().await;

        assert_eq!(rendered(&widget), vec![(Origin::User, "test"), (Origin::Bot, APOLOGY)]);
        assert!(!widget.is_waiting());
        assert!(widget.send_control().is_enabled());
    }

    #[tokio::test]
    async fn input_is_trimmed_before_sending() {
        let (mut widget, backend) = widget(ScriptedBackend::answering("ok"), "  spaced out \n");

        widget.submit_current_input().await;

        assert_eq!(backend.calls(), vec!["spaced out".to_string()]);
        assert_eq!(rendered(&widget)[0], (Origin::User, "spaced out"));
    }

    #[tokio::test]
    async fn send_stays_disabled_until_settlement() {
        let (mut widget, backend) = widget(ScriptedBackend::new(Ok("later".to_string()), true), "হ্যালো");
        let enables_before = widget.send_control().enables;

        let handle = widget.spawn_turn().expect("turn should start");

        // User message is rendered and input cleared before the reply exists.
        assert_eq!(rendered(&widget), vec![(Origin::User, "হ্যালো")]);
        assert_eq!(widget.input().text(), "");
        assert!(widget.is_waiting());
        assert!(widget.messages().pending);
        assert!(!widget.send_control().is_enabled());

        // Typing while waiting must not re-enable the control.
        widget.input_mut().0.push_str("again");
        widget.on_input_changed();
        assert!(!widget.send_control().is_enabled());

        tokio::task::yield_now().await;
        assert!(!widget.send_control().is_enabled());

        backend.release.notify_one();
        widget.complete_turn(handle.await);

        assert!(!widget.is_waiting());
        assert!(!widget.messages().pending);
        assert!(widget.send_control().is_enabled());
        assert_eq!(widget.send_control().enables, enables_before + 1);
        assert_eq!(rendered(&widget).len(), 2);
    }

    #[tokio::test]
    async fn enter_while_waiting_does_not_start_another_turn() {
        let (mut widget, backend) = widget(ScriptedBackend::new(Ok("one".to_string()), true), "first");

        let handle = widget.on_key_press(CommitKey::Enter).expect("turn should start");
        widget.input_mut().0.push_str("second");

        assert!(widget.on_key_press(CommitKey::Enter).is_none());
        assert!(widget.on_send_clicked().is_none());
        assert_eq!(widget.messages().pending_shown, 1);

        backend.release.notify_one();
        widget.complete_turn(handle.await);

        assert_eq!(backend.calls(), vec!["first".to_string()]);
        assert_eq!(rendered(&widget), vec![(Origin::User, "first"), (Origin::Bot, "one")]);
        assert_eq!(widget.input().text(), "second");
    }

    #[tokio::test]
    async fn click_is_suppressed_while_disabled() {
        let (mut widget, backend) = widget(ScriptedBackend::answering("unused"), "");
        assert!(!widget.send_control().is_enabled());

        assert!(widget.on_send_clicked().is_none());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn other_keys_do_not_submit() {
        let (mut widget, backend) = widget(ScriptedBackend::answering("unused"), "hello");

        assert!(widget.on_key_press(CommitKey::Other).is_none());
        assert!(rendered(&widget).is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn aborted_task_counts_as_unavailable() {
        let (mut widget, _backend) = widget(ScriptedBackend::answering("unused"), "boom");
        assert!(widget.start_turn().is_some());

        let handle: TurnHandle = tokio::spawn(std::future::pending());
        handle.abort();
        widget.complete_turn(handle.await);

        assert_eq!(rendered(&widget), vec![(Origin::User, "boom"), (Origin::Bot, APOLOGY)]);
        assert!(!widget.is_waiting());
    }

    #[tokio::test]
    async fn gate_is_released_after_every_turn() {
        let (mut widget, _backend) = widget(ScriptedBackend::failing(), "");

        for text in ["a", "b", "c"] {
            widget.input_mut().0 = text.to_string();
            widget.on_input_changed();
            widget.submit_current_input().await;
            assert!(!widget.is_waiting());
            assert!(!widget.messages().pending);
        }
        assert_eq!(rendered(&widget).len(), 6);
    }

    #[test]
    fn input_changes_toggle_send() {
        let (mut widget, _backend) = widget(ScriptedBackend::answering("unused"), "");
        assert!(!widget.send_control().is_enabled());

        widget.input_mut().0 = "hi".to_string();
        widget.on_input_changed();
        assert!(widget.send_control().is_enabled());

        widget.input_mut().0 = " \t ".to_string();
        widget.on_input_changed();
        assert!(!widget.send_control().is_enabled());
    }

    #[test]
    fn every_append_scrolls_to_latest() {
        let (mut widget, _backend) = widget(ScriptedBackend::answering("unused"), "hi");
        assert!(widget.start_turn().is_some());
        assert_eq!(widget.messages().scrolls, vec![(1, false), (1, true)]);

        widget.finish_turn(Ok(ChatReply::text("there")));
        assert_eq!(
            widget.messages().scrolls,
            vec![(1, false), (1, true), (2, false)]
        );
    }

    #[test]
    fn clear_keeps_pending_indicator() {
        let (mut widget, _backend) = widget(ScriptedBackend::answering("unused"), "hi");
        assert!(widget.start_turn().is_some());

        widget.clear();

        assert!(rendered(&widget).is_empty());
        assert!(widget.messages().pending);
        assert!(widget.is_waiting());
    }
}
