//! Terminal implementations of the widget's UI handles.

use crate::widget::{Message, MessageContainer, SendControl, TextInput};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug)]
pub struct MessagePanel {
    messages: Vec<Message>,
    pending: bool,
    scroll: u16,
    // When set, rendering pins the view to the newest line.
    follow_latest: bool,
}

impl Default for MessagePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePanel {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            pending: false,
            scroll: 0,
            follow_latest: true,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_latest = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    /// Resolve the scroll offset for a viewport of `height` lines showing
    /// `total_lines` lines of content. Scrolling back down to the bottom
    /// re-enables following.
    pub fn resolve_scroll(&mut self, total_lines: u16, height: u16) -> u16 {
        let max_scroll = total_lines.saturating_sub(height);
        if self.follow_latest || self.scroll >= max_scroll {
            self.follow_latest = true;
            self.scroll = max_scroll;
        }
        self.scroll
    }
}

impl MessageContainer for MessagePanel {
    fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn show_pending(&mut self) {
        self.pending = true;
    }

    fn hide_pending(&mut self) {
        self.pending = false;
    }

    fn scroll_to_latest(&mut self) {
        self.follow_latest = true;
    }

    fn clear(&mut self) {
        self.messages.clear();
        self.scroll = 0;
        self.follow_latest = true;
    }
}

/// Single-line text input with a character-indexed cursor.
#[derive(Debug, Default)]
pub struct InputField {
    text: String,
    cursor: usize,
}

impl InputField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn text_before_cursor(&self) -> &str {
        &self.text[..char_to_byte_index(&self.text, self.cursor)]
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    /// Paste text at the cursor. Line breaks become spaces since the field is
    /// single-line.
    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            self.insert(if c == '\n' || c == '\r' { ' ' } else { c });
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Replace the whole content, leaving the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.move_end();
    }
}

impl TextInput for InputField {
    fn text(&self) -> &str {
        &self.text
    }

    fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

#[derive(Debug, Default)]
pub struct SendButton {
    enabled: bool,
}

impl SendControl for SendButton {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
