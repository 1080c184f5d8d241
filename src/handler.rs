use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::backend::ChatBackend;
use crate::tui::AppEvent;
use crate::widget::CommitKey;

const SCROLL_STEP: u16 = 3;

pub fn handle_event<B: ChatBackend + 'static>(app: &mut App<B>, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            app.widget.input_mut().insert_str(&text);
            app.widget.on_input_changed();
        }
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key<B: ChatBackend + 'static>(app: &mut App<B>, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('l') if ctrl => app.widget.clear(),
        KeyCode::Enter => {
            let handle = app.widget.on_key_press(commit_key(key.code));
            app.track(handle);
        }

        // Conversation scrolling
        KeyCode::Up => app.widget.messages_mut().scroll_up(1),
        KeyCode::Down => app.widget.messages_mut().scroll_down(1),
        KeyCode::PageUp => {
            let page = page_height(app);
            app.widget.messages_mut().scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = page_height(app);
            app.widget.messages_mut().scroll_down(page);
        }

        // Input editing
        KeyCode::Left => app.widget.input_mut().move_left(),
        KeyCode::Right => app.widget.input_mut().move_right(),
        KeyCode::Home => app.widget.input_mut().move_home(),
        KeyCode::End => app.widget.input_mut().move_end(),
        KeyCode::Backspace => edit(app, |input| input.backspace()),
        KeyCode::Delete => edit(app, |input| input.delete()),
        KeyCode::Char(c) if !ctrl => edit(app, |input| input.insert(c)),
        _ => {}
    }
}

fn commit_key(code: KeyCode) -> CommitKey {
    match code {
        KeyCode::Enter => CommitKey::Enter,
        _ => CommitKey::Other,
    }
}

fn edit<B: ChatBackend + 'static>(app: &mut App<B>, apply: impl FnOnce(&mut crate::view::InputField)) {
    apply(app.widget.input_mut());
    app.widget.on_input_changed();
}

fn page_height<B>(app: &App<B>) -> u16 {
    app.messages_area
        .map(|area| area.height.saturating_sub(2).max(1))
        .unwrap_or(10)
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse<B: ChatBackend + 'static>(app: &mut App<B>, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollDown => app.widget.messages_mut().scroll_down(SCROLL_STEP),
        MouseEventKind::ScrollUp => app.widget.messages_mut().scroll_up(SCROLL_STEP),
        MouseEventKind::Down(MouseButton::Left) => {
            let on_send = app.send_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
            if on_send {
                let handle = app.widget.on_send_clicked();
                app.track(handle);
            }
        }
        _ => {}
    }
}
