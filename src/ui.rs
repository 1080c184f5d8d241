use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;
use crate::backend::ChatBackend;
use crate::widget::{Message, Origin, SendControl, TextInput};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(len) = after_open.find("**") else {
            break;
        };
        if len == 0 {
            // "****" is not emphasis
            spans.push(Span::raw(rest[..start + 4].to_string()));
            rest = &rest[start + 4..];
            continue;
        }

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after_open[..len].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

fn role_line(origin: Origin) -> Line<'static> {
    match origin {
        Origin::User => Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Origin::Bot => Line::from(Span::styled(
            "Bot:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    }
}

fn message_lines(message: &Message, lines: &mut Vec<Line<'static>>) {
    lines.push(role_line(message.origin));
    match message.origin {
        Origin::User => {
            lines.push(Line::from(message.text.clone()));
        }
        Origin::Bot => {
            for line in message.text.lines() {
                lines.push(parse_markdown_line(line));
            }
            if !message.sources.is_empty() {
                let names: Vec<String> = message
                    .sources
                    .iter()
                    .map(|s| format!("{} ({:.2})", s.source.as_deref().unwrap_or("unknown"), s.score))
                    .collect();
                lines.push(Line::from(Span::styled(
                    format!("sources: {}", names.join(", ")),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }
    lines.push(Line::default());
}

fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

/// Suffix of `before_cursor` that fits in `width` columns with room left for
/// the cursor itself.
fn visible_tail(before_cursor: &str, width: usize) -> &str {
    let mut rest = before_cursor;
    while width > 0 && display_width(rest) >= width {
        let mut chars = rest.chars();
        chars.next();
        rest = chars.as_str();
    }
    rest
}

pub fn render<B: ChatBackend + 'static>(app: &mut App<B>, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, conversation, input row, footer
    let [header_area, body_area, input_row, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_messages(app, frame, body_area);
    render_input(app, frame, input_row);
    render_footer(frame, footer_area);
}

fn render_header<B: ChatBackend + 'static>(app: &App<B>, frame: &mut Frame, area: Rect) {
    let status_style = if app.widget.is_waiting() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    };

    let title = Line::from(vec![
        Span::styled(format!(" {} ", app.title), Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}] ", app.status()), status_style),
        Span::styled(app.endpoint.clone(), Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_messages<B: ChatBackend + 'static>(app: &mut App<B>, frame: &mut Frame, area: Rect) {
    app.messages_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let panel = app.widget.messages();
    let mut lines: Vec<Line<'static>> = Vec::new();

    if panel.messages().is_empty() && !panel.is_pending() {
        lines.push(Line::from(Span::styled(
            "Type a message and press Enter...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for message in panel.messages() {
        message_lines(message, &mut lines);
    }

    if panel.is_pending() {
        lines.push(role_line(Origin::Bot));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat(usize::from(app.animation_frame) + 1);
        lines.push(Line::from(Span::styled(
            format!("{}{}", app.typing_label, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let conversation = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let total = u16::try_from(conversation.line_count(inner_width)).unwrap_or(u16::MAX);
    let scroll = app.widget.messages_mut().resolve_scroll(total, inner_height);

    let conversation = conversation.block(block).scroll((scroll, 0));

    frame.render_widget(conversation, area);
}

fn render_input<B: ChatBackend + 'static>(app: &mut App<B>, frame: &mut Frame, area: Rect) {
    let [input_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(10),
    ])
    .areas(area);
    app.send_area = Some(send_area);

    let waiting = app.widget.is_waiting();
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if waiting { Color::DarkGray } else { Color::Yellow }))
        .title(" Message ");

    // Horizontal scrolling keeps the cursor visible
    let input = app.widget.input();
    let inner_width = input_area.width.saturating_sub(2);
    let before_cursor = input.text_before_cursor();
    let shown_before_cursor = visible_tail(before_cursor, usize::from(inner_width));
    let hidden = before_cursor.len() - shown_before_cursor.len();

    let field = Paragraph::new(&input.text()[hidden..])
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(field, input_area);

    let cursor_x = u16::try_from(display_width(shown_before_cursor)).unwrap_or(inner_width);
    frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));

    let enabled = app.widget.send_control().is_enabled();
    let button_style = if enabled {
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let button = Paragraph::new("Send")
        .alignment(Alignment::Center)
        .style(button_style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(button, send_area);
}

fn render_footer(frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = Line::from(vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl+L ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(hints).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
