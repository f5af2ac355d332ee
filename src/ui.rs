use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::App;
use crate::render::{MessageClass, MessageNode};

const SEND_BUTTON_WIDTH: u16 = 10;

/// Turn `**bold**` runs into bold spans. An unclosed `**` is shown as typed.
fn styled_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    let balanced = parts.len() % 2 == 1;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if i % 2 == 1 && !(is_last && !balanced) {
            if !part.is_empty() {
                spans.push(Span::styled(
                    part.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            }
        } else if i % 2 == 1 {
            spans.push(Span::raw(format!("**{}", part)));
        } else if !part.is_empty() {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

fn label_style(class: MessageClass) -> Style {
    let color = match class {
        MessageClass::UserMessage => Color::Cyan,
        MessageClass::AssistantMessage => Color::Yellow,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn node_lines(node: &MessageNode) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(node.class.label(), label_style(node.class)))];

    let is_error = node.class == MessageClass::AssistantMessage && node.text.starts_with("Error:");
    for line in node.text.lines() {
        if is_error {
            lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Red))));
        } else {
            lines.push(styled_line(line));
        }
    }
    lines.push(Line::default());
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, messages, input row, footer
    let [header_area, messages_area, input_row, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    let [input_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(SEND_BUTTON_WIDTH),
    ])
    .areas(input_row);

    // Store areas for mouse hit-testing
    app.messages_area = Some(messages_area);
    app.send_area = Some(send_area);

    render_header(app, frame, header_area);
    render_messages(app, frame, messages_area);
    render_input(app, frame, input_area);
    render_send_button(app, frame, send_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" llama-chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.endpoint().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let surface = &mut app.session.surface;

    // Inner size minus borders, for scroll calculations
    let (width, height) = (area.width.saturating_sub(2), area.height.saturating_sub(2));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Messages ");

    let text = if surface.nodes().is_empty() && !surface.is_waiting() {
        Text::from(Span::styled(
            "Ask for a movie suggestion...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = surface.nodes().iter().flat_map(node_lines).collect();

        if surface.shows_placeholder() {
            lines.push(Line::from(Span::styled(
                MessageClass::AssistantMessage.label(),
                label_style(MessageClass::AssistantMessage),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Measure with the same wrapping that draws it, then scroll
    let messages = Paragraph::new(text).wrap(Wrap { trim: true });
    surface.set_layout(height, messages.line_count(width));

    let messages = messages.block(block).scroll((surface.scroll, 0));

    frame.render_widget(messages, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.is_waiting() { Color::DarkGray } else { Color::Yellow };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.session.cursor();
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app
        .session
        .input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_send_button(app: &App, frame: &mut Frame, area: Rect) {
    let style = if app.is_waiting() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Black).bg(Color::Cyan).bold()
    };

    let button = Paragraph::new("Send")
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(button, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (status, status_style) = if app.is_waiting() {
        (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    let footer = Line::from(vec![
        Span::styled(status, status_style),
        Span::styled(
            format!(
                " {} msgs / {} tokens ",
                app.session.conversation().len(),
                app.session.conversation().token_count()
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" Enter/click Send: send  PgUp/PgDn: scroll  Esc: quit"),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}
