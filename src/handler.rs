use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.session.surface.scroll_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
        AppEvent::StreamUpdate(text) => app.session.stream_update(&text),
        AppEvent::TurnFinished(result) => app.session.finish_turn(result),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    let page = app.session.surface.viewport_height.max(1);

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.trigger_send(),

        // Message pane scrolling
        KeyCode::PageUp => app.session.surface.scroll_up(page),
        KeyCode::PageDown => app.session.surface.scroll_down(page),
        KeyCode::Up => app.session.surface.scroll_up(1),
        KeyCode::Down => app.session.surface.scroll_down(1),

        // Input editing
        KeyCode::Backspace => app.session.backspace(),
        KeyCode::Delete => app.session.delete(),
        KeyCode::Left => app.session.cursor_left(),
        KeyCode::Right => app.session.cursor_right(),
        KeyCode::Home => app.session.cursor_home(),
        KeyCode::End => app.session.cursor_end(),
        KeyCode::Char(c) => app.session.insert_char(c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_messages = app.messages_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_send = app.send_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if in_send => app.trigger_send(),
        MouseEventKind::ScrollDown if in_messages => {
            app.session.surface.scroll_down(MOUSE_SCROLL_LINES);
        }
        MouseEventKind::ScrollUp if in_messages => {
            app.session.surface.scroll_up(MOUSE_SCROLL_LINES);
        }
        _ => {}
    }
}
