use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global quit, works in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The confirmation popup swallows everything until answered
    if app.confirm_delete.is_some() {
        handle_confirm_key(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_key(app, key),
        InputMode::Editing => handle_editing_key(app, key),
    }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => app.confirm_pending_delete(),
        KeyCode::Char('n') | KeyCode::Esc => app.cancel_pending_delete(),
        _ => {}
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sidebar => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Sidebar,
            };
        }

        KeyCode::Char('i') => {
            app.focus = FocusPane::Chat;
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_down(),
            FocusPane::Chat => app.scroll_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_up(),
            FocusPane::Chat => app.scroll_up(),
        },
        KeyCode::Char('g') => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_first(),
            FocusPane::Chat => app.chat_scroll = 0,
        },
        KeyCode::Char('G') => match app.focus {
            FocusPane::Sidebar => app.sidebar_nav_last(),
            FocusPane::Chat => app.scroll_to_bottom(),
        },

        // Open the highlighted session, or start typing when the chat
        // pane already has focus
        KeyCode::Enter => match app.focus {
            FocusPane::Sidebar => {
                app.activate_selected();
                app.focus = FocusPane::Chat;
            }
            FocusPane::Chat => app.input_mode = InputMode::Editing,
        },

        // Sidebar actions; delete only marks the entry, the popup decides
        KeyCode::Char('n') if app.focus == FocusPane::Sidebar => app.create_session(),
        KeyCode::Char('d') if app.focus == FocusPane::Sidebar => app.request_delete_selected(),
        KeyCode::Char('r') if app.focus == FocusPane::Sidebar => app.start_session_list_load(),
        KeyCode::Char('s') => app.toggle_sidebar(),

        _ => {}
    }
}

fn handle_editing_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < app.input.chars().count() {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => app.input_cursor = app.input_cursor.saturating_sub(1),
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(app.input.chars().count());
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_to_byte_index_handles_multibyte_text() {
        let s = "héllo";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 1);
        assert_eq!(char_to_byte_index(s, 2), 3); // é is two bytes
        assert_eq!(char_to_byte_index(s, 5), s.len());
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }
}
