use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tui_textarea::Input;
use tracing::warn;

use crate::app::{AppState, InputMode};

/// Wheel delta of one notch, in the units `scroll_by_wheel` expects
const WHEEL_NOTCH: i32 = 120;

/// Handle a mouse event
pub fn handle_mouse(state: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => state.scroll_by_wheel(WHEEL_NOTCH),
        MouseEventKind::ScrollDown => state.scroll_by_wheel(-WHEEL_NOTCH),
        _ => {}
    }
}

/// Handle a key event and update app state accordingly
pub fn handle_key(state: &mut AppState, key: KeyEvent, page_size: usize) {
    // Help overlay takes priority
    if state.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            state.show_help = false;
        }
        return;
    }

    match state.mode {
        InputMode::Normal => handle_normal_mode(state, key, page_size),
        _ => handle_input_mode(state, key),
    }
}

fn handle_normal_mode(state: &mut AppState, key: KeyEvent, page_size: usize) {
    let page = page_size.max(1) as isize;
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Quit
        KeyCode::Char('q') => {
            state.should_quit = true;
        }
        KeyCode::Char('c') if ctrl => {
            state.should_quit = true;
        }

        KeyCode::Char('?') => {
            state.show_help = true;
        }
        KeyCode::Char('b') => {
            state.toggle_side_panel();
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => state.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => state.move_cursor(-1),
        KeyCode::Char('h') | KeyCode::Left => state.move_cursor_col(-1),
        KeyCode::Char('l') | KeyCode::Right => state.move_cursor_col(1),
        KeyCode::Char('e') if ctrl => state.scroll_lines(1),
        KeyCode::Char('y') if ctrl => state.scroll_lines(-1),
        KeyCode::Char('d') if ctrl => state.move_cursor(page / 2),
        KeyCode::Char('u') if ctrl => state.move_cursor(-(page / 2)),
        KeyCode::PageDown => state.move_cursor(page),
        KeyCode::PageUp => state.move_cursor(-page),
        KeyCode::Char('g') | KeyCode::Home => state.go_to_top(),
        KeyCode::Char('G') | KeyCode::End => state.go_to_bottom(),
        KeyCode::Char(':') => state.begin_input(InputMode::GotoLine),

        // Search
        KeyCode::Char('/') => state.begin_input(InputMode::Search),
        KeyCode::Char('n') => state.next_match(),
        KeyCode::Char('N') => state.prev_match(),
        KeyCode::Char('r') => state.toggle_regex_mode(),
        KeyCode::Char('i') => state.toggle_case_sensitive(),
        KeyCode::Char('*') => state.echo_word_at_cursor(),
        KeyCode::Esc => {
            state.clear_search();
            state.status_message = None;
        }

        // Grep tabs
        KeyCode::Char('f') => state.begin_input(InputMode::Grep),
        KeyCode::Char('F') => state.begin_input(InputMode::GrepAdd),
        KeyCode::Enter => state.jump_to_source(),
        KeyCode::Char('x') => state.close_tab(),
        KeyCode::Tab => state.next_tab(),
        KeyCode::BackTab => state.prev_tab(),

        // Highlighting
        KeyCode::Char('t') => state.cycle_template(),
        KeyCode::Char('m') => state.begin_input(InputMode::Keyword),
        KeyCode::Char('M') => state.clear_keywords(),
        KeyCode::Char('S') => state.begin_input(InputMode::SaveKeywords),
        KeyCode::Char('L') => state.cycle_keyword_set(),

        // Actions
        KeyCode::Char('e') => state.export_active(),
        KeyCode::Char('y') => {
            if let Err(e) = state.copy_current_line() {
                warn!(error = %e, "copy failed");
                state.status_message = Some(format!("Copy failed: {e:#}"));
            }
        }

        _ => {}
    }
}

fn handle_input_mode(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => state.submit_input(),
        KeyCode::Esc => state.cancel_input(),
        // Toggle regex mode with Ctrl+R and re-run the pattern being typed
        KeyCode::Char('r')
            if state.mode == InputMode::Search && key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            state.toggle_regex_mode();
            state.input_changed();
        }
        _ => {
            // Forward all other keys to the textarea
            if state.input.input(Input::from(key)) {
                state.input_changed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loglens::config::Config;
    use loglens::keywords::KeywordManager;
    use loglens::loader::ChunkedLoader;
    use loglens::sources::LoadEvent;
    use loglens::templates::TemplateStore;

    fn press(state: &mut AppState, code: KeyCode) {
        handle_key(state, KeyEvent::new(code, KeyModifiers::NONE), 10);
    }

    fn loaded(dir: &std::path::Path) -> AppState<'static> {
        loaded_with(dir, "one\ntwo ERROR\nthree\nfour ERROR")
    }

    fn loaded_with(dir: &std::path::Path, body: &str) -> AppState<'static> {
        let path = dir.join("keys.log");
        std::fs::write(&path, body).unwrap();
        let mut state = AppState::new(
            Config {
                line_height: 1,
                ..Config::default()
            },
            path.clone(),
            TemplateStore::open(dir),
            KeywordManager::open(dir),
        );
        let result = ChunkedLoader::default().load(&path, |_, _| {}).unwrap();
        state.handle_load_event(LoadEvent::Finished(Box::new(result)));
        state
    }

    #[test]
    fn test_search_prompt_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = loaded(dir.path());

        press(&mut state, KeyCode::Char('/'));
        assert_eq!(state.mode, InputMode::Search);
        for c in "ERROR".chars() {
            press(&mut state, KeyCode::Char(c));
        }
        assert!(state.input_needs_apply);
        press(&mut state, KeyCode::Enter);

        assert_eq!(state.mode, InputMode::Normal);
        assert_eq!(state.active().unwrap().search.match_count(), 2);
        assert_eq!(state.active().unwrap().viewer.cursor(), 1);
        press(&mut state, KeyCode::Char('n'));
        assert_eq!(state.active().unwrap().viewer.cursor(), 3);
    }

    #[test]
    fn test_escape_cancels_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = loaded(dir.path());
        press(&mut state, KeyCode::Char('f'));
        press(&mut state, KeyCode::Char('x'));
        press(&mut state, KeyCode::Esc);
        assert_eq!(state.mode, InputMode::Normal);
        assert_eq!(state.tabs.len(), 1);
    }

    #[test]
    fn test_help_swallows_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = loaded(dir.path());
        press(&mut state, KeyCode::Char('?'));
        press(&mut state, KeyCode::Char('j'));
        assert_eq!(state.active().unwrap().viewer.cursor(), 0);
        press(&mut state, KeyCode::Esc);
        assert!(!state.show_help);
        press(&mut state, KeyCode::Char('G'));
        assert_eq!(state.active().unwrap().viewer.cursor(), 3);
        press(&mut state, KeyCode::Char('q'));
        assert!(state.should_quit);
    }

    #[test]
    fn test_goto_line_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = loaded(dir.path());
        press(&mut state, KeyCode::Char(':'));
        assert_eq!(state.mode, InputMode::GotoLine);
        press(&mut state, KeyCode::Char('3'));
        press(&mut state, KeyCode::Enter);
        assert_eq!(state.mode, InputMode::Normal);
        assert_eq!(state.active().unwrap().viewer.cursor(), 2);
    }

    #[test]
    fn test_ctrl_e_and_ctrl_y_scroll_view() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        let mut state = loaded_with(dir.path(), &body.join("\n"));
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);

        handle_key(&mut state, ctrl('e'), 10);
        handle_key(&mut state, ctrl('e'), 10);
        assert_eq!(state.active().unwrap().viewer.visible_range().start, 2);
        handle_key(&mut state, ctrl('y'), 10);
        assert_eq!(state.active().unwrap().viewer.visible_range().start, 1);
        assert_eq!(state.active().unwrap().viewer.cursor(), 0);
    }
}
