use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextTab,
    PrevTab,
    SwitchTab(u8),
    NextKind,
    PrevKind,
    HistoryBack,
    HistoryForward,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    GPrefix,
    ToggleHelp,
    PickNamespace,
    EnterResource,
    ShowDetails,
    ShowLogs,
    ShowEvents,
    DeleteSelected,
    StartCommand,
    StartSearch,
    StartInsert,
    UploadManifest,
    CycleStatusFilter,
    ClearFilters,
    CycleSort,
    FlipSort,
    LoadMore,
    FetchAll,
    Refresh,
    ClearDetailOverlay,
    SubmitInput,
    CancelInput,
    Backspace,
    DeleteWord,
    InputChar(char),
    ConfirmYes,
    ConfirmNo,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Search
        | InputMode::Command
        | InputMode::Console
        | InputMode::CreateNamespace
        | InputMode::ManifestPath => map_input_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char(c @ '1'..='7') if key.modifiers.is_empty() => {
            Some(Action::SwitchTab(c.to_digit(10).unwrap_or(1) as u8))
        }
        KeyCode::Left if key.modifiers.contains(KeyModifiers::ALT) => Some(Action::HistoryBack),
        KeyCode::Right if key.modifiers.contains(KeyModifiers::ALT) => {
            Some(Action::HistoryForward)
        }
        KeyCode::Char('H') => Some(Action::HistoryBack),
        KeyCode::Char('L') => Some(Action::HistoryForward),
        KeyCode::Backspace => Some(Action::HistoryBack),
        KeyCode::Left => Some(Action::PrevTab),
        KeyCode::Right => Some(Action::NextTab),
        KeyCode::Tab => Some(Action::NextKind),
        KeyCode::BackTab => Some(Action::PrevKind),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::PageDown)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') => Some(Action::GPrefix),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Home => Some(Action::Top),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char('s') => Some(Action::PickNamespace),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('/') => Some(Action::StartSearch),
        KeyCode::Char(':') => Some(Action::StartCommand),
        KeyCode::Char(';') if key.modifiers.contains(KeyModifiers::SHIFT) => {
            Some(Action::StartCommand)
        }
        KeyCode::Char('i') | KeyCode::Char('c') => Some(Action::StartInsert),
        KeyCode::Char('u') => Some(Action::UploadManifest),
        KeyCode::Char('f') => Some(Action::CycleStatusFilter),
        KeyCode::Char('F') => Some(Action::ClearFilters),
        KeyCode::Char('o') => Some(Action::CycleSort),
        KeyCode::Char('O') => Some(Action::FlipSort),
        KeyCode::Char('m') if key.modifiers.is_empty() => Some(Action::LoadMore),
        KeyCode::Char('a') => Some(Action::FetchAll),
        KeyCode::Char('d') if key.modifiers.is_empty() => Some(Action::ShowDetails),
        KeyCode::Char('l') => Some(Action::ShowLogs),
        KeyCode::Char('e') => Some(Action::ShowEvents),
        KeyCode::Char('x') | KeyCode::Delete => Some(Action::DeleteSelected),
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmYes),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::ConfirmNo),
        KeyCode::Enter => Some(Action::EnterResource),
        KeyCode::Char('m') | KeyCode::Char('j')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(Action::EnterResource)
        }
        KeyCode::Esc => Some(Action::ClearDetailOverlay),
        _ => None,
    }
}

fn map_input_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Char('m') | KeyCode::Char('j')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(Action::SubmitInput)
        }
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::DeleteWord)
        }
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn normal_mode_maps_quit() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let action = map_key(InputMode::Normal, key);
        assert_eq!(action, Some(Action::Quit));
    }

    #[test]
    fn input_mode_maps_char() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let action = map_key(InputMode::Search, key);
        assert_eq!(action, Some(Action::InputChar('q')));
    }

    #[test]
    fn input_mode_rejects_ctrl_c() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let action = map_key(InputMode::Console, key);
        assert_eq!(action, None);
    }

    #[test]
    fn normal_mode_maps_digits_to_tabs() {
        let key = KeyEvent::new(KeyCode::Char('5'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, key), Some(Action::SwitchTab(5)));
        let key = KeyEvent::new(KeyCode::Char('8'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, key), None);
    }

    #[test]
    fn normal_mode_maps_alt_arrows_to_history() {
        let back = KeyEvent::new(KeyCode::Left, KeyModifiers::ALT);
        let forward = KeyEvent::new(KeyCode::Right, KeyModifiers::ALT);
        let plain = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, back), Some(Action::HistoryBack));
        assert_eq!(
            map_key(InputMode::Normal, forward),
            Some(Action::HistoryForward)
        );
        assert_eq!(map_key(InputMode::Normal, plain), Some(Action::PrevTab));
    }

    #[test]
    fn normal_mode_maps_sort_keys() {
        let cycle = KeyEvent::new(KeyCode::Char('o'), KeyModifiers::NONE);
        let flip = KeyEvent::new(KeyCode::Char('O'), KeyModifiers::SHIFT);
        assert_eq!(map_key(InputMode::Normal, cycle), Some(Action::CycleSort));
        assert_eq!(map_key(InputMode::Normal, flip), Some(Action::FlipSort));
    }

    #[test]
    fn ctrl_d_pages_and_plain_d_describes() {
        let ctrl = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        let plain = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, ctrl), Some(Action::PageDown));
        assert_eq!(map_key(InputMode::Normal, plain), Some(Action::ShowDetails));
    }

    #[test]
    fn input_mode_maps_ctrl_m_and_ctrl_j_to_submit() {
        let ctrl_m = KeyEvent::new(KeyCode::Char('m'), KeyModifiers::CONTROL);
        let ctrl_j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::CONTROL);
        assert_eq!(
            map_key(InputMode::Command, ctrl_m),
            Some(Action::SubmitInput)
        );
        assert_eq!(
            map_key(InputMode::ManifestPath, ctrl_j),
            Some(Action::SubmitInput)
        );
    }

    #[test]
    fn normal_mode_maps_uppercase_confirmation_keys() {
        let yes = KeyEvent::new(KeyCode::Char('Y'), KeyModifiers::SHIFT);
        let no = KeyEvent::new(KeyCode::Char('N'), KeyModifiers::SHIFT);
        assert_eq!(map_key(InputMode::Normal, yes), Some(Action::ConfirmYes));
        assert_eq!(map_key(InputMode::Normal, no), Some(Action::ConfirmNo));
    }

    #[test]
    fn s_opens_namespace_picker() {
        let key = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, key), Some(Action::PickNamespace));
    }

    #[test]
    fn input_mode_maps_ctrl_w_to_delete_word() {
        let key = KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL);
        assert_eq!(
            map_key(InputMode::CreateNamespace, key),
            Some(Action::DeleteWord)
        );
    }
}
