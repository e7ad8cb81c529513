//! Terminal UI state machine.
//!
//! [`App`] holds what only the terminal cares about: the lobby form, the
//! message being composed and a status line. It turns key presses into
//! [`UiAction`]s for the runtime and never touches the chat session
//! directly; session state arrives as a [`SessionView`] on every call.

use crossterm::event::KeyCode;
use parley_core::{Avatar, Notice, RoomState, SessionView};

/// Something the runtime should do in response to input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    /// The compose field changed.
    Keystroke(String),
    /// Send the composed message.
    Send(String),
    /// Create a room.
    CreateRoom { nickname: String, avatar: Avatar },
    /// Join a room.
    JoinRoom {
        nickname: String,
        avatar: Avatar,
        room_id: String,
    },
    /// Acknowledge the current notice.
    DismissNotice,
    /// Exit.
    Quit,
}

/// The lobby form field with focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyField {
    Nickname,
    Avatar,
    RoomId,
}

impl LobbyField {
    fn next(self) -> Self {
        match self {
            LobbyField::Nickname => LobbyField::Avatar,
            LobbyField::Avatar => LobbyField::RoomId,
            LobbyField::RoomId => LobbyField::Nickname,
        }
    }

    fn prev(self) -> Self {
        match self {
            LobbyField::Nickname => LobbyField::RoomId,
            LobbyField::Avatar => LobbyField::Nickname,
            LobbyField::RoomId => LobbyField::Avatar,
        }
    }
}

/// Terminal UI state.
#[derive(Debug, Clone)]
pub struct App {
    nickname: String,
    avatar: Avatar,
    room_id: String,
    focus: LobbyField,
    input: String,
    status: Option<String>,
    alert: Option<String>,
}

impl App {
    /// Create the UI with lobby defaults.
    #[must_use]
    pub fn new(nickname: Option<String>, avatar: Avatar) -> Self {
        Self {
            nickname: nickname.unwrap_or_default(),
            avatar,
            room_id: String::new(),
            focus: LobbyField::Nickname,
            input: String::new(),
            status: None,
            alert: None,
        }
    }

    /// Nickname being entered.
    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Selected avatar.
    #[must_use]
    pub fn avatar(&self) -> Avatar {
        self.avatar
    }

    /// Room ID being entered.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Lobby field with focus.
    #[must_use]
    pub fn focus(&self) -> LobbyField {
        self.focus
    }

    /// Message being composed.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Status line text.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Show a status line message.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Alert waiting to be acknowledged.
    #[must_use]
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Show a blocking alert. Input is ignored until Enter or Esc.
    pub fn show_alert(&mut self, alert: impl Into<String>) {
        self.alert = Some(alert.into());
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyCode, view: &SessionView) -> Vec<UiAction> {
        if self.alert.is_some() {
            if matches!(key, KeyCode::Enter | KeyCode::Esc) {
                self.alert = None;
            }
            return vec![];
        }
        if let Some(notice) = &view.notice {
            return Self::handle_notice_key(key, notice);
        }
        if key == KeyCode::Esc {
            return vec![UiAction::Quit];
        }
        match view.room {
            RoomState::NoRoom => self.handle_lobby_key(key, view),
            RoomState::InRoom { .. } => self.handle_room_key(key),
        }
    }

    fn handle_notice_key(key: KeyCode, notice: &Notice) -> Vec<UiAction> {
        match (key, notice) {
            (KeyCode::Esc, Notice::Disconnected) => vec![UiAction::Quit],
            (KeyCode::Esc | KeyCode::Enter, Notice::RoomFailed(_)) => vec![UiAction::DismissNotice],
            _ => vec![],
        }
    }

    fn handle_lobby_key(&mut self, key: KeyCode, view: &SessionView) -> Vec<UiAction> {
        match key {
            KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
            KeyCode::Enter => return self.submit_lobby(view),
            key if self.focus == LobbyField::Avatar => self.pick_avatar(key),
            KeyCode::Char(c) => self.lobby_text().push(c),
            KeyCode::Backspace => {
                self.lobby_text().pop();
            }
            _ => {}
        }
        vec![]
    }

    fn lobby_text(&mut self) -> &mut String {
        match self.focus {
            LobbyField::RoomId => &mut self.room_id,
            LobbyField::Nickname | LobbyField::Avatar => &mut self.nickname,
        }
    }

    fn pick_avatar(&mut self, key: KeyCode) {
        let count = Avatar::ALL.len();
        let index = self.avatar.index();
        let picked = match key {
            KeyCode::Right | KeyCode::Char(' ') => Avatar::from_index((index + 1) % count),
            KeyCode::Left => Avatar::from_index((index + count - 1) % count),
            KeyCode::Char(c) => c
                .to_digit(10)
                .and_then(|n| (n as usize).checked_sub(1))
                .and_then(Avatar::from_index),
            _ => None,
        };
        if let Some(avatar) = picked {
            self.avatar = avatar;
        }
    }

    fn submit_lobby(&mut self, view: &SessionView) -> Vec<UiAction> {
        if view.room_pending {
            self.set_status("Still waiting for the server");
            return vec![];
        }
        if self.nickname.trim().is_empty() {
            self.show_alert("Enter a nickname!");
            return vec![];
        }
        self.status = None;
        let nickname = self.nickname.clone();
        if self.room_id.trim().is_empty() {
            vec![UiAction::CreateRoom {
                nickname,
                avatar: self.avatar,
            }]
        } else {
            vec![UiAction::JoinRoom {
                nickname,
                avatar: self.avatar,
                room_id: self.room_id.clone(),
            }]
        }
    }

    fn handle_room_key(&mut self, key: KeyCode) -> Vec<UiAction> {
        match key {
            KeyCode::Char(c) => {
                self.input.push(c);
                vec![UiAction::Keystroke(self.input.clone())]
            }
            KeyCode::Backspace => match self.input.pop() {
                Some(_) => vec![UiAction::Keystroke(self.input.clone())],
                None => vec![],
            },
            KeyCode::Enter if !self.input.is_empty() => {
                self.status = None;
                vec![UiAction::Send(std::mem::take(&mut self.input))]
            }
            _ => vec![],
        }
    }
}
