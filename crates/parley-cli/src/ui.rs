//! UI rendering.
//!
//! Pure functions from [`App`] and [`SessionView`] to ratatui widgets.

use parley_core::{Avatar, Message, RoomState, SessionView};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, LobbyField};

const INPUT_HEIGHT: u16 = 3;
const BORDER_SIZE: u16 = 2;

/// Render the entire UI.
pub fn render(frame: &mut Frame, app: &App, view: &SessionView) {
    let [main_area, typing_area, input_area, status_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(INPUT_HEIGHT),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    match &view.room {
        RoomState::NoRoom => render_lobby(frame, app, view, main_area),
        RoomState::InRoom { room_id } => {
            render_messages(frame, &view.messages, room_id.as_str(), main_area);
        }
    }
    render_typing(frame, view, typing_area);
    render_input(frame, app, view, input_area);
    render_status(frame, app, view, status_area);

    if let Some(alert) = app.alert() {
        render_notice(frame, alert, frame.area());
    } else if let Some(notice) = &view.notice {
        render_notice(frame, &notice.to_string(), frame.area());
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn render_lobby(frame: &mut Frame, app: &App, view: &SessionView, area: Rect) {
    let field = |label: &str, value: &str, which: LobbyField| {
        Line::from(vec![
            Span::styled(format!("{label:<10}"), focus_style(app.focus() == which)),
            Span::raw(value.to_string()),
        ])
    };

    let mut avatars = vec![Span::styled(
        format!("{:<10}", "Avatar"),
        focus_style(app.focus() == LobbyField::Avatar),
    )];
    for avatar in Avatar::ALL {
        let style = if avatar == app.avatar() {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        avatars.push(Span::styled(avatar.glyph(), style));
        avatars.push(Span::raw(" "));
    }

    let mut lines = vec![
        field("Nickname", app.nickname(), LobbyField::Nickname),
        Line::from(avatars),
        field("Room ID", app.room_id(), LobbyField::RoomId),
        Line::default(),
        Line::from(Span::styled(
            "Leave the room ID empty to create a new room.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if view.room_pending {
        lines.push(Line::from("Entering room..."));
    }

    let lobby = Paragraph::new(lines).block(Block::bordered().title(" Parley "));
    frame.render_widget(lobby, area);
}

fn message_line(message: &Message) -> Line<'_> {
    let (name_style, body_style) = if message.is_system() {
        let dim = Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC);
        (dim, dim)
    } else {
        let name = Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD);
        (name, Style::default())
    };
    Line::from(vec![
        Span::raw(message.display_icon()),
        Span::raw(" "),
        Span::styled(message.display_name(), name_style),
        Span::styled(": ", body_style),
        Span::styled(message.body.as_str(), body_style),
    ])
}

fn render_messages(frame: &mut Frame, messages: &[Message], room_id: &str, area: Rect) {
    let visible_height = area.height.saturating_sub(BORDER_SIZE) as usize;
    let skip = messages.len().saturating_sub(visible_height);
    let items: Vec<ListItem> = messages
        .iter()
        .skip(skip)
        .map(|message| ListItem::new(message_line(message)))
        .collect();

    let list = List::new(items).block(Block::bordered().title(format!(" Room {room_id} ")));
    frame.render_widget(list, area);
}

fn render_typing(frame: &mut Frame, view: &SessionView, area: Rect) {
    if view.someone_typing {
        let line = Line::from(Span::styled(
            "Someone is typing...",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn render_input(frame: &mut Frame, app: &App, view: &SessionView, area: Rect) {
    let (title, text) = match view.room {
        RoomState::NoRoom => (
            " Keys ",
            "Tab: next field  ←/→: avatar  Enter: create or join  Esc: quit".to_string(),
        ),
        RoomState::InRoom { .. } => (" Message ", format!("{}_", app.input())),
    };
    let input = Paragraph::new(text).block(Block::bordered().title(title));
    frame.render_widget(input, area);
}

fn render_status(frame: &mut Frame, app: &App, view: &SessionView, area: Rect) {
    let connection = if view.closed {
        Span::styled("Disconnected", Style::default().fg(Color::Red))
    } else if !view.ready {
        Span::styled("Connecting...", Style::default().fg(Color::Yellow))
    } else if let Some(participant) = &view.participant {
        Span::styled(
            format!("{} {}", participant.icon, participant.name),
            Style::default().fg(Color::Green),
        )
    } else {
        Span::styled("Connected", Style::default().fg(Color::Green))
    };

    let mut spans = vec![connection];
    if let Some(status) = app.status() {
        spans.push(Span::raw("  "));
        spans.push(Span::raw(status));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_notice(frame: &mut Frame, text: &str, area: Rect) {
    let popup = centered(area, 50, 5);
    let notice = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::bordered().title(" Notice "));
    frame.render_widget(Clear, popup);
    frame.render_widget(notice, popup);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
