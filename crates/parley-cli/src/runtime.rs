//! Terminal runtime.
//!
//! Owns the terminal and drives the [`App`] state machine: key presses go
//! through [`App::handle_key`], the resulting [`UiAction`]s are executed
//! against the [`ChatClient`], and every session change triggers a redraw.

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use futures_util::StreamExt;
use parley_client::{ChatClient, ClientError};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, stdout, Stdout};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::app::{App, UiAction};
use crate::ui;

/// Feedback from actions that finish after the key press that started them.
enum Report {
    /// Shown on the status line.
    Status(String),
    /// Shown as a blocking alert.
    Alert(String),
}

impl Report {
    fn from_error(error: ClientError) -> Self {
        match error {
            // Refused before reaching the server
            ClientError::Session(e) => Report::Alert(e.to_string()),
            other => Report::Status(other.to_string()),
        }
    }
}

type Reports = mpsc::UnboundedSender<Report>;

/// Raw-mode alternate screen, restored on drop.
struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Screen {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        Ok(Self { terminal })
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

/// Run the terminal UI until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be driven.
pub async fn run(client: ChatClient, mut app: App) -> Result<()> {
    let client = Arc::new(client);
    let mut screen = Screen::enter()?;
    let mut views = client.subscribe();
    let mut view = views.borrow_and_update().clone();
    let mut key_events = EventStream::new();
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
    let mut room_tasks = JoinSet::new();

    loop {
        screen.terminal.draw(|frame| ui::render(frame, &app, &view))?;

        tokio::select! {
            maybe_event = key_events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if is_interrupt(&key) {
                        break;
                    }
                    let mut flow = ControlFlow::Continue(());
                    for action in app.handle_key(key.code, &view) {
                        flow = execute(action, &client, &reports_tx, &mut room_tasks).await;
                        if flow.is_break() {
                            break;
                        }
                    }
                    if flow.is_break() {
                        break;
                    }
                }
                // Resize and other events only need a redraw
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },

            changed = views.changed() => {
                if changed.is_err() {
                    warn!("Session loop stopped");
                    break;
                }
                view = views.borrow_and_update().clone();
            }

            Some(report) = reports_rx.recv() => match report {
                Report::Status(status) => app.set_status(status),
                Report::Alert(alert) => app.show_alert(alert),
            },
        }
    }

    drop(screen);
    debug!("Terminal restored");
    finish(client, room_tasks).await;
    Ok(())
}

/// Stop outstanding room tasks, then shut the client down.
async fn finish(client: Arc<ChatClient>, mut room_tasks: JoinSet<()>) {
    room_tasks.abort_all();
    while room_tasks.join_next().await.is_some() {}

    match Arc::try_unwrap(client) {
        Ok(client) => client.shutdown().await,
        Err(_) => warn!("Client still shared at exit, skipping shutdown"),
    }
}

async fn execute(
    action: UiAction,
    client: &Arc<ChatClient>,
    reports: &Reports,
    room_tasks: &mut JoinSet<()>,
) -> ControlFlow<()> {
    match action {
        UiAction::Keystroke(text) => {
            if let Err(e) = client.keystroke(text) {
                let _ = reports.send(Report::Status(e.to_string()));
            }
        }
        // Awaited in place so later keystrokes are ordered after the send
        UiAction::Send(body) => {
            if let Err(e) = client.send(body).await {
                let _ = reports.send(Report::Status(e.to_string()));
            }
        }
        UiAction::CreateRoom { nickname, avatar } => {
            let client = Arc::clone(client);
            let reports = reports.clone();
            room_tasks.spawn(async move {
                if let Err(e) = client.create_room(&nickname, avatar).await {
                    let _ = reports.send(Report::from_error(e));
                }
            });
        }
        UiAction::JoinRoom {
            nickname,
            avatar,
            room_id,
        } => {
            let client = Arc::clone(client);
            let reports = reports.clone();
            room_tasks.spawn(async move {
                if let Err(e) = client.join_room(&nickname, avatar, &room_id).await {
                    let _ = reports.send(Report::from_error(e));
                }
            });
        }
        UiAction::DismissNotice => {
            if let Err(e) = client.dismiss_notice() {
                let _ = reports.send(Report::Status(e.to_string()));
            }
        }
        UiAction::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}
