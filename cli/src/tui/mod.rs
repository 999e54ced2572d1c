pub mod app;
pub mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use taskdeck_core::{FileSessionProvider, SessionProvider, TaskRepository, TaskStore};
use tokio::runtime::Handle;

use crate::tui::app::{App, Exit};

const TICK: Duration = Duration::from_millis(100);

pub struct Outcome {
    /// The server rejected the session.
    pub signed_out: bool,
    /// The user chose to sign out.
    pub logged_out: bool,
}

pub fn run<R: TaskRepository + 'static>(
    store: Arc<TaskStore<R>>,
    session: Arc<FileSessionProvider>,
    handle: Handle,
) -> Result<Outcome> {
    let user_name = session.user().map(|u| u.name).unwrap_or_default();
    let mut app = App::new(store, handle, user_name);
    app.start(session.token());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let logged_out = match res {
        Ok(Exit::Logout) => {
            session.logout();
            true
        }
        Ok(Exit::Quit) => false,
        Err(err) => {
            tracing::error!(error = %err, "terminal ui failed");
            println!("{:?}", err);
            false
        }
    };

    Ok(Outcome {
        signed_out: app.signed_out,
        logged_out,
    })
}

fn run_app<B: Backend, R: TaskRepository + 'static>(
    terminal: &mut Terminal<B>,
    app: &mut App<R>,
) -> io::Result<Exit> {
    loop {
        app.tick();
        if app.signed_out {
            return Ok(Exit::Quit);
        }

        terminal
            .draw(|f| ui::draw(f, app))
            .map_err(|e| io::Error::other(e.to_string()))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(exit) = app.on_key(key.code) {
            return Ok(exit);
        }
    }
}
