use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use ratatui::widgets::TableState;
use taskdeck_core::{
    counts, parse_new_task, FilterCounts, FilterMode, StorePhase, StoreError, StoreSnapshot,
    Task, TaskRepository, TaskStore, ViewQuery,
};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

const NOTICE_TTL: Duration = Duration::from_secs(5);

pub enum InputMode {
    Normal,
    Adding,
    Searching,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub is_error: bool,
    shown_at: Instant,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
            shown_at: Instant::now(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            shown_at: Instant::now(),
        }
    }
}

/// Why the event loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    Logout,
}

/// Results of background requests, delivered back to the UI thread.
#[derive(Debug)]
pub enum AppEvent {
    Notice(Notice),
    SignedOut,
}

pub struct App<R: TaskRepository + 'static> {
    store: Arc<TaskStore<R>>,
    handle: Handle,
    updates: watch::Receiver<StoreSnapshot>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    pub snapshot: StoreSnapshot,
    pub query: ViewQuery,
    pub view: Vec<Task>,
    pub totals: FilterCounts,
    pub state: TableState,
    pub input: String,
    pub input_mode: InputMode,
    pub cursor_position: usize,
    pub notice: Option<Notice>,
    pub user_name: String,
    pub signed_out: bool,
}

impl<R: TaskRepository + 'static> App<R> {
    pub fn new(store: Arc<TaskStore<R>>, handle: Handle, user_name: String) -> Self {
        let updates = store.subscribe();
        let snapshot = store.snapshot();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut app = App {
            store,
            handle,
            updates,
            events_tx,
            events_rx,
            snapshot,
            query: ViewQuery::default(),
            view: Vec::new(),
            totals: FilterCounts::default(),
            state: TableState::default(),
            input: String::new(),
            input_mode: InputMode::Normal,
            cursor_position: 0,
            notice: None,
            user_name,
            signed_out: false,
        };
        app.reproject();
        app
    }

    /// Pulls store changes and finished requests into the UI state.
    pub fn tick(&mut self) {
        if self.updates.has_changed().unwrap_or(false) {
            self.snapshot = self.updates.borrow_and_update().clone();
            if self.snapshot.phase == StorePhase::Unauthenticated {
                self.signed_out = true;
            }
            self.reproject();
        }

        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::Notice(notice) => self.notice = Some(notice),
                AppEvent::SignedOut => self.signed_out = true,
            }
        }

        if self.notice.as_ref().is_some_and(|n| n.shown_at.elapsed() > NOTICE_TTL) {
            self.notice = None;
        }
    }

    /// Maps a key press to an action. Returns `Some` when the UI should close.
    pub fn on_key(&mut self, code: KeyCode) -> Option<Exit> {
        match self.input_mode {
            InputMode::Normal => match code {
                KeyCode::Char('q') => return Some(Exit::Quit),
                KeyCode::Char('L') => return Some(Exit::Logout),
                KeyCode::Down | KeyCode::Char('j') => self.next(),
                KeyCode::Up | KeyCode::Char('k') => self.previous(),
                KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(),
                KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(),
                KeyCode::Char('a') => self.enter_add_mode(),
                KeyCode::Char('/') => self.enter_search_mode(),
                KeyCode::Char('f') | KeyCode::Tab => self.cycle_filter(),
                KeyCode::Char('1') => self.set_filter(FilterMode::All),
                KeyCode::Char('2') => self.set_filter(FilterMode::Pending),
                KeyCode::Char('3') => self.set_filter(FilterMode::Completed),
                KeyCode::Char('r') => self.refresh(),
                KeyCode::Char('R') if self.snapshot.phase == StorePhase::Error => self.retry(),
                KeyCode::Esc | KeyCode::Char('x') => self.dismiss_notice(),
                _ => {}
            },
            InputMode::Adding | InputMode::Searching => match code {
                KeyCode::Enter => self.submit_input(),
                KeyCode::Esc => self.cancel_input(),
                KeyCode::Char(c) => self.input_char(c),
                KeyCode::Backspace => self.delete_char(),
                KeyCode::Left => self.move_cursor_left(),
                KeyCode::Right => self.move_cursor_right(),
                _ => {}
            },
        }
        None
    }

    fn reproject(&mut self) {
        let selected_id = self.selected_task().map(|t| t.id);
        self.view = self.snapshot.view(&self.query);
        self.totals = counts(&self.snapshot.tasks);

        // Keep the cursor on the same task when it is still visible.
        let index = selected_id
            .and_then(|id| self.view.iter().position(|t| t.id == id))
            .or_else(|| self.state.selected().map(|i| i.min(self.view.len().saturating_sub(1))));
        if self.view.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(index.unwrap_or(0)));
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.view.get(i))
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.phase == StorePhase::Loading || self.snapshot.phase == StorePhase::Uninitialized
    }

    pub fn next(&mut self) {
        if self.view.is_empty() { return; }

        let i = match self.state.selected() {
            Some(i) if i + 1 < self.view.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.view.is_empty() { return; }

        let i = match self.state.selected() {
            Some(0) | None => self.view.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn set_filter(&mut self, filter: FilterMode) {
        self.query.filter = filter;
        self.reproject();
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.query.filter.next());
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Starts the initial load in the background.
    pub fn start(&self, token: Option<String>) {
        self.spawn(|store| async move { report_fetch(store.initialize(token).await) });
    }

    pub fn refresh(&self) {
        self.spawn(|store| async move { report_fetch(store.refresh().await) });
    }

    pub fn retry(&self) {
        self.spawn(|store| async move { report_fetch(store.retry().await) });
    }

    pub fn toggle_selected(&self) {
        if let Some(id) = self.selected_task().map(|t| t.id) {
            self.spawn(move |store| async move {
                match store.toggle_task(id).await {
                    Ok(_) => None,
                    Err(e) => Some(failure_event(e)),
                }
            });
        }
    }

    pub fn delete_selected(&self) {
        if let Some(id) = self.selected_task().map(|t| t.id) {
            self.spawn(move |store| async move {
                match store.delete_task(id).await {
                    Ok(Some(task)) => Some(AppEvent::Notice(Notice::info(format!("Deleted \"{}\"", task.title)))),
                    Ok(None) => None,
                    Err(e) => Some(failure_event(e)),
                }
            });
        }
    }

    fn spawn<F, Fut>(&self, op: F)
    where
        F: FnOnce(Arc<TaskStore<R>>) -> Fut,
        Fut: std::future::Future<Output = Option<AppEvent>> + Send + 'static,
    {
        let events = self.events_tx.clone();
        let fut = op(self.store.clone());
        self.handle.spawn(async move {
            if let Some(event) = fut.await {
                // The receiver only goes away when the UI has exited.
                let _ = events.send(event);
            }
        });
    }

    pub fn enter_add_mode(&mut self) {
        self.input_mode = InputMode::Adding;
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn enter_search_mode(&mut self) {
        self.input_mode = InputMode::Searching;
        self.input = self.query.search.clone();
        self.cursor_position = self.input.chars().count();
    }

    pub fn exit_input_mode(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn input_char(&mut self, c: char) {
        let byte_index = self.byte_index(self.cursor_position);
        self.input.insert(byte_index, c);
        self.cursor_position += 1;
        self.on_input_changed();
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            let byte_index = self.byte_index(self.cursor_position - 1);
            self.input.remove(byte_index);
            self.cursor_position -= 1;
            self.on_input_changed();
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.input.chars().take(char_index).map(|c| c.len_utf8()).sum()
    }

    // Search narrows the list as the user types.
    fn on_input_changed(&mut self) {
        if matches!(self.input_mode, InputMode::Searching) {
            self.query.search = self.input.clone();
            self.reproject();
        }
    }

    pub fn submit_input(&mut self) {
        if matches!(self.input_mode, InputMode::Adding) {
            self.submit_add();
        }
        self.input.clear();
        self.cursor_position = 0;
        self.exit_input_mode();
    }

    /// Esc in search mode also clears the search.
    pub fn cancel_input(&mut self) {
        if matches!(self.input_mode, InputMode::Searching) {
            self.query.search.clear();
            self.reproject();
        }
        self.input.clear();
        self.cursor_position = 0;
        self.exit_input_mode();
    }

    fn submit_add(&mut self) {
        let args: Vec<String> = self.input.split_whitespace().map(|s| s.to_string()).collect();
        let (new_task, warnings) = parse_new_task(&args);
        if let Some(warning) = warnings.first() {
            self.notice = Some(Notice::error(warning.to_string()));
        }

        self.spawn(move |store| async move {
            match store.add_task(&new_task.title, &new_task.description).await {
                Ok(task) => Some(AppEvent::Notice(Notice::info(format!("Added \"{}\"", task.title)))),
                Err(e) => Some(failure_event(e)),
            }
        });
    }
}

fn failure_event(err: StoreError) -> AppEvent {
    if err.is_auth_failure() {
        return AppEvent::SignedOut;
    }
    match err.repository_error() {
        Some(cause) => AppEvent::Notice(Notice::error(format!("{}: {}", err, cause))),
        None => AppEvent::Notice(Notice::error(err.to_string())),
    }
}

// Fetch failures already show as the error panel; only sign-out needs an event.
fn report_fetch(result: Result<(), StoreError>) -> Option<AppEvent> {
    match result {
        Err(e) if e.is_auth_failure() => Some(AppEvent::SignedOut),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taskdeck_core::repository::RepositoryResult;
    use taskdeck_core::{NewTask, RepositoryError, SessionProvider, TaskId, TaskPatch, User};
    use tokio::runtime::Runtime;

    /// Answers from a fixed list; every update times out.
    struct FixedRepo {
        tasks: Vec<Task>,
    }

    #[async_trait]
    impl TaskRepository for FixedRepo {
        async fn list(&self, _token: &str) -> RepositoryResult<Vec<Task>> {
            Ok(self.tasks.clone())
        }

        async fn create(&self, _token: &str, task: &NewTask) -> RepositoryResult<Task> {
            Ok(Task::new(100, task.title.clone(), false))
        }

        async fn update(&self, _token: &str, _id: TaskId, _patch: TaskPatch) -> RepositoryResult<Option<Task>> {
            Err(RepositoryError::Timeout)
        }

        async fn delete(&self, _token: &str, _id: TaskId) -> RepositoryResult<()> {
            Ok(())
        }
    }

    struct NoopSession;

    impl SessionProvider for NoopSession {
        fn user(&self) -> Option<User> { None }
        fn token(&self) -> Option<String> { Some("t".into()) }
        fn logout(&self) {}
    }

    fn app(rt: &Runtime) -> App<FixedRepo> {
        let repo = FixedRepo {
            tasks: vec![
                Task::new(1, "Tarefa 1", false),
                Task::new(2, "Tarefa 2", true),
                Task::new(3, "Comprar pão", false),
            ],
        };
        let store = Arc::new(TaskStore::new(repo, Arc::new(NoopSession)));
        rt.block_on(store.initialize(Some("t".into()))).unwrap();
        App::new(store, rt.handle().clone(), "Usuário Teste".into())
    }

    fn wait_for(app: &mut App<FixedRepo>, done: impl Fn(&App<FixedRepo>) -> bool) {
        for _ in 0..200 {
            app.tick();
            if done(&*app) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached");
    }

    fn titles(app: &App<FixedRepo>) -> Vec<&str> {
        app.view.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_filter_and_selection_follow_task() {
        let rt = Runtime::new().unwrap();
        let mut app = app(&rt);
        assert_eq!(app.totals.all, 3);
        app.next();
        app.next();
        assert_eq!(app.selected_task().map(|t| t.id), Some(3));

        app.set_filter(FilterMode::Pending);
        assert_eq!(titles(&app), vec!["Tarefa 1", "Comprar pão"]);
        assert_eq!(app.selected_task().map(|t| t.id), Some(3));

        app.cycle_filter();
        assert_eq!(app.query.filter, FilterMode::Completed);
        assert_eq!(titles(&app), vec!["Tarefa 2"]);
    }

    #[test]
    fn test_search_is_live_and_esc_clears_it() {
        let rt = Runtime::new().unwrap();
        let mut app = app(&rt);

        app.enter_search_mode();
        for c in "PÃO".chars() {
            app.input_char(c);
        }
        assert_eq!(titles(&app), vec!["Comprar pão"]);

        app.delete_char();
        assert_eq!(app.input, "PÃ");

        app.cancel_input();
        assert_eq!(app.query.search, "");
        assert_eq!(app.view.len(), 3);
    }

    #[test]
    fn test_failed_toggle_shows_notice_and_rolls_back() {
        let rt = Runtime::new().unwrap();
        let mut app = app(&rt);

        app.toggle_selected();
        wait_for(&mut app, |a| a.notice.is_some());

        let notice = app.notice.clone().unwrap();
        assert!(notice.is_error);
        assert!(notice.message.starts_with("Failed to update task 1"));
        wait_for(&mut app, |a| !a.view[0].done);
        app.dismiss_notice();
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_sign_out_key_only_in_normal_mode() {
        let rt = Runtime::new().unwrap();
        let mut app = app(&rt);

        app.on_key(KeyCode::Char('a'));
        assert_eq!(app.on_key(KeyCode::Char('L')), None);
        assert_eq!(app.input, "L");

        app.on_key(KeyCode::Esc);
        assert_eq!(app.on_key(KeyCode::Char('L')), Some(Exit::Logout));
        assert_eq!(app.on_key(KeyCode::Char('q')), Some(Exit::Quit));
    }

    #[test]
    fn test_add_from_input_line() {
        let rt = Runtime::new().unwrap();
        let mut app = app(&rt);

        app.enter_add_mode();
        for c in "Nova Tarefa".chars() {
            app.input_char(c);
        }
        app.submit_input();

        wait_for(&mut app, |a| a.view.len() == 4);
        assert_eq!(app.view[3].title, "Nova Tarefa");
    }
}
