use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::store::RecordStore;
use crate::ui;

pub mod actions;
pub mod state;

pub use actions::{ActionDispatcher, Outcome, StatusLevel, StatusReport};
pub use state::{AppState, OverlayState, PathAction};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    SelectFirst,
    SelectLast,
    ToggleMark,
    AddRecord,
    DeleteRecords,
    StartSearch,
    ClearSearch,
    Save,
    Reload,
    Import,
    Export,
}

pub struct App {
    pub config: Arc<AppConfig>,
    store: RecordStore,
    state: AppState,
    table_state: TableState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    /// Opens the configured data file. A broken file leaves the table empty
    /// and the error in the status bar.
    pub fn new(config: Arc<AppConfig>) -> Self {
        let mut store = RecordStore::new(config.store.id_policy);
        let mut state = AppState::new();
        state.load(&mut store, &config.store.data_file);
        let tick_rate = config.ui.tick_rate();
        Self {
            config,
            store,
            state,
            table_state: TableState::default(),
            should_quit: false,
            tick_rate,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| {
                    if self.store.view_len() == 0 {
                        self.table_state.select(None);
                    } else {
                        self.table_state.select(Some(self.state.selected));
                    }
                    ui::draw_app(
                        frame,
                        &self.store,
                        &self.state,
                        &self.config,
                        &mut self.table_state,
                    );
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            if event::poll(self.tick_rate).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);

        if !matches!(key.code, KeyCode::Char('q')) {
            self.state.disarm_quit();
        }

        if self.handle_overlay_key(key, plain) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => {
                    self.state.clear_search(&mut self.store);
                    return;
                }
                KeyCode::Enter => {
                    self.state.finish_search();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_search_char(&mut self.store);
                    return;
                }
                KeyCode::Char(ch) if plain => {
                    self.state.push_search_char(&mut self.store, ch);
                    return;
                }
                _ => {}
            }
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let action = match key.code {
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            KeyCode::Char('s') if ctrl => Some(Action::Save),
            KeyCode::Char('r') if ctrl => Some(Action::Reload),
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('j') if plain => Some(Action::SelectNext),
            KeyCode::Char('k') if plain => Some(Action::SelectPrevious),
            KeyCode::Char('g') if plain => Some(Action::SelectFirst),
            KeyCode::Char('G') if plain => Some(Action::SelectLast),
            KeyCode::Char(' ') if plain => Some(Action::ToggleMark),
            KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Home => Some(Action::SelectFirst),
            KeyCode::End => Some(Action::SelectLast),
            KeyCode::Char('a') if plain => Some(Action::AddRecord),
            KeyCode::Char('d') | KeyCode::Delete if plain => Some(Action::DeleteRecords),
            KeyCode::Char('/') if plain => Some(Action::StartSearch),
            KeyCode::Char('x') | KeyCode::Esc if plain => Some(Action::ClearSearch),
            KeyCode::Char('i') if plain => Some(Action::Import),
            KeyCode::Char('e') if plain => Some(Action::Export),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                if self.state.request_quit() {
                    self.should_quit = true;
                }
            }
            Action::SelectNext => self.state.move_selection(&self.store, 1),
            Action::SelectPrevious => self.state.move_selection(&self.store, -1),
            Action::SelectFirst => self.state.move_selection(&self.store, isize::MIN / 2),
            Action::SelectLast => self.state.move_selection(&self.store, isize::MAX / 2),
            Action::ToggleMark => {
                self.state.toggle_mark(&self.store);
                self.state.move_selection(&self.store, 1);
            }
            Action::AddRecord => self.state.open_add_record(),
            Action::DeleteRecords => {
                let confirm = self.config.ui.confirm_delete;
                self.state.open_delete(&mut self.store, confirm);
            }
            Action::StartSearch => self.state.begin_search(),
            Action::ClearSearch => {
                if !self.store.search_term().is_empty() || !self.state.search.query.is_empty() {
                    self.state.clear_search(&mut self.store);
                }
            }
            Action::Save => self.state.save(&mut self.store),
            Action::Reload => self.state.reload(&mut self.store),
            Action::Import => {
                let initial = self.default_prompt_path();
                self.state.open_path_prompt(PathAction::Import, initial);
            }
            Action::Export => {
                let initial = self.default_prompt_path();
                self.state.open_path_prompt(PathAction::Export, initial);
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent, plain: bool) -> bool {
        match self.state.overlay() {
            Some(OverlayState::AddRecord(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status(StatusReport::info("Add canceled"));
                    }
                    KeyCode::Enter => self.state.submit_add_record(&mut self.store),
                    KeyCode::Tab | KeyCode::Down => self.state.add_record_next_field(),
                    KeyCode::BackTab | KeyCode::Up => self.state.add_record_prev_field(),
                    KeyCode::Backspace => self.state.add_record_pop_char(),
                    KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.state.add_record_clear_inputs();
                    }
                    KeyCode::Char(ch) if plain => self.state.add_record_push_char(ch),
                    _ => {}
                }
                true
            }
            Some(OverlayState::ConfirmDelete(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status(StatusReport::info("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => {
                        self.state.submit_delete(&mut self.store);
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::PathPrompt(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status(StatusReport::info("Canceled"));
                    }
                    KeyCode::Enter => self.state.submit_path_prompt(&mut self.store),
                    KeyCode::Backspace => self.state.path_prompt_pop_char(),
                    KeyCode::Char(ch) if plain => self.state.path_prompt_push_char(ch),
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn default_prompt_path(&self) -> String {
        self.store
            .current_path()
            .and_then(|path| path.parent())
            .map(|dir| {
                let mut shown = dir.display().to_string();
                if !shown.is_empty() && !shown.ends_with(std::path::MAIN_SEPARATOR) {
                    shown.push(std::path::MAIN_SEPARATOR);
                }
                shown
            })
            .unwrap_or_default()
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
