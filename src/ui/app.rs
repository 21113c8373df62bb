// src/ui/app.rs

//! Controller: terminal lifecycle, the main event loop, and keybindings.
//!
//! The loop runs at a modest cadence: it blocks on keyboard input with a
//! short timeout and redraws only when the model flagged itself dirty, a key
//! was handled, or the heartbeat elapsed. Quitting kills every live process
//! group, commits `KILLED` for the interrupted steps, and flushes the full
//! state projection through the store.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::errors::Result;
use crate::model::{ModelSnapshot, TaskModel};
use crate::state::StateStore;
use crate::ui::view;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const HEARTBEAT: Duration = Duration::from_millis(500);
const CHECKPOINT_EVERY: Duration = Duration::from_secs(30);

/// Cursor, scroll, and panel state owned by the controller.
///
/// `selected_col` is `-1` for the info column, `0..` for step columns.
#[derive(Debug, Default)]
pub struct ViewState {
    pub selected_row: usize,
    pub selected_col: isize,
    pub top_row: usize,
    pub left_step: usize,
    pub debug_visible: bool,
    pub output_scroll: usize,
    pub debug_scroll: usize,
    /// Rows the grid could show last frame; the view keeps this current so
    /// PgUp/PgDn can page by a real screenful.
    pub grid_rows: usize,
}

pub struct App {
    model: Arc<TaskModel>,
    engine: Engine,
    store: StateStore,
    title: String,
    vs: ViewState,
}

impl App {
    pub fn new(model: Arc<TaskModel>, engine: Engine, store: StateStore, title: String) -> Self {
        Self {
            model,
            engine,
            store,
            title,
            vs: ViewState::default(),
        }
    }

    /// Run the dashboard until the user quits: drain (killing any
    /// still-running steps), commit final state, then tear down the
    /// terminal.
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let loop_result = self.event_loop(&mut terminal);

        // Kill whatever is still running and persist, even when the loop
        // died on a terminal error.
        self.engine.apply(self.model.shutdown());
        let save_result = self.store.save(&self.model.persisted());

        restore_terminal(&mut terminal);
        info!("dashboard shut down");
        loop_result?;
        save_result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        self.engine.apply(self.model.startup_actions());

        let mut needs_redraw = true;
        let mut last_draw = Instant::now();
        let mut last_checkpoint = Instant::now();

        loop {
            if needs_redraw || self.model.take_dirty() || last_draw.elapsed() >= HEARTBEAT {
                let snap = self.model.snapshot();
                self.clamp_selection(&snap);
                let (output, debug_log) = self.selected_tails();
                terminal.draw(|frame| {
                    view::draw(frame, &self.title, &snap, &mut self.vs, &output, &debug_log)
                })?;
                last_draw = Instant::now();
                needs_redraw = false;
            }

            if event::poll(POLL_INTERVAL)? {
                match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if !self.handle_key(key) {
                            return Ok(());
                        }
                        needs_redraw = true;
                    }
                    Event::Resize(_, _) => needs_redraw = true,
                    _ => {}
                }
            }

            if last_checkpoint.elapsed() >= CHECKPOINT_EVERY {
                if let Err(err) = self.store.save(&self.model.persisted()) {
                    warn!(error = %err, "checkpoint save failed; will retry");
                }
                last_checkpoint = Instant::now();
            }
        }
    }

    /// Returns false when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let task_count = self.model.task_count();
        let last_row = task_count.saturating_sub(1);
        let page = self.vs.grid_rows.max(1);

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Char('q') => return false,

            KeyCode::Char('d') => self.vs.debug_visible = !self.vs.debug_visible,

            KeyCode::Up => self.select_row(self.vs.selected_row.saturating_sub(1)),
            KeyCode::Down => self.select_row((self.vs.selected_row + 1).min(last_row)),
            KeyCode::Home => self.select_row(0),
            KeyCode::End => self.select_row(last_row),
            KeyCode::PageUp => self.select_row(self.vs.selected_row.saturating_sub(page)),
            KeyCode::PageDown => self.select_row((self.vs.selected_row + page).min(last_row)),

            KeyCode::Left => self.select_col((self.vs.selected_col - 1).max(-1)),
            KeyCode::Right => {
                let steps = self.model.step_count(self.vs.selected_row) as isize;
                if steps > 0 {
                    self.select_col((self.vs.selected_col + 1).min(steps - 1));
                }
            }

            KeyCode::Char('r') => {
                if self.vs.selected_col >= 0 {
                    let actions = self
                        .model
                        .rerun(self.vs.selected_row, self.vs.selected_col as usize);
                    self.engine.apply(actions);
                }
            }
            KeyCode::Char('k') => {
                let actions = self.model.kill(self.vs.selected_row);
                self.engine.apply(actions);
            }

            KeyCode::Char('[') => self.vs.output_scroll += 1,
            KeyCode::Char(']') => self.vs.output_scroll = self.vs.output_scroll.saturating_sub(1),
            KeyCode::Char('{') => self.vs.debug_scroll += 1,
            KeyCode::Char('}') => self.vs.debug_scroll = self.vs.debug_scroll.saturating_sub(1),

            _ => {}
        }
        true
    }

    fn select_row(&mut self, row: usize) {
        if row != self.vs.selected_row {
            self.vs.selected_row = row;
            self.vs.output_scroll = 0;
            self.vs.debug_scroll = 0;
        }
    }

    fn select_col(&mut self, col: isize) {
        if col != self.vs.selected_col {
            self.vs.selected_col = col;
            self.vs.output_scroll = 0;
            self.vs.debug_scroll = 0;
        }
    }

    fn clamp_selection(&mut self, snap: &ModelSnapshot) {
        if snap.tasks.is_empty() {
            self.vs.selected_row = 0;
            self.vs.selected_col = -1;
            return;
        }
        self.vs.selected_row = self.vs.selected_row.min(snap.tasks.len() - 1);
        let steps = snap.tasks[self.vs.selected_row].steps.len() as isize;
        self.vs.selected_col = self.vs.selected_col.min(steps - 1).max(-1);
    }

    fn selected_tails(&self) -> (Vec<String>, Vec<String>) {
        if self.vs.selected_col < 0 {
            return (Vec::new(), Vec::new());
        }
        let step = self.vs.selected_col as usize;
        (
            self.model.output_tail(self.vs.selected_row, step),
            self.model.debug_tail(self.vs.selected_row, step),
        )
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

/// Best-effort teardown; every exit path must leave the terminal usable.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) {
    let _ = terminal::disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}
