// src/ui/view.rs

//! Pure projection of a model snapshot to a ratatui frame.
//!
//! The renderer mutates nothing but the scroll fields of [`ViewState`]
//! (which depend on the terminal geometry only known here) and never touches
//! the model lock: it draws from the snapshot copy the controller handed it.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;

use crate::model::task::Status;
use crate::model::ModelSnapshot;
use crate::ui::app::ViewState;

pub const DEBUG_PANEL_HEIGHT: u16 = 12;
const MIN_MAIN_HEIGHT: u16 = 10;
const INFO_COL_WIDTH: u16 = 20;
const MIN_STEP_COL_WIDTH: u16 = 12;

const HELP_TEXT: &str =
    "arrows/PgUp/PgDn/Home/End nav | r rerun | k kill | d debug | [ ] output | { } debug | q quit";

pub fn draw(
    frame: &mut Frame,
    title: &str,
    snap: &ModelSnapshot,
    vs: &mut ViewState,
    output: &[String],
    debug_log: &[String],
) {
    let area = frame.area();

    let debug_fits = area.height >= MIN_MAIN_HEIGHT + DEBUG_PANEL_HEIGHT;
    let debug_active = vs.debug_visible && debug_fits;

    let chunks = if debug_active {
        Layout::vertical([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(DEBUG_PANEL_HEIGHT),
        ])
        .split(area)
    } else {
        Layout::vertical([Constraint::Length(2), Constraint::Min(5)]).split(area)
    };

    draw_header(frame, chunks[0], title, vs.debug_visible && !debug_fits);

    let main = Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    draw_grid(frame, main[0], snap, vs);
    draw_output(frame, main[1], snap, vs, output);

    if debug_active {
        draw_debug(frame, chunks[2], snap, vs, debug_log);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, title: &str, debug_hidden: bool) {
    let mut help = HELP_TEXT.to_string();
    if debug_hidden {
        help.push_str(" (debug hidden: terminal too small)");
    }
    let text = vec![
        Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD).bg(Color::Blue),
        )),
        Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(Paragraph::new(text), area);
}

fn draw_grid(frame: &mut Frame, area: Rect, snap: &ModelSnapshot, vs: &mut ViewState) {
    if snap.tasks.is_empty() {
        frame.render_widget(Paragraph::new("No tasks loaded."), area);
        return;
    }

    let name_w = snap
        .tasks
        .iter()
        .map(|t| t.name.len())
        .chain(std::iter::once("TaskName".len()))
        .max()
        .unwrap_or(8)
        .min(24) as u16;

    let headers: Vec<&str> = snap.tasks[0]
        .steps
        .iter()
        .map(|s| s.header.as_str())
        .collect();
    let step_w = headers
        .iter()
        .map(|h| h.len() as u16 + 2)
        .chain(std::iter::once(MIN_STEP_COL_WIDTH))
        .max()
        .unwrap_or(MIN_STEP_COL_WIDTH)
        .min(30);

    // Column spacing of 1 between every column.
    let fixed = name_w + 1 + INFO_COL_WIDTH + 1;
    let avail = area.width.saturating_sub(fixed);
    let visible_steps = ((avail / (step_w + 1)).max(1) as usize).min(headers.len().max(1));

    // Keep the selected step column in the window.
    if vs.selected_col >= 0 {
        let col = vs.selected_col as usize;
        if col < vs.left_step {
            vs.left_step = col;
        } else if col >= vs.left_step + visible_steps {
            vs.left_step = col + 1 - visible_steps;
        }
    } else {
        vs.left_step = 0;
    }
    let step_window = vs.left_step..(vs.left_step + visible_steps).min(headers.len());

    // Keep the selected row in the window.
    let visible_rows = area.height.saturating_sub(1).max(1) as usize;
    vs.grid_rows = visible_rows;
    if vs.selected_row < vs.top_row {
        vs.top_row = vs.selected_row;
    } else if vs.selected_row >= vs.top_row + visible_rows {
        vs.top_row = vs.selected_row + 1 - visible_rows;
    }
    let row_window = vs.top_row..(vs.top_row + visible_rows).min(snap.tasks.len());

    let header_style = Style::default()
        .fg(Color::White)
        .bg(Color::Blue)
        .add_modifier(Modifier::BOLD);
    let mut header_cells = vec![
        Cell::from("TaskName").style(header_style),
        Cell::from("Info").style(header_style),
    ];
    for idx in step_window.clone() {
        header_cells.push(Cell::from(headers[idx]).style(header_style));
    }

    let mut rows = Vec::new();
    for row_idx in row_window {
        let task = &snap.tasks[row_idx];
        let row_selected = row_idx == vs.selected_row;

        let name_style = if row_selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let info_style = if row_selected && vs.selected_col < 0 {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let mut cells = vec![
            Cell::from(task.name.clone()).style(name_style),
            Cell::from(task.info.clone()).style(info_style),
        ];
        for step_idx in step_window.clone() {
            let step = &task.steps[step_idx];
            let selected = row_selected && vs.selected_col == step_idx as isize;
            let style = if selected {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                status_style(step.status)
            };
            cells.push(Cell::from(step.status.as_str()).style(style));
        }
        rows.push(Row::new(cells));
    }

    let mut widths = vec![Constraint::Length(name_w), Constraint::Length(INFO_COL_WIDTH)];
    widths.extend(step_window.map(|_| Constraint::Length(step_w)));

    let table = Table::new(rows, widths).header(Row::new(header_cells));
    frame.render_widget(table, area);
}

fn draw_output(
    frame: &mut Frame,
    area: Rect,
    snap: &ModelSnapshot,
    vs: &mut ViewState,
    output: &[String],
) {
    let title = selection_title(snap, vs, "Output");
    let block = Block::default().borders(Borders::TOP).title(title);
    let inner_height = area.height.saturating_sub(1) as usize;

    let lines = tail_window(output, inner_height, &mut vs.output_scroll)
        .iter()
        .map(|line| {
            if line.starts_with("[stderr] ") {
                Line::from(Span::styled(line.clone(), Style::default().fg(Color::Red)))
            } else {
                Line::from(line.clone())
            }
        })
        .collect::<Vec<_>>();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_debug(
    frame: &mut Frame,
    area: Rect,
    snap: &ModelSnapshot,
    vs: &mut ViewState,
    debug_log: &[String],
) {
    let title = selection_title(snap, vs, "Debug log");
    let block = Block::default().borders(Borders::TOP).title(title);
    let inner_height = area.height.saturating_sub(1) as usize;

    let lines = tail_window(debug_log, inner_height, &mut vs.debug_scroll)
        .iter()
        .map(|line| Line::from(line.clone()))
        .collect::<Vec<_>>();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// The window of `lines` to show: the last `height` lines, shifted up by the
/// scroll offset. Clamps the offset so scrolling stops at the oldest line.
fn tail_window<'a>(lines: &'a [String], height: usize, scroll: &mut usize) -> &'a [String] {
    if height == 0 || lines.is_empty() {
        return &[];
    }
    *scroll = (*scroll).min(lines.len().saturating_sub(height));
    let end = lines.len() - *scroll;
    let start = end.saturating_sub(height);
    &lines[start..end]
}

fn selection_title(snap: &ModelSnapshot, vs: &ViewState, what: &str) -> String {
    let Some(task) = snap.tasks.get(vs.selected_row) else {
        return format!(" {what} ");
    };
    if vs.selected_col < 0 {
        return format!(" {what}: {} ", task.name);
    }
    match task.steps.get(vs.selected_col as usize) {
        Some(step) => {
            let mut title = format!(" {what}: {} -> {} ", task.name, step.header);
            if let Some(pid) = step.pid {
                title.push_str(&format!("(pid {pid}"));
                if let Some(elapsed) = step.elapsed {
                    title.push_str(&format!(", {:.1}s", elapsed.as_secs_f64()));
                }
                title.push_str(") ");
            }
            title
        }
        None => format!(" {what}: {} ", task.name),
    }
}

fn status_style(status: Status) -> Style {
    let color = match status {
        Status::Pending => Color::Yellow,
        Status::Running => Color::Cyan,
        Status::Success => Color::Green,
        Status::Failed => Color::Red,
        Status::Skipped => Color::Blue,
        Status::Killed => Color::Magenta,
    };
    Style::default().fg(color)
}
