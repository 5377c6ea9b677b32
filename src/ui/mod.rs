use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;
use regex::Regex;
use time::{macros::format_description, OffsetDateTime};
use unicode_width::UnicodeWidthStr;

use crate::app::actions::{records_label, StatusLevel};
use crate::app::state::{AddRecordOverlay, AppState, DeleteOverlay, OverlayState, PathPromptOverlay};
use crate::config::AppConfig;
use crate::highlight::{build_highlight_regex, split_matches};
use crate::store::{Field, Record, RecordStore};

const KEY_HINTS: &str =
    "a add • d delete • space mark • / search • x clear • ^s save • i import • e export • ^r reload • q quit";

pub fn draw_app(
    frame: &mut Frame,
    store: &RecordStore,
    state: &AppState,
    config: &AppConfig,
    table_state: &mut TableState,
) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(frame.size());

    draw_search_bar(frame, vertical[0], store, state);

    let highlight = if config.search.highlight_matches {
        build_highlight_regex(store.search_term())
    } else {
        None
    };
    draw_table(frame, vertical[1], store, state, highlight.as_ref(), table_state);
    draw_status(frame, vertical[2], store, state);

    if state.overlay().is_some() {
        render_overlay(frame, state);
    }
}

fn draw_search_bar(frame: &mut Frame, area: Rect, store: &RecordStore, state: &AppState) {
    let border_style = if state.is_search_active() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let text = if state.search.query.is_empty() && !state.is_search_active() {
        Line::from(Span::styled(
            "Press / to search topic, category, description and importance",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(state.search.query.clone())
    };
    let title = if store.search_term().is_empty() {
        " Search ".to_string()
    } else {
        format!(" Search ({} of {}) ", store.view_len(), store.len())
    };
    let paragraph = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );
    frame.render_widget(paragraph, area);

    if state.is_search_active() && state.overlay().is_none() {
        let x = area.x + 1 + state.search.query.width() as u16;
        frame.set_cursor(x.min(area.right().saturating_sub(2)), area.y + 1);
    }
}

fn draw_table(
    frame: &mut Frame,
    area: Rect,
    store: &RecordStore,
    state: &AppState,
    highlight: Option<&Regex>,
    table_state: &mut TableState,
) {
    let match_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let marked_style = Style::default().fg(Color::Magenta);

    let view = store.view();
    let rows: Vec<Row> = view
        .iter()
        .map(|record| {
            let marked = state.is_marked(record.id);
            let id_label = if marked {
                format!("*{}", record.id)
            } else {
                record.id.to_string()
            };
            let mut cells = Vec::with_capacity(5);
            cells.push(Cell::from(id_label));
            for field in Field::ALL {
                cells.push(Cell::from(highlight_cell(
                    record.field(field),
                    highlight,
                    match_style,
                )));
            }
            let row = Row::new(cells);
            if marked {
                row.style(marked_style)
            } else {
                row
            }
        })
        .collect();

    let empty = rows.is_empty();
    let header = Row::new(
        std::iter::once("ID")
            .chain(Field::ALL.iter().map(|field| field.label()))
            .map(Cell::from),
    )
    .style(Style::default().add_modifier(Modifier::BOLD))
    .bottom_margin(1);

    let title = format!(" Records ({}) ", records_label(store.len()));
    let table = Table::new(
        rows,
        [
            Constraint::Length(id_column_width(&view)),
            Constraint::Percentage(20),
            Constraint::Percentage(18),
            Constraint::Percentage(42),
            Constraint::Percentage(14),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, table_state);

    if empty {
        let message = if store.is_empty() {
            "No records yet. Press a to add one."
        } else {
            "No records match the current search."
        };
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 3,
            width: area.width.saturating_sub(4),
            height: 1.min(area.height.saturating_sub(4)),
        };
        frame.render_widget(
            Paragraph::new(Span::styled(message, Style::default().fg(Color::DarkGray))),
            inner,
        );
    }
}

fn id_column_width(view: &[&Record]) -> u16 {
    let widest = view
        .iter()
        .map(|record| record.id.to_string().len() + 1)
        .max()
        .unwrap_or(0);
    widest.max(3) as u16
}

fn highlight_cell(text: &str, regex: Option<&Regex>, match_style: Style) -> Line<'static> {
    let spans: Vec<Span<'static>> = split_matches(text, regex)
        .into_iter()
        .map(|(segment, hit)| {
            if hit {
                Span::styled(segment.to_string(), match_style)
            } else {
                Span::raw(segment.to_string())
            }
        })
        .collect();
    Line::from(spans)
}

fn draw_status(frame: &mut Frame, area: Rect, store: &RecordStore, state: &AppState) {
    let file = store
        .current_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<no file>".to_string());
    let mut summary = vec![
        Span::styled(file, Style::default().fg(Color::Cyan)),
        Span::raw(format!("  {}/{} shown", store.view_len(), store.len())),
    ];
    if !state.marked.is_empty() {
        summary.push(Span::raw(format!("  {} marked", state.marked.len())));
    }
    if state.dirty {
        summary.push(Span::styled(
            "  [modified]",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    } else if let Some(saved) = state.last_saved {
        summary.push(Span::styled(
            format!("  saved {}", format_time_short(saved)),
            Style::default().fg(Color::Gray),
        ));
    }

    let message = match state.status() {
        Some(report) => {
            let style = match report.level {
                StatusLevel::Info => Style::default(),
                StatusLevel::Warn => Style::default().fg(Color::Yellow),
                StatusLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            };
            Line::from(Span::styled(report.message.clone(), style))
        }
        None => Line::from(Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray))),
    };

    let text = Text::from(vec![Line::from(summary), message]);
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(paragraph, area);
}

fn format_time_short(dt: OffsetDateTime) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| "--:--:--".into())
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::AddRecord(overlay)) => render_add_record(frame, overlay),
        Some(OverlayState::ConfirmDelete(overlay)) => render_confirm_delete(frame, overlay),
        Some(OverlayState::PathPrompt(overlay)) => render_path_prompt(frame, overlay),
        None => {}
    }
}

fn render_add_record(frame: &mut Frame, overlay: &AddRecordOverlay) {
    let area = centered_rect(60, 40, frame.size());
    frame.render_widget(Clear, area);

    let label_width = Field::ALL
        .iter()
        .map(|field| field.label().width())
        .max()
        .unwrap_or(0);
    let mut lines = Vec::with_capacity(Field::ALL.len() + 2);
    let mut cursor = None;
    for (row, field) in Field::ALL.iter().enumerate() {
        let focused = *field == overlay.focus;
        let marker = if focused { "> " } else { "  " };
        let label = format!("{marker}{:<label_width$}  ", field.label());
        let label_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let value = overlay.draft.field(*field);
        if focused {
            cursor = Some((label.width() + value.width(), row));
        }
        lines.push(Line::from(vec![
            Span::styled(label, label_style),
            Span::raw(value.to_string()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab next field • Enter add • Ctrl-u clear inputs • Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Add record "),
    );
    frame.render_widget(paragraph, area);

    if let Some((column, row)) = cursor {
        let x = (area.x + 1 + column as u16).min(area.right().saturating_sub(2));
        frame.set_cursor(x, area.y + 1 + row as u16);
    }
}

fn render_confirm_delete(frame: &mut Frame, overlay: &DeleteOverlay) {
    let area = centered_rect(50, 25, frame.size());
    frame.render_widget(Clear, area);
    let ids = overlay
        .ids
        .iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ");
    let lines = vec![
        Line::from(format!("Delete {}?", records_label(overlay.ids.len()))),
        Line::from(Span::styled(ids, Style::default().fg(Color::Gray))),
        Line::from(""),
        Line::from(Span::styled(
            "y/Enter delete • n/Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm delete "),
    );
    frame.render_widget(paragraph, area);
}

fn render_path_prompt(frame: &mut Frame, overlay: &PathPromptOverlay) {
    let area = centered_rect(70, 20, frame.size());
    frame.render_widget(Clear, area);
    let lines = vec![
        Line::from(overlay.input.clone()),
        Line::from(""),
        Line::from(Span::styled(
            "Enter confirm • Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", overlay.action.title())),
    );
    frame.render_widget(paragraph, area);

    let x = area.x + 1 + overlay.input.width() as u16;
    frame.set_cursor(x.min(area.right().saturating_sub(2)), area.y + 1);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn renders_rows_and_status() -> anyhow::Result<()> {
        let mut store = RecordStore::default();
        store.insert("Quarterly", "Finance", "Budget review", "High")?;
        store.insert("Garden", "Home", "Plant tomatoes", "Low")?;
        store.set_search_term("garden");
        let state = AppState::new();
        let config = AppConfig::default();
        let mut table_state = TableState::default();

        let mut terminal = Terminal::new(TestBackend::new(100, 20))?;
        terminal.draw(|frame| draw_app(frame, &store, &state, &config, &mut table_state))?;
        let text = buffer_text(&terminal);

        assert!(text.contains("Garden"), "{text}");
        assert!(!text.contains("Quarterly"), "{text}");
        assert!(text.contains("1/2 shown"), "{text}");
        assert!(text.contains("Search (1 of 2)"), "{text}");
        Ok(())
    }

    #[test]
    fn empty_store_shows_hint() -> anyhow::Result<()> {
        let store = RecordStore::default();
        let state = AppState::new();
        let config = AppConfig::default();
        let mut table_state = TableState::default();

        let mut terminal = Terminal::new(TestBackend::new(80, 16))?;
        terminal.draw(|frame| draw_app(frame, &store, &state, &config, &mut table_state))?;
        assert!(buffer_text(&terminal).contains("No records yet"));
        Ok(())
    }

    #[test]
    fn id_column_fits_largest_id() {
        let record = Record {
            id: 123456,
            topic: "t".into(),
            category: "c".into(),
            description: "d".into(),
            importance: "i".into(),
        };
        assert_eq!(id_column_width(&[&record]), 7);
        assert_eq!(id_column_width(&[]), 3);
    }
}
