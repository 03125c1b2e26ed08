//! Terminal layout for the interactive front-end.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Field};

const LABEL_WIDTH: usize = 17;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(Field::ALL.len() as u16 + 2),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(f.size());

    draw_fields(f, app, chunks[0]);
    draw_echo(f, app, chunks[1]);
    draw_counts(f, app, chunks[2]);
    draw_status(f, app, chunks[3]);
}

fn draw_fields(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = Field::ALL
        .iter()
        .map(|&field| {
            let style = if field == app.focus {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{:<width$}", field.label(), width = LABEL_WIDTH), style),
                Span::raw(app.field(field).to_string()),
            ])
        })
        .collect();

    let block = Block::default().borders(Borders::ALL).title(" Settings ");
    f.render_widget(Paragraph::new(lines).block(block), area);

    // Cursor at the end of the focused field.
    let row = Field::ALL.iter().position(|&field| field == app.focus).unwrap_or(0);
    let col = LABEL_WIDTH + app.field(app.focus).chars().count();
    f.set_cursor(area.x + 1 + col as u16, area.y + 1 + row as u16);
}

fn draw_echo(f: &mut Frame, app: &App, area: Rect) {
    let text = vec![
        Line::from(format!("Send : {}", app.send_line)),
        Line::from(""),
        Line::from(format!("Receive : {}", app.receive_line)),
    ];
    let block = Block::default().borders(Borders::ALL).title(" Traffic ");
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_counts(f: &mut Frame, app: &App, area: Rect) {
    let value = app.value.as_deref().unwrap_or("");
    let state = if app.is_busy() { "receiving" } else { "idle" };
    let line = Line::from(vec![
        Span::raw(format!("Sent: {:<6}", app.sent_count)),
        Span::raw(format!("Received: {:<6}", app.received_count)),
        Span::styled(
            format!("Value: {:<12}", value),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(state),
    ]);
    let block = Block::default().borders(Borders::ALL).title(" Result ");
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let line = match &app.status {
        Some(status) if status.is_error => Line::from(Span::styled(
            format!("[ERROR] {}", status.message),
            Style::default().fg(Color::Red),
        )),
        Some(status) => Line::from(status.message.clone()),
        None => Line::from("Enter: send   Tab/Up/Down: move   Esc: quit"),
    };
    let block = Block::default().borders(Borders::ALL).title(" Status ");
    f.render_widget(Paragraph::new(line).block(block), area);
}
