use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};
use taskdeck_core::{format_server_date, FilterMode, StorePhase, TaskRepository};
use unicode_width::UnicodeWidthStr;

use crate::tui::app::{App, InputMode};

pub fn draw<R: TaskRepository + 'static>(f: &mut Frame, app: &mut App<R>) {
    let size = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Filter tabs
            Constraint::Length(3), // Search / add input
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Notice
            Constraint::Length(1), // Footer/Help
        ])
        .split(size);

    let title = if app.user_name.is_empty() {
        "TASKDECK".to_string()
    } else {
        format!("TASKDECK | Welcome, {}", app.user_name)
    };
    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(header, main_chunks[0]);

    draw_filter_tabs(f, app, main_chunks[1]);
    draw_input(f, app, main_chunks[2]);

    match app.snapshot.phase {
        StorePhase::Error => draw_error(f, app, main_chunks[3]),
        _ if app.is_loading() && app.snapshot.tasks.is_empty() => draw_message(
            f,
            main_chunks[3],
            vec![Line::from("Loading tasks...")],
        ),
        _ if app.view.is_empty() => draw_empty(f, app, main_chunks[3]),
        _ => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(main_chunks[3]);
            draw_task_list(f, app, content_chunks[0]);
            draw_detail_view(f, app, content_chunks[1]);
        }
    }

    if let Some(notice) = &app.notice {
        let color = if notice.is_error { Color::Red } else { Color::Green };
        let line = Paragraph::new(format!("{}  (x to dismiss)", notice.message))
            .style(Style::default().fg(color));
        f.render_widget(line, main_chunks[4]);
    } else if app.is_loading() && !app.snapshot.tasks.is_empty() {
        let line = Paragraph::new("Refreshing...").style(Style::default().fg(Color::DarkGray));
        f.render_widget(line, main_chunks[4]);
    }

    let help = match app.input_mode {
        InputMode::Normal => "j/k: Navigate | space: Toggle | d: Delete | a: Add | /: Search | f: Filter | r: Refresh | L: Sign out | q: Quit",
        InputMode::Adding => "Enter: Add | Esc: Cancel | title words, then desc:description",
        InputMode::Searching => "Enter: Keep search | Esc: Clear search",
    };
    let footer = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, main_chunks[5]);
}

fn draw_filter_tabs<R: TaskRepository + 'static>(f: &mut Frame, app: &App<R>, area: Rect) {
    let titles: Vec<Line> = FilterMode::ALL
        .iter()
        .map(|mode| Line::from(format!("{} ({})", mode.label(), app.totals.get(*mode))))
        .collect();
    let selected = FilterMode::ALL
        .iter()
        .position(|mode| *mode == app.query.filter)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(Block::default().title(" Filter ").borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(tabs, area);
}

fn draw_input<R: TaskRepository + 'static>(f: &mut Frame, app: &App<R>, area: Rect) {
    let (title, text, style) = match app.input_mode {
        InputMode::Adding => (" New task ", app.input.as_str(), Style::default().fg(Color::Yellow)),
        InputMode::Searching => (" Search ", app.input.as_str(), Style::default().fg(Color::Yellow)),
        InputMode::Normal => (" Search ", app.query.search.as_str(), Style::default()),
    };
    let input = Paragraph::new(text)
        .style(style)
        .block(Block::default().title(title).borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(input, area);

    if !matches!(app.input_mode, InputMode::Normal) {
        let before_cursor: String = app.input.chars().take(app.cursor_position).collect();
        let x = area.x + 1 + before_cursor.width() as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_task_list<R: TaskRepository + 'static>(f: &mut Frame, app: &mut App<R>, area: Rect) {
    let rows: Vec<Row> = app.view.iter().map(|task| {
        let (status_icon, status_style) = if task.done {
            ("✔", Style::default().fg(Color::Green))
        } else {
            ("☐", Style::default().fg(Color::Yellow))
        };
        let title_style = if task.done {
            Style::default().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };

        Row::new(vec![
            Span::styled(status_icon, status_style),
            Span::raw(task.id.to_string()),
            Span::styled(task.title.clone(), title_style),
        ])
    }).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),  // Status
            Constraint::Length(6),  // ID
            Constraint::Min(10),    // Title
        ]
    )
    .header(Row::new(vec!["St", "ID", "Task"]).style(Style::default().fg(Color::Yellow)))
    .block(Block::default().title(" Tasks ").borders(Borders::ALL).border_type(BorderType::Rounded))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_detail_view<R: TaskRepository + 'static>(f: &mut Frame, app: &App<R>, area: Rect) {
    let block = Block::default().title(" Detail ").borders(Borders::ALL).border_type(BorderType::Rounded);
    let Some(task) = app.selected_task() else {
        f.render_widget(block, area);
        return;
    };

    let mut detail_text = vec![
        Line::from(vec![
            Span::styled("Title: ", Style::default().fg(Color::Blue)),
            Span::styled(task.title.as_str(), Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("ID: ", Style::default().fg(Color::DarkGray)),
            Span::raw(task.id.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Blue)),
            Span::raw(task.status_label()),
        ]),
        Line::from(vec![
            Span::styled("Created: ", Style::default().fg(Color::Blue)),
            Span::raw(format_server_date(task.created_at.as_deref())),
        ]),
        Line::from(vec![
            Span::styled("Updated: ", Style::default().fg(Color::Blue)),
            Span::raw(format_server_date(task.updated_at.as_deref())),
        ]),
        Line::from(""),
    ];

    if !task.description.is_empty() {
        detail_text.push(Line::from(Span::styled("Description:", Style::default().fg(Color::Blue))));
        detail_text.extend(task.description.lines().map(Line::from));
    }

    let detail = Paragraph::new(detail_text).block(block).wrap(Wrap { trim: true });
    f.render_widget(detail, area);
}

fn draw_error<R: TaskRepository + 'static>(f: &mut Frame, app: &App<R>, area: Rect) {
    let message = app.snapshot.error.clone().unwrap_or_else(|| "Failed to load tasks".to_string());
    draw_message(
        f,
        area,
        vec![
            Line::from(Span::styled(message, Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))),
            Line::from(""),
            Line::from("Press R to try again"),
        ],
    );
}

fn draw_empty<R: TaskRepository + 'static>(f: &mut Frame, app: &App<R>, area: Rect) {
    let mut lines = vec![Line::from(Span::styled(
        "No tasks found",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if app.query.search.trim().is_empty() && app.query.filter == FilterMode::All {
        lines.push(Line::from(""));
        lines.push(Line::from("Press \"a\" to add a new task"));
    }
    draw_message(f, area, lines);
}

fn draw_message(f: &mut Frame, area: Rect, lines: Vec<Line>) {
    let message = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Tasks ").borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(message, area);
}
