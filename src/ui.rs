use crate::app::{App, DialogChoice, Severity};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, Clear, List, ListItem, Padding, Paragraph, Row, Table,
        TableState, Wrap,
    },
};
use std::{
    io,
    time::{Duration, Instant},
};
use time::{macros::format_description, OffsetDateTime};

const SIDE_PANEL_WIDTH: u16 = 46;

#[derive(Clone)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
}

impl Theme {
    fn new() -> Self {
        Self {
            accent: Color::Rgb(235, 160, 90),
            accent_soft: Color::Rgb(150, 100, 60),
            border: Color::Rgb(80, 72, 62),
            text: Color::Rgb(228, 222, 212),
            muted: Color::Rgb(140, 132, 120),
            success: Color::Rgb(130, 210, 130),
            warning: Color::Rgb(230, 200, 110),
            error: Color::Rgb(230, 100, 90),
            header_bg: Color::Rgb(30, 26, 22),
        }
    }

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
    }

    fn panel(&self, title: &'static str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 1,
            right: 1,
            top: 1,
            bottom: 0,
        })
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        app.clamp_selection();
        terminal.draw(|frame| draw(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, key);
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if app.dialog.is_some() {
        handle_dialog_mode(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.should_quit = true,
        KeyCode::Char('f') | KeyCode::Char('F') => app.refresh_mod_list(),
        KeyCode::Char('r') | KeyCode::Char('R') => app.perform_reindex_mods(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::PageUp => app.scroll_messages_up(3),
        KeyCode::PageDown => app.scroll_messages_down(3),
        _ => {}
    }
}

fn handle_dialog_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('H') => {
            app.dialog_choice_left();
        }
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('L') | KeyCode::Tab => {
            app.dialog_choice_right();
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.dialog_set_choice(DialogChoice::Yes);
        }
        KeyCode::Char('n') | KeyCode::Char('N') => {
            app.dialog_set_choice(DialogChoice::No);
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.dialog_confirm();
        }
        KeyCode::Esc => {
            app.dialog_set_choice(DialogChoice::No);
            app.dialog_confirm();
        }
        _ => {}
    }
}

fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.size();
    let theme = Theme::new();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(frame, app, &theme, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(chunks[1]);

    draw_mods(frame, app, &theme, body_chunks[0]);
    draw_feed(frame, app, &theme, body_chunks[1]);
    draw_footer(frame, app, &theme, chunks[2]);

    if app.dialog.is_some() {
        draw_dialog(frame, app, &theme);
    }
    draw_toast(frame, app, &theme, chunks[1]);
}

fn draw_header(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let installed = app.mods.iter().filter(|entry| entry.installed).count();
    let header = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                "Modhearth",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("Mods: ", Style::default().fg(theme.muted)),
            Span::styled(app.mods.len().to_string(), Style::default().fg(theme.text)),
            Span::raw("  "),
            Span::styled("Installed: ", Style::default().fg(theme.muted)),
            Span::styled(
                installed.to_string(),
                Style::default()
                    .fg(theme.success)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(theme.muted),
        )),
    ])
    .style(Style::default().bg(theme.header_bg))
    .alignment(Alignment::Center);
    frame.render_widget(header, area);
}

fn draw_mods(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    if app.mods.is_empty() {
        let empty = Paragraph::new("No mod list loaded. Press f to fetch the catalog.")
            .style(Style::default().fg(theme.muted))
            .block(theme.panel("Catalog"));
        frame.render_widget(empty, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(6)])
        .split(area);

    let header = Row::new(
        ["Name", "Version", "Categories", "Inst", "Updated"]
            .into_iter()
            .map(|label| Cell::from(label)),
    )
    .style(
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = app
        .mods
        .iter()
        .map(|entry| {
            let installed = if entry.installed {
                Cell::from("●").style(Style::default().fg(theme.success))
            } else {
                Cell::from(" ")
            };
            Row::new(vec![
                Cell::from(entry.name.clone()).style(Style::default().fg(theme.text)),
                Cell::from(entry.version.clone().unwrap_or_default())
                    .style(Style::default().fg(theme.muted)),
                Cell::from(entry.categories_label()).style(Style::default().fg(theme.muted)),
                installed,
                Cell::from(format_date(entry.last_updated))
                    .style(Style::default().fg(theme.muted)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(24),
            Constraint::Length(10),
            Constraint::Min(18),
            Constraint::Length(4),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(theme.panel("Catalog"))
    .highlight_style(
        Style::default()
            .bg(theme.accent_soft)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    state.select(Some(app.selected));
    frame.render_stateful_widget(table, chunks[0], &mut state);

    draw_mod_details(frame, app, theme, chunks[1]);
}

fn draw_mod_details(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let block = theme.panel("Details");
    let Some(entry) = app.mods.get(app.selected) else {
        frame.render_widget(block, area);
        return;
    };

    let mut title_line = vec![Span::styled(
        entry.name.clone(),
        Style::default()
            .fg(theme.text)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(version) = &entry.version {
        title_line.push(Span::styled(
            format!("  v{version}"),
            Style::default().fg(theme.muted),
        ));
    }

    let lines = vec![
        Line::from(title_line),
        Line::from(vec![
            Span::styled("by ", Style::default().fg(theme.muted)),
            Span::styled(entry.publisher.clone(), Style::default().fg(theme.text)),
            Span::raw("  "),
            Span::styled(entry.repo.clone(), Style::default().fg(theme.accent_soft)),
        ]),
        Line::from(Span::styled(
            entry.description.clone(),
            Style::default().fg(theme.muted),
        )),
    ];

    let details = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(details, area);
}

fn draw_feed(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let height = area.height.saturating_sub(3) as usize;
    let visible: Vec<_> = app
        .messages
        .iter()
        .rev()
        .skip(app.message_scroll)
        .take(height.max(1))
        .collect();

    let items: Vec<ListItem> = visible
        .into_iter()
        .rev()
        .map(|message| {
            let (marker, color) = match message.severity {
                Severity::Info => ("·", theme.muted),
                Severity::Success => ("✔", theme.success),
                Severity::Error => ("✘", theme.error),
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", message.timestamp()),
                    Style::default().fg(theme.muted),
                ),
                Span::styled(format!("{marker} "), Style::default().fg(color)),
                Span::styled(message.text.clone(), Style::default().fg(theme.text)),
            ]))
        })
        .collect();

    let feed = List::new(items).block(theme.panel("Messages"));
    frame.render_widget(feed, area);
}

fn draw_footer(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let hints = if app.dialog.is_some() {
        " ←/→ choose   y yes   n no   Enter confirm   Esc cancel"
    } else {
        " q quit   f fetch list   r re-index   ↑/↓ select   PgUp/PgDn messages"
    };
    let footer = Paragraph::new(Line::from(Span::styled(
        hints,
        Style::default().fg(theme.muted),
    )));
    frame.render_widget(footer, area);
}

fn draw_dialog(frame: &mut Frame<'_>, app: &App, theme: &Theme) {
    let Some(dialog) = &app.dialog else {
        return;
    };

    let area = frame.size();
    let message_lines: Vec<Line> = dialog
        .message
        .lines()
        .map(|line| Line::from(line.to_string()))
        .collect();
    let content_height = message_lines.len().max(1) as u16;
    let mut height = content_height + 6;
    if height < 7 {
        height = 7;
    }
    if height > area.height.saturating_sub(2) {
        height = area.height.saturating_sub(2);
    }
    let width = area.width.saturating_mul(2) / 3;
    let width = width.clamp(34, area.width.saturating_sub(2).max(34));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let dialog_area = Rect::new(x, y, width, height);

    let yes_selected = matches!(dialog.choice, DialogChoice::Yes);
    let yes_style = if yes_selected {
        Style::default()
            .fg(Color::Black)
            .bg(theme.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };
    let no_style = if !yes_selected {
        Style::default()
            .fg(Color::Black)
            .bg(theme.warning)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };

    let buttons = Line::from(vec![
        Span::raw(" "),
        Span::styled(format!(" {} ", dialog.yes_label), yes_style),
        Span::raw("   "),
        Span::styled(format!(" {} ", dialog.no_label), no_style),
    ]);

    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        dialog.title.clone(),
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.extend(message_lines);
    lines.push(Line::from(""));
    lines.push(buttons);

    frame.render_widget(Clear, dialog_area);
    let dialog_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent_soft))
        .style(Style::default().bg(theme.header_bg));
    let dialog_widget = Paragraph::new(lines)
        .block(dialog_block)
        .style(Style::default().fg(theme.text))
        .alignment(Alignment::Center);
    frame.render_widget(dialog_widget, dialog_area);
}

fn draw_toast(frame: &mut Frame<'_>, app: &App, theme: &Theme, body_area: Rect) {
    if app.dialog.is_some() {
        return;
    }
    let Some(toast) = app.toast.as_ref() else {
        return;
    };
    if toast.expires_at <= Instant::now() {
        return;
    }

    let mut message = toast.message.clone();
    let max_width = body_area.width.saturating_sub(4).max(24);
    let max_text = max_width.saturating_sub(4) as usize;
    if message.len() > max_text {
        message.truncate(max_text.saturating_sub(3));
        message.push_str("...");
    }
    let width = (message.len() as u16 + 4).clamp(24, max_width);
    let height = 3u16;
    let x = body_area.x + (body_area.width.saturating_sub(width)) / 2;
    let y = body_area.y + 1;
    let toast_area = Rect::new(x, y, width, height);

    let border = match toast.level {
        Severity::Info => theme.accent,
        Severity::Success => theme.success,
        Severity::Error => theme.error,
    };

    frame.render_widget(Clear, toast_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(theme.header_bg));
    let content = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(theme.text))
        .alignment(Alignment::Center);
    frame.render_widget(content, toast_area);
}

fn format_date(timestamp: u64) -> String {
    if timestamp == 0 {
        return String::new();
    }
    let Ok(timestamp) = i64::try_from(timestamp) else {
        return String::new();
    };
    let Ok(date) = OffsetDateTime::from_unix_timestamp(timestamp) else {
        return String::new();
    };
    let format = format_description!("[year]-[month]-[day]");
    date.format(format).unwrap_or_default()
}
