use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::api::Role;
use crate::app::{App, FocusPane, InputMode, NoticeKind};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let sidebar_width = if app.sidebar_collapsed { 4 } else { 28 };
    let [sidebar_area, chat_area] =
        Layout::horizontal([Constraint::Length(sidebar_width), Constraint::Min(0)])
            .areas(body_area);

    render_sidebar(app, frame, sidebar_area);
    render_chat(app, frame, chat_area);
    render_footer(app, frame, footer_area);

    if app.confirm_delete.is_some() {
        render_confirm_delete(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.user.name),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar && app.input_mode == InputMode::Normal;
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    if app.sidebar_collapsed {
        let block = Block::default().borders(Borders::ALL).border_style(border_style);
        frame.render_widget(Paragraph::new("≡").block(block), area);
        return;
    }

    let title = if app.sessions_loading {
        " Sessions (loading...) "
    } else {
        " Sessions "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let items: Vec<ListItem> = app
        .sessions
        .iter()
        .map(|session| {
            let active = app.active_session_id.as_deref() == Some(session.id.as_str());
            let (marker, style) = if active {
                ("● ", Style::default().fg(Color::Cyan))
            } else {
                ("  ", Style::default())
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker.to_string(), style),
                Span::styled(session.title.clone(), style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, area, &mut app.session_state);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [messages_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let focused = app.focus == FocusPane::Chat && app.input_mode == InputMode::Normal;
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let title = if app.loading_transcript() {
        " Messages (loading...) ".to_string()
    } else {
        match &app.active_session_id {
            Some(id) => {
                let name = app
                    .sessions
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.title.as_str())
                    .unwrap_or("Messages");
                format!(" {name} ")
            }
            None => " New conversation ".to_string(),
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(messages_area);
    app.chat_width = inner.width;
    app.chat_height = inner.height;
    app.clamp_chat_scroll();

    let paragraph = Paragraph::new(transcript_text(app))
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0))
        .block(block);
    frame.render_widget(paragraph, messages_area);

    render_input(app, frame, input_area);
}

fn transcript_text(app: &App) -> Text<'static> {
    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.chat_messages {
        let (label, style) = match msg.role {
            Role::User => ("You", Style::default().fg(Color::Green).bold()),
            Role::Assistant => ("Assistant", Style::default().fg(Color::Magenta).bold()),
        };
        lines.push(Line::from(Span::styled(label, style)));
        for content_line in msg.content.lines() {
            lines.push(Line::from(Span::raw(content_line.to_string())));
        }
        lines.push(Line::default());
    }

    if app.sending() {
        lines.push(Line::from(Span::styled(
            "Assistant",
            Style::default().fg(Color::Magenta).bold(),
        )));
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{dots}"),
            Style::default().fg(Color::Gray),
        )));
    }

    Text::from(lines)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_style = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(" Message ");

    // Keep the cursor in view for drafts wider than the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let start = if inner_width > 0 && app.input_cursor >= inner_width {
        app.input_cursor + 1 - inner_width
    } else {
        0
    };
    let visible: String = app
        .input
        .chars()
        .skip(start)
        .take(inner_width.max(1))
        .collect();

    frame.render_widget(Paragraph::new(visible).block(block), area);

    if editing {
        let cursor_x = area.x + 1 + (app.input_cursor - start) as u16;
        frame.set_cursor_position((cursor_x, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // A pending notice replaces the key hints until it expires
    if let Some(notice) = &app.notice {
        let style = match notice.kind {
            NoticeKind::Info => Style::default().bg(Color::Green).fg(Color::Black),
            NoticeKind::Error => Style::default().bg(Color::Red).fg(Color::White),
        };
        frame.render_widget(
            Paragraph::new(format!(" {} ", notice.text)).style(style),
            area,
        );
        return;
    }

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (
            " INSERT ",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: &[(&str, &str)] = match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => &[(" Enter ", " send "), (" Esc ", " done ")],
        (InputMode::Normal, FocusPane::Sidebar) => &[
            (" j/k ", " nav "),
            (" Enter ", " open "),
            (" n ", " new "),
            (" d ", " delete "),
            (" s ", " collapse "),
            (" Tab ", " chat "),
            (" q ", " quit "),
        ],
        (InputMode::Normal, FocusPane::Chat) => &[
            (" j/k ", " scroll "),
            (" i ", " type "),
            (" Tab ", " sessions "),
            (" q ", " quit "),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_confirm_delete(app: &App, frame: &mut Frame, area: Rect) {
    let Some(id) = &app.confirm_delete else {
        return;
    };
    let title = app
        .sessions
        .iter()
        .find(|s| &s.id == id)
        .map(|s| s.title.as_str())
        .unwrap_or("this session");

    let popup = centered_rect(46, 7, area);
    frame.render_widget(Clear, popup);

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Delete session ");
    let text = Text::from(vec![
        Line::default(),
        Line::from(format!("Delete \"{title}\"?")),
        Line::from("This cannot be undone."),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", key_style),
            Span::raw(" confirm   "),
            Span::styled(" n ", key_style),
            Span::raw(" cancel"),
        ]),
    ]);

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(paragraph, popup);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
