use binwatch_core::model::Status;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, FORM_FIELDS, LoginField, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    // Title / header
    let signed_in = app
        .session
        .as_ref()
        .map_or_else(String::new, |session| {
            format!(" · {} ({:?})", session.user.name, session.user.role)
        });
    let header = Paragraph::new(format!(
        "binwatch – smart-waste monitoring · {}{signed_in}",
        app.service.backend_name()
    ))
    .block(Block::default().borders(Borders::ALL).title("Binwatch"));
    frame.render_widget(header, *header_area);

    // Main screen
    match app.screen {
        Screen::Login => draw_login(frame, app, *content_area),
        Screen::Admin => draw_admin(frame, app, *content_area),
        Screen::Operator => draw_operator(frame, app, *content_area),
        Screen::AddBin => draw_add_bin(frame, app, *content_area),
        Screen::Team => draw_team(frame, app, *content_area),
    }

    // Status bar
    let nav_hint = match app.screen {
        Screen::Login => "Tab switch field · Enter sign in · Esc/Ctrl-C quit",
        Screen::Admin => {
            "↑/↓ select · e empty · a add bin · t team · r refresh · Esc sign out · q quit"
        }
        Screen::Operator => "↑/↓ select · e empty · r refresh · Esc sign out · q quit",
        Screen::AddBin => "Tab/↑/↓ field · Enter submit · Esc back",
        Screen::Team => {
            if app.team_editing {
                "Type image URL · Enter save · Esc cancel"
            } else {
                "↑/↓ select · i edit image · Esc back · q quit"
            }
        }
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else if let Some(msg) = &app.info_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else if app.info_message.is_some() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Normal => Color::Green,
        Status::Warning => Color::Yellow,
        Status::Full => Color::Red,
    }
}

fn input_block(title: &str, focused: bool) -> Block<'_> {
    let block = Block::default().borders(Borders::ALL).title(title.to_owned());
    if focused {
        block.border_style(Style::default().fg(Color::Yellow))
    } else {
        block
    }
}

fn draw_login(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // email
            Constraint::Length(3), // password
            Constraint::Min(0),    // help
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [email_area, password_area, help_area] = chunks else {
        return;
    };

    let email = Paragraph::new(app.login_email.as_str()).block(input_block(
        "Email",
        app.login_focus == LoginField::Email,
    ));
    frame.render_widget(email, *email_area);

    let masked = "•".repeat(app.login_password.chars().count());
    let password = Paragraph::new(masked).block(input_block(
        "Password",
        app.login_focus == LoginField::Password,
    ));
    frame.render_widget(password, *password_area);

    let help = Paragraph::new("Sign in with your municipal account to open the console.")
        .block(Block::default().borders(Borders::ALL).title("Welcome"))
        .wrap(Wrap { trim: true });
    frame.render_widget(help, *help_area);
}

fn bin_table(app: &App, title: String) -> Table<'static> {
    let rows = app
        .bins
        .iter()
        .enumerate()
        .map(|(index, bin)| {
            let selected = index == app.bin_table_index;
            let prefix = if selected { "> " } else { "  " };
            let levels = bin
                .compartments
                .iter()
                .map(|compartment| compartment.fill_level.to_string())
                .collect::<Vec<_>>()
                .join("/");

            let mut style = Style::default();
            if selected {
                style = style.add_modifier(Modifier::BOLD);
            }

            Row::new(vec![
                Cell::from(format!("{prefix}{}", bin.id)),
                Cell::from(bin.location_name.clone()),
                Cell::from(format!("{}%", bin.max_fill())),
                Cell::from(bin.status.to_string())
                    .style(Style::default().fg(status_color(bin.status))),
                Cell::from(levels),
                Cell::from(if bin.enabled { "yes" } else { "no" }),
                Cell::from(
                    bin.assigned_operator_id
                        .as_ref()
                        .map_or_else(String::new, ToString::to_string),
                ),
                Cell::from(
                    bin.last_emptied
                        .with_timezone(&chrono::Local)
                        .format("%d.%m.%Y %H:%M")
                        .to_string(),
                ),
            ])
            .style(style)
        })
        .collect::<Vec<_>>();

    let column_widths = [
        Constraint::Length(11),
        Constraint::Min(16),
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(4),
        Constraint::Length(8),
        Constraint::Length(17),
    ];

    Table::new(rows, column_widths)
        .header(
            Row::new(vec![
                "Id", "Location", "Max", "Status", "Levels", "On", "Operator", "Last emptied",
            ])
            .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1)
}

fn draw_admin(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // stat tiles
            Constraint::Min(0),    // bin table
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [tiles_area, table_area] = chunks else {
        return;
    };

    let tile_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(*tiles_area);

    let tiles = [
        ("Bins", app.stats.total_bins.to_string(), Color::Cyan),
        ("Full", app.stats.full_bins.to_string(), Color::Red),
        (
            "Avg fill",
            format!("{}%", app.stats.avg_fill_percentage),
            Color::Yellow,
        ),
        ("Alerts", app.stats.active_alerts.to_string(), Color::Magenta),
    ];
    for (chunk, (label, value, color)) in tile_chunks.iter().zip(tiles) {
        let tile = Paragraph::new(value)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL).title(label));
        frame.render_widget(tile, *chunk);
    }

    let title = String::from("All bins (↑/↓, e to empty)");
    if app.bins.is_empty() {
        let empty = Paragraph::new("No bins to show.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(empty, *table_area);
        return;
    }
    frame.render_widget(bin_table(app, title), *table_area);
}

fn draw_operator(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let title = String::from("Assigned bins (↑/↓, e to empty)");
    if app.bins.is_empty() {
        let empty = Paragraph::new("No assigned bins right now.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(empty, area);
        return;
    }
    frame.render_widget(bin_table(app, title), area);
}

fn draw_add_bin(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = FORM_FIELDS
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let prefix = if index == app.form_focus { "> " } else { "  " };
            let value = app.form_values[index].as_str();
            ListItem::new(format!("{prefix}{label}: {value}"))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Register bin (Tab to move, Enter to submit)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    state.select(Some(app.form_focus));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_team(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // image input
            Constraint::Min(0),    // roster
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [input_area, roster_area] = chunks else {
        return;
    };

    let input = Paragraph::new(app.team_image_input.as_str())
        .block(input_block("Image URL (i to edit)", app.team_editing))
        .wrap(Wrap { trim: true });
    frame.render_widget(input, *input_area);

    let items = app
        .team
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let prefix = if index == app.team_index { "> " } else { "  " };
            let mentor = if member.is_professor { " · mentor" } else { "" };
            ListItem::new(format!("{prefix}{} – {}{mentor}", member.name, member.role))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Team"))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.team.is_empty() {
        state.select(Some(app.team_index));
    }
    frame.render_stateful_widget(list, *roster_area, &mut state);
}
