//! Terminal console for the municipal smart-waste monitoring pilot.

mod app;
mod config;
mod input;
mod ui;

use std::{
    fs::OpenOptions,
    io,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use binwatch_core::{
    model::{DashboardStats, UserRole},
    ports::{Credentials, StoreError},
    service::BinService,
};

use crate::app::{App, Screen};
use crate::config::{AppConfig, BackendKind};
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config)?;

    // HTTP + service setup
    let client = Client::builder().user_agent("binwatch/0.1").build()?;

    let bundle = match config.backend {
        BackendKind::Memory => binwatch_backend_memory::backend(),
        BackendKind::Remote => {
            let remote = config.remote.as_ref().context(
                "backend = \"remote\" requires a [remote] section with url and api_key",
            )?;
            let options =
                binwatch_backend_remote::RemoteOptions::new(&remote.url, &remote.api_key)
                    .with_poll_interval(StdDuration::from_secs(remote.poll_interval_secs));
            binwatch_backend_remote::backend(client.clone(), &options)
        }
    };
    let service = Arc::new(BinService::new(Arc::new(bundle)));
    tracing::info!(backend = service.backend_name(), "console starting");

    // App state
    let app = App::new(service);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    // The console owns stdout; diagnostics go to the configured file.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;

    let filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // The change watcher marked the view stale: refetch before input.
        if app.take_dirty() {
            refresh(&mut app).await;
        }

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::Refresh => {
                    app.info_message = None;
                    refresh(&mut app).await;
                }
                Action::SubmitLogin => {
                    let credentials =
                        Credentials::new(app.login_email.trim(), app.login_password.clone());

                    app.is_loading = true;
                    app.error_message = None;
                    app.info_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.service.sign_in(&credentials).await;
                    app.is_loading = false;
                    match res {
                        Ok(session) => {
                            if session.user.role == UserRole::Guest {
                                app.error_message =
                                    Some("This account has no console access".into());
                            } else {
                                app.enter_console(session);
                                refresh(&mut app).await;
                            }
                        }
                        Err(StoreError::Unauthorized) => {
                            app.error_message = Some("Invalid email or password".into());
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "sign-in failed");
                            app.error_message = Some(format!("Sign-in failed: {err}"));
                        }
                    }
                }
                Action::SignOut => {
                    if let Some(session) = app.session.clone()
                        && let Err(err) = app.service.sign_out(&session.access_token).await
                    {
                        tracing::warn!(error = %err, "sign-out failed");
                    }
                    app.reset_to_login();
                }
                Action::EmptySelectedBin => {
                    let Some(bin) = app.selected_bin() else {
                        continue;
                    };
                    let id = bin.id.clone();

                    app.is_loading = true;
                    app.error_message = None;
                    app.info_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.service.empty_bin(&id).await;
                    app.is_loading = false;
                    match res {
                        Ok(emptied) => {
                            app.info_message = Some(format!("{} emptied", emptied.id));
                            refresh(&mut app).await;
                        }
                        Err(err) => {
                            tracing::warn!(bin = %id, error = %err, "empty failed");
                            app.error_message = Some(format!("Could not empty {id}: {err}"));
                        }
                    }
                }
                Action::SubmitNewBin => match app.form_to_new_bin() {
                    Err(message) => {
                        app.error_message = Some(message);
                    }
                    Ok(new_bin) => {
                        app.is_loading = true;
                        app.error_message = None;
                        app.info_message = None;
                        terminal.draw(|frame| ui::draw(frame, &app))?;

                        let res = app.service.add_bin(new_bin).await;
                        app.is_loading = false;
                        match res {
                            Ok(bin) => {
                                app.info_message = Some(format!("{} registered", bin.id));
                                app.screen = app.home_screen();
                                refresh(&mut app).await;
                            }
                            Err(StoreError::Validation { fields }) => {
                                app.error_message =
                                    Some(format!("Check field(s): {}", fields.join(", ")));
                            }
                            Err(StoreError::DuplicateId(id)) => {
                                app.error_message = Some(format!("Bin id {id} already exists"));
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "bin registration failed");
                                app.error_message =
                                    Some(format!("Could not register bin: {err}"));
                            }
                        }
                    }
                },
                Action::OpenTeam => {
                    app.is_loading = true;
                    app.error_message = None;
                    app.info_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.service.team().await;
                    app.is_loading = false;
                    match res {
                        Ok(team) => {
                            app.team = team;
                            app.team_index = 0;
                            app.team_editing = false;
                            app.team_image_input.clear();
                            app.screen = Screen::Team;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "team fetch failed");
                            app.error_message = Some(format!("Could not load team: {err}"));
                        }
                    }
                }
                Action::SubmitTeamImage => {
                    let Some(member) = app.selected_member() else {
                        continue;
                    };
                    let id = member.id;
                    let image_url = app.team_image_input.trim().to_owned();
                    if image_url.is_empty() {
                        app.error_message = Some("Image URL must not be empty".into());
                        continue;
                    }

                    app.is_loading = true;
                    app.error_message = None;
                    app.info_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.service.update_team_image(id, &image_url).await;
                    app.is_loading = false;
                    match res {
                        Ok(updated) => {
                            if let Some(slot) =
                                app.team.iter_mut().find(|member| member.id == updated.id)
                            {
                                *slot = updated;
                            }
                            app.team_editing = false;
                            app.team_image_input.clear();
                            app.info_message = Some("Portrait updated".into());
                        }
                        Err(err) => {
                            tracing::warn!(member = id, error = %err, "portrait update failed");
                            app.error_message = Some(format!("Could not update portrait: {err}"));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Refetch the data backing the current console.
///
/// Backend trouble renders as an empty view plus a logged diagnostic; the
/// console never exits on a failed read.
async fn refresh(app: &mut App) {
    let result = match app.role() {
        Some(UserRole::Admin) => match app.service.stats().await {
            Ok(stats) => {
                app.stats = stats;
                app.service.list_bins().await
            }
            Err(err) => Err(err),
        },
        Some(UserRole::Operator) => {
            let Some(user) = app.user_id() else {
                return;
            };
            app.service.operator_bins(&user).await
        }
        _ => return,
    };

    match result {
        Ok(bins) => {
            app.error_message = None;
            if app.bin_table_index >= bins.len() {
                app.bin_table_index = bins.len().saturating_sub(1);
            }
            app.bins = bins;
        }
        Err(err) => {
            tracing::warn!(error = %err, "refresh failed, showing empty view");
            app.bins.clear();
            app.stats = DashboardStats::default();
            app.error_message = Some(if err.is_unavailable() {
                format!("Backend unavailable: {err}")
            } else {
                format!("Refresh failed: {err}")
            });
        }
    }
}
