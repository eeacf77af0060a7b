use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, FORM_FIELDS, LoginField, Screen};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.sign_in`(...) with the login form contents
    SubmitLogin,
    /// Run `service.sign_out`(...) and drop back to the login screen
    SignOut,
    /// Refetch bins and stats for the current console
    Refresh,
    /// Run `service.empty_bin`(...) for the selected row
    EmptySelectedBin,
    /// Run `service.add_bin`(...) with the form contents
    SubmitNewBin,
    /// Fetch the roster and open the team screen
    OpenTeam,
    /// Run `service.update_team_image`(...) for the selected member
    SubmitTeamImage,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Backspace, Char, Down, Enter, Esc, Tab, Up};

    // Ctrl-C quits from anywhere, including text inputs.
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Login => match key.code {
            Tab | BackTab | Up | Down => {
                // Two fields, so forward and backward are the same toggle.
                app.login_focus = match app.login_focus {
                    LoginField::Email => LoginField::Password,
                    LoginField::Password => LoginField::Email,
                };
            }
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    match app.login_focus {
                        LoginField::Email => app.login_email.push(character),
                        LoginField::Password => app.login_password.push(character),
                    }
                }
            }
            Backspace => {
                match app.login_focus {
                    LoginField::Email => app.login_email.pop(),
                    LoginField::Password => app.login_password.pop(),
                };
            }
            Enter => {
                action = Action::SubmitLogin;
            }
            Esc => {
                action = Action::Quit;
            }
            _ => {}
        },

        Screen::Admin => match key.code {
            Up | Char('k') => {
                if app.bin_table_index > 0 {
                    app.bin_table_index -= 1;
                }
            }
            Down | Char('j') => {
                if app.bin_table_index + 1 < app.bins.len() {
                    app.bin_table_index += 1;
                }
            }
            Char('e') => {
                action = Action::EmptySelectedBin;
            }
            Char('a') => {
                app.open_add_bin();
            }
            Char('t') => {
                action = Action::OpenTeam;
            }
            Char('r') => {
                action = Action::Refresh;
            }
            Esc => {
                action = Action::SignOut;
            }
            Char('q') => {
                action = Action::Quit;
            }
            _ => {}
        },

        Screen::Operator => match key.code {
            Up | Char('k') => {
                if app.bin_table_index > 0 {
                    app.bin_table_index -= 1;
                }
            }
            Down | Char('j') => {
                if app.bin_table_index + 1 < app.bins.len() {
                    app.bin_table_index += 1;
                }
            }
            Char('e') => {
                action = Action::EmptySelectedBin;
            }
            Char('r') => {
                action = Action::Refresh;
            }
            Esc => {
                action = Action::SignOut;
            }
            Char('q') => {
                action = Action::Quit;
            }
            _ => {}
        },

        Screen::AddBin => match key.code {
            Tab | Down => {
                app.form_focus = (app.form_focus + 1) % FORM_FIELDS.len();
            }
            BackTab | Up => {
                app.form_focus = (app.form_focus + FORM_FIELDS.len() - 1) % FORM_FIELDS.len();
            }
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.form_values[app.form_focus].push(character);
                }
            }
            Backspace => {
                app.form_values[app.form_focus].pop();
            }
            Enter => {
                action = Action::SubmitNewBin;
            }
            Esc => {
                app.error_message = None;
                app.screen = app.home_screen();
            }
            _ => {}
        },

        Screen::Team => {
            if app.team_editing {
                match key.code {
                    Char(character) => {
                        if !key.modifiers.contains(KeyModifiers::CONTROL)
                            && !key.modifiers.contains(KeyModifiers::ALT)
                        {
                            app.team_image_input.push(character);
                        }
                    }
                    Backspace => {
                        app.team_image_input.pop();
                    }
                    Enter => {
                        action = Action::SubmitTeamImage;
                    }
                    Esc => {
                        app.team_editing = false;
                        app.team_image_input.clear();
                    }
                    _ => {}
                }
            } else {
                match key.code {
                    Up | Char('k') => {
                        if app.team_index > 0 {
                            app.team_index -= 1;
                        }
                    }
                    Down | Char('j') => {
                        if app.team_index + 1 < app.team.len() {
                            app.team_index += 1;
                        }
                    }
                    Char('i') => {
                        if let Some(member) = app.selected_member() {
                            app.team_image_input = member.image_url.clone();
                            app.team_editing = true;
                        }
                    }
                    Esc => {
                        app.screen = app.home_screen();
                    }
                    Char('q') => {
                        action = Action::Quit;
                    }
                    _ => {}
                }
            }
        }
    }

    action
}
