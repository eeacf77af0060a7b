use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use binwatch_core::{
    model::{Bin, DashboardStats, NewBin, Session, TeamMember, UserId, UserRole},
    service::BinService,
    subscription::ChangeListener,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Login,
    Admin,
    Operator,
    AddBin,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginField {
    Email,
    Password,
}

/// Labels for the add-bin form, in focus order.
pub(crate) const FORM_FIELDS: [&str; 7] = [
    "Bin id",
    "Location name",
    "Address",
    "Latitude",
    "Longitude",
    "Local body email",
    "Operator id (optional)",
];

pub(crate) struct App {
    pub service: Arc<BinService>,

    pub screen: Screen,
    pub session: Option<Session>,

    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginField,

    pub bins: Vec<Bin>,
    pub stats: DashboardStats,
    pub bin_table_index: usize,

    pub form_values: [String; 7],
    pub form_focus: usize,

    pub team: Vec<TeamMember>,
    pub team_index: usize,
    pub team_image_input: String,
    pub team_editing: bool,

    listener: Option<ChangeListener>,
    dirty: Arc<AtomicBool>,

    pub is_loading: bool,
    pub error_message: Option<String>,
    pub info_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<BinService>) -> Self {
        Self {
            service,
            screen: Screen::Login,
            session: None,
            login_email: String::new(),
            login_password: String::new(),
            login_focus: LoginField::Email,
            bins: Vec::new(),
            stats: DashboardStats::default(),
            bin_table_index: 0,
            form_values: Default::default(),
            form_focus: 0,
            team: Vec::new(),
            team_index: 0,
            team_image_input: String::new(),
            team_editing: false,
            listener: None,
            dirty: Arc::new(AtomicBool::new(false)),
            is_loading: false,
            error_message: None,
            info_message: None,
        }
    }

    /// Role of the signed-in user, if any.
    pub(crate) fn role(&self) -> Option<UserRole> {
        self.session.as_ref().map(|session| session.user.role)
    }

    /// Id of the signed-in user, if any.
    pub(crate) fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().map(|session| session.user.id.clone())
    }

    pub(crate) fn selected_bin(&self) -> Option<&Bin> {
        self.bins.get(self.bin_table_index)
    }

    pub(crate) fn selected_member(&self) -> Option<&TeamMember> {
        self.team.get(self.team_index)
    }

    /// Route into the console matching the session's role and start
    /// watching for bin changes. The watcher lives until sign-out.
    pub(crate) fn enter_console(&mut self, session: Session) {
        self.screen = match session.user.role {
            UserRole::Admin => Screen::Admin,
            UserRole::Operator => Screen::Operator,
            UserRole::Guest => Screen::Login,
        };
        self.session = Some(session);
        self.login_password.clear();
        self.bin_table_index = 0;

        let dirty = Arc::clone(&self.dirty);
        self.listener = Some(self.service.watch_bins(move |_event| {
            dirty.store(true, Ordering::Relaxed);
        }));
    }

    /// Drop the session and the change watcher and return to the login
    /// screen. Dropping the listener releases the subscription.
    pub(crate) fn reset_to_login(&mut self) {
        self.listener = None;
        self.session = None;
        self.screen = Screen::Login;
        self.bins.clear();
        self.stats = DashboardStats::default();
        self.team.clear();
        self.error_message = None;
        self.info_message = None;
    }

    /// Take the dirty flag set by the change watcher.
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::Relaxed)
    }

    /// Console screen to fall back to from a sub-screen.
    pub(crate) fn home_screen(&self) -> Screen {
        match self.role() {
            Some(UserRole::Operator) => Screen::Operator,
            Some(UserRole::Admin) => Screen::Admin,
            _ => Screen::Login,
        }
    }

    pub(crate) fn open_add_bin(&mut self) {
        self.form_values = Default::default();
        self.form_focus = 0;
        self.error_message = None;
        self.screen = Screen::AddBin;
    }

    /// Build the registration input from the form.
    ///
    /// Coordinates must be numeric when present; everything else is left to
    /// the service-side validation so its field list reaches the form.
    pub(crate) fn form_to_new_bin(&self) -> Result<NewBin, String> {
        let coord = |value: &str, label: &str| -> Result<f64, String> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| format!("{label} must be a number"))
        };

        let operator = self.form_values[6].trim();
        Ok(NewBin {
            id: self.form_values[0].clone(),
            location_name: self.form_values[1].clone(),
            address: self.form_values[2].clone(),
            latitude: coord(&self.form_values[3], "latitude")?,
            longitude: coord(&self.form_values[4], "longitude")?,
            local_body_email: self.form_values[5].clone(),
            assigned_operator_id: if operator.is_empty() {
                None
            } else {
                Some(UserId(operator.to_owned()))
            },
        })
    }
}
