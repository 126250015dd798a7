// Template context structures for Askama templates, organized by page group.

use actix_session::Session;
use chrono::{DateTime, Utc};

use crate::auth::csrf;
use crate::auth::session::{CurrentUser, current_user, take_flash};
use crate::errors::AppError;

mod common;
mod presentation;
mod public;

pub use self::common::{IndexTemplate, LoginTemplate, RegisterTemplate};
pub use self::presentation::{
    DashboardTemplate, FeedbackRow, PresentationDetailTemplate, PresentationFormTemplate,
    PresentationRow,
};
pub use self::public::PublicViewTemplate;

pub const APP_NAME: &str = "Talkback";

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.username`, `ctx.csrf_token`, etc.
pub struct PageContext {
    pub username: String,
    pub avatar_initial: String,
    pub is_admin: bool,
    pub flash: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
}

impl PageContext {
    pub fn build(session: &Session) -> Result<Self, AppError> {
        let user = current_user(session)?;
        Ok(Self::for_user(session, &user))
    }

    pub fn for_user(session: &Session, user: &CurrentUser) -> Self {
        let avatar_initial = user.username.chars().next().unwrap_or('?').to_uppercase().to_string();
        Self {
            username: user.username.clone(),
            avatar_initial,
            is_admin: user.is_admin,
            flash: take_flash(session),
            app_name: APP_NAME.to_string(),
            csrf_token: csrf::get_or_create_token(session),
        }
    }
}

/// Timestamp as shown in pages, e.g. `2024-05-01 14:03:07 UTC`.
pub fn display_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
