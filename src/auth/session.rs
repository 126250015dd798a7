use actix_session::Session;

use crate::errors::AppError;
use crate::models::presentation::Presentation;
use crate::models::user::User;

/// Identity of the logged-in presenter, as stored in the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl CurrentUser {
    /// Owners and admins may manage a presentation.
    pub fn can_manage(&self, presentation: &Presentation) -> bool {
        self.is_admin || presentation.creator_id == self.id
    }
}

pub fn sign_in(session: &Session, user: &User) {
    session.renew();
    let _ = session.insert("user_id", user.id);
    let _ = session.insert("username", &user.username);
    let _ = session.insert("is_admin", user.is_admin);
}

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

pub fn current_user(session: &Session) -> Result<CurrentUser, AppError> {
    let id = get_user_id(session)
        .ok_or_else(|| AppError::Session("User not logged in".to_string()))?;
    let username = session
        .get::<String>("username")
        .map_err(|e| AppError::Session(format!("Session error: {e}")))?
        .ok_or_else(|| AppError::Session("No username in session".to_string()))?;
    let is_admin = session.get::<bool>("is_admin").unwrap_or(None).unwrap_or(false);
    Ok(CurrentUser { id, username, is_admin })
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

/// Check ownership; returns `PermissionDenied` (silent redirect to the dashboard) otherwise.
pub fn require_manage(user: &CurrentUser, presentation: &Presentation) -> Result<(), AppError> {
    if user.can_manage(presentation) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "user {} on presentation {}",
            user.id, presentation.id
        )))
    }
}
