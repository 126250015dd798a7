use sqlx::PgPool;

use crate::auth::session::{CurrentUser, require_manage};
use crate::auth::validate;
use crate::errors::AppError;
use crate::models::presentation::{self, Presentation, PresentationForm};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_CONTEXT_LEN: usize = 2000;
pub const MAX_CONTENT_LEN: usize = 10000;

/// Validate presentation form data (used in both create and update flows)
pub fn validate_presentation_form(form: &PresentationForm) -> Vec<String> {
    let mut errors = vec![];
    errors.extend(validate::validate_required(&form.title, "Title", MAX_TITLE_LEN));
    errors.extend(validate::validate_optional(&form.description, "Description", MAX_DESCRIPTION_LEN));
    errors.extend(validate::validate_optional(&form.context, "Context", MAX_CONTEXT_LEN));
    errors.extend(validate::validate_required(&form.content, "Content", MAX_CONTENT_LEN));
    errors
}

/// Load a presentation the current user may manage.
pub async fn load_managed(pool: &PgPool, user: &CurrentUser, id: i64) -> Result<Presentation, AppError> {
    let found = presentation::find_by_id(pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    require_manage(user, &found)?;
    Ok(found)
}
