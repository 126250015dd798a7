use askama::Template;

/// Reader-facing page behind the share link.
#[derive(Template)]
#[template(path = "public_view.html")]
pub struct PublicViewTemplate {
    pub app_name: String,
    pub access_code: String,
    pub title: String,
    pub description: String,
    pub briefing: String,
    pub scheduled: bool,
    pub next_update: String,
    pub refresh_secs: u64,
}
