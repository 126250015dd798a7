pub mod api_handlers;
pub mod auth_handlers;
pub mod dashboard;
pub mod presentation_handlers;
pub mod public_handlers;
