pub mod feedback;
pub mod presentation;
pub mod user;
