pub mod helpers;
pub mod crud;

pub use self::crud::{create, delete, detail, edit_form, new_form, update};
