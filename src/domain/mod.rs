pub mod date_range;
pub mod login_form;
pub mod models;
