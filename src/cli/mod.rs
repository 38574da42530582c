pub mod dashboard;
pub mod input;
pub mod login;
pub mod setup;
pub mod ui;
