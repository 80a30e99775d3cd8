pub mod search;
pub mod setup;
pub mod summary;
pub mod ui;
