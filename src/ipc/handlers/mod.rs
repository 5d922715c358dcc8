pub mod backup_exchange;
pub mod chat;
pub mod core;
pub mod generate;
pub mod notes;
pub mod plans;
pub mod progress;
pub mod reports;
pub mod timetable;
