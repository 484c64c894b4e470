pub mod core;
pub mod dashboard;
pub mod exchange;
pub mod student_api;
