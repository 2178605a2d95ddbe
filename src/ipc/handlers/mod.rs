pub mod backup;
pub mod core;
pub mod grading;
pub mod marks;
pub mod reports;
pub mod timetable;
