//! Grading, ranking and timetable-clash engine for school records.
//!
//! The pure pieces (`grading`, `aggregate`, `ranking`, `timetable`, `marks`,
//! `report`) have no I/O. `ipc`, `db` and `backup` make up the sidecar that
//! serves them over newline-delimited JSON.

pub mod aggregate;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod ipc;
pub mod marks;
pub mod ranking;
pub mod report;
pub mod timetable;

pub use error::{EngineError, Result};
