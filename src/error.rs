use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(
        "invalid score for subject {subject_id} / student {student_id}: {awarded} of {possible}"
    )]
    InvalidScore {
        subject_id: String,
        student_id: String,
        awarded: f64,
        possible: f64,
    },

    #[error("day {day} / period {period_id} is outside the configured schedule")]
    InvalidGridCoordinate { day: u8, period_id: String },

    #[error("duplicate score for subject {subject_id} / student {student_id}")]
    DuplicateScore {
        subject_id: String,
        student_id: String,
    },

    #[error("duplicate question id {0}")]
    DuplicateQuestion(String),

    #[error("invalid band table: {0}")]
    InvalidBandTable(String),

    #[error("percentage must be finite, got {0}")]
    NonFinitePercentage(f64),
}

impl EngineError {
    /// Stable wire code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidScore { .. } => "invalid_score",
            EngineError::InvalidGridCoordinate { .. } => "invalid_grid_coordinate",
            EngineError::InvalidBandTable(_) => "invalid_band_table",
            EngineError::DuplicateScore { .. }
            | EngineError::DuplicateQuestion(_)
            | EngineError::NonFinitePercentage(_) => "bad_params",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::InvalidScore {
                subject_id,
                student_id,
                awarded,
                possible,
            } => Some(serde_json::json!({
                "subjectId": subject_id,
                "studentId": student_id,
                "awarded": awarded,
                "possible": possible,
            })),
            EngineError::InvalidGridCoordinate { day, period_id } => Some(serde_json::json!({
                "day": day,
                "periodId": period_id,
            })),
            EngineError::DuplicateScore {
                subject_id,
                student_id,
            } => Some(serde_json::json!({
                "subjectId": subject_id,
                "studentId": student_id,
            })),
            EngineError::DuplicateQuestion(question_id) => Some(serde_json::json!({
                "questionId": question_id,
            })),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
