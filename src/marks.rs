//! Question-level mark entry pivoted into a per-student matrix.

use crate::error::{EngineError, Result};
use crate::grading::round_off_1_decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: String,
    pub max_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionScore {
    pub student_id: String,
    pub question_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub student_id: String,
    /// One cell per question in question order; `None` is no mark.
    pub cells: Vec<Option<f64>>,
    pub total: f64,
    pub percentage: f64,
    pub percentile: f64,
    pub below_average: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAverage {
    pub question_id: String,
    pub max_score: f64,
    pub avg_score: f64,
    pub scored_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksMatrix {
    pub questions: Vec<QuestionAverage>,
    pub rows: Vec<MatrixRow>,
    pub total_possible: f64,
    pub class_average: f64,
}

pub fn build_marks_matrix(questions: &[Question], scores: &[QuestionScore]) -> Result<MarksMatrix> {
    let mut col_by_question: HashMap<&str, usize> = HashMap::with_capacity(questions.len());
    for (i, q) in questions.iter().enumerate() {
        if col_by_question.insert(q.question_id.as_str(), i).is_some() {
            return Err(EngineError::DuplicateQuestion(q.question_id.clone()));
        }
    }

    let mut student_order: Vec<&str> = Vec::new();
    let mut cells_by_student: HashMap<&str, Vec<Option<f64>>> = HashMap::new();

    for s in scores {
        let Some(&col) = col_by_question.get(s.question_id.as_str()) else {
            return Err(invalid(s, f64::NAN));
        };
        let max = questions[col].max_score;
        if !s.score.is_finite() || s.score < 0.0 || s.score > max {
            return Err(invalid(s, max));
        }
        let row = cells_by_student
            .entry(s.student_id.as_str())
            .or_insert_with(|| {
                student_order.push(s.student_id.as_str());
                vec![None; questions.len()]
            });
        row[col] = Some(s.score);
    }

    let total_possible: f64 = questions.iter().map(|q| q.max_score.max(0.0)).sum();

    let totals: Vec<f64> = student_order
        .iter()
        .map(|id| {
            cells_by_student
                .get(id)
                .map(|cells| cells.iter().flatten().sum())
                .unwrap_or(0.0)
        })
        .collect();
    let class_average = if totals.is_empty() {
        0.0
    } else {
        totals.iter().sum::<f64>() / totals.len() as f64
    };

    let n = totals.len();
    let mut rows: Vec<MatrixRow> = student_order
        .iter()
        .zip(&totals)
        .map(|(id, &total)| {
            let lower = totals.iter().filter(|&&t| t < total).count();
            let percentile = if n > 1 {
                100.0 * lower as f64 / (n - 1) as f64
            } else {
                100.0
            };
            MatrixRow {
                student_id: id.to_string(),
                cells: cells_by_student.remove(id).unwrap_or_default(),
                total,
                percentage: if total_possible > 0.0 {
                    round_off_1_decimal(total * 100.0 / total_possible)
                } else {
                    0.0
                },
                percentile: round_off_1_decimal(percentile),
                below_average: total < class_average,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total.total_cmp(&a.total));

    let question_averages = questions
        .iter()
        .enumerate()
        .map(|(col, q)| {
            let marked: Vec<f64> = rows.iter().filter_map(|r| r.cells[col]).collect();
            let avg_score = if marked.is_empty() {
                0.0
            } else {
                round_off_1_decimal(marked.iter().sum::<f64>() / marked.len() as f64)
            };
            QuestionAverage {
                question_id: q.question_id.clone(),
                max_score: q.max_score,
                avg_score,
                scored_count: marked.len(),
            }
        })
        .collect();

    Ok(MarksMatrix {
        questions: question_averages,
        rows,
        total_possible,
        class_average: round_off_1_decimal(class_average),
    })
}

fn invalid(s: &QuestionScore, possible: f64) -> EngineError {
    EngineError::InvalidScore {
        subject_id: s.question_id.clone(),
        student_id: s.student_id.clone(),
        awarded: s.score,
        possible,
    }
}
