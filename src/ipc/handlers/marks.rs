use crate::ipc::helpers::{get_list, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::marks::{build_marks_matrix, Question, QuestionScore};
use serde_json::Value;

const MAX_QUESTIONS: usize = 256;
const MAX_QUESTION_SCORES: usize = 100_000;

fn handle_matrix(req: &Request) -> Result<Value, HandlerErr> {
    let questions: Vec<Question> = get_list(&req.params, "questions", MAX_QUESTIONS)?;
    if let Some(bad) = questions
        .iter()
        .find(|q| !q.max_score.is_finite() || q.max_score < 0.0)
    {
        return Err(HandlerErr::bad_params(format!(
            "question {} maxScore must be a non-negative number",
            bad.question_id
        )));
    }
    let scores: Vec<QuestionScore> = get_list(&req.params, "scores", MAX_QUESTION_SCORES)?;
    let matrix = build_marks_matrix(&questions, &scores)?;
    serde_json::to_value(matrix)
        .map_err(|e| HandlerErr::new("internal", format!("failed to encode matrix: {}", e)))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "marks.matrix" => Some(respond(req, handle_matrix(req))),
        _ => None,
    }
}
