use crate::grading::SubjectScore;
use crate::ipc::helpers::{get_list, get_opt_usize, load_grading_config, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::report::build_class_report;
use serde_json::Value;

const MAX_SCORE_ROWS: usize = 50_000;

fn handle_class_report(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let mut cfg = load_grading_config(state)?;
    if let Some(best_of) = get_opt_usize(&req.params, "bestOf", 1, 64)? {
        cfg.best_of = best_of;
    }
    let scores: Vec<SubjectScore> = get_list(&req.params, "scores", MAX_SCORE_ROWS)?;
    let report = build_class_report(&scores, &cfg)?;
    tracing::debug!(students = report.student_count, "class report built");
    serde_json::to_value(report)
        .map_err(|e| HandlerErr::new("internal", format!("failed to encode report: {}", e)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.class" => Some(respond(req, handle_class_report(state, req))),
        _ => None,
    }
}
