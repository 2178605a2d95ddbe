use crate::aggregate::{aggregate, SubjectWeight};
use crate::config::GradingConfig;
use crate::db;
use crate::grading::{round_off_1_decimal, SubjectScore};
use crate::ipc::helpers::{
    db_update, get_f64, get_list, get_opt_usize, get_typed, load_grading_config, require_db,
    respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::ranking::rank;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_SUBJECTS: usize = 64;
const MAX_RANK_ENTRIES: usize = 10_000;

fn handle_config_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let cfg = load_grading_config(state)?;
    Ok(cfg.to_json())
}

fn handle_config_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let Some(patch) = req.params.as_object() else {
        return Err(HandlerErr::bad_params("params must be an object"));
    };
    let mut cfg = load_grading_config(state)?;
    cfg.apply_patch(patch).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(conn, GradingConfig::SETTINGS_KEY, &cfg.to_json()).map_err(db_update)?;
    tracing::info!(best_of = cfg.best_of, "grading config updated");
    Ok(json!({ "ok": true }))
}

fn handle_resolve(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let cfg = load_grading_config(state)?;
    let percentage = cfg.normalize(get_f64(&req.params, "percentage")?);
    let grade = cfg.grade_scale.resolve(percentage)?;
    Ok(json!({
        "symbol": grade.symbol,
        "label": grade.label,
        "weight": grade.weight,
    }))
}

fn handle_resolve_score(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let cfg = load_grading_config(state)?;
    let score: SubjectScore = get_typed(&req.params, "score")?;
    score.validate()?;
    let percentage = cfg.percentage_of(&score);
    let grade = cfg.grade_scale.resolve(percentage)?;
    Ok(json!({
        "percentage": round_off_1_decimal(percentage),
        "symbol": grade.symbol,
        "label": grade.label,
        "weight": grade.weight,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreInput {
    subject_id: String,
    total_awarded: f64,
    total_possible: f64,
}

fn handle_aggregate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let cfg = load_grading_config(state)?;
    let best_of = get_opt_usize(&req.params, "bestOf", 1, MAX_SUBJECTS)?.unwrap_or(cfg.best_of);

    let weights: Vec<SubjectWeight> = if req.params.get("subjects").is_some() {
        get_list(&req.params, "subjects", MAX_SUBJECTS)?
    } else if req.params.get("scores").is_some() {
        let inputs: Vec<ScoreInput> = get_list(&req.params, "scores", MAX_SUBJECTS)?;
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            let score = SubjectScore::new(
                input.subject_id,
                "",
                input.total_awarded,
                input.total_possible,
            );
            score.validate()?;
            let grade = cfg.grade_scale.resolve(cfg.percentage_of(&score))?;
            out.push(SubjectWeight::new(score.subject_id, grade.weight));
        }
        out
    } else {
        return Err(HandlerErr::bad_params("params.subjects or params.scores is required"));
    };

    let agg = aggregate(&weights, best_of, &cfg.classification_scale);
    Ok(json!({
        "bestOf": best_of,
        "aggregateScore": agg.aggregate_score,
        "classification": agg.classification,
        "counted": agg.counted,
        "dropped": agg.dropped,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankInput {
    id: String,
    total_score: f64,
}

fn handle_rank(_state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let inputs: Vec<RankInput> = get_list(&req.params, "entries", MAX_RANK_ENTRIES)?;
    if let Some(bad) = inputs.iter().find(|e| !e.total_score.is_finite()) {
        return Err(HandlerErr::bad_params("totalScore must be finite")
            .with_details(json!({ "id": bad.id })));
    }
    let pairs: Vec<(String, f64)> = inputs.into_iter().map(|e| (e.id, e.total_score)).collect();
    Ok(json!({ "ranking": rank(&pairs) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&mut AppState, &Request) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "grading.config.get" => handle_config_get,
        "grading.config.update" => handle_config_update,
        "grading.resolve" => handle_resolve,
        "grading.resolveScore" => handle_resolve_score,
        "grading.aggregate" => handle_aggregate,
        "grading.rank" => handle_rank,
        _ => return None,
    };
    Some(respond(req, handler(state, req)))
}

