use crate::db::{self, StoredTimetable};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_query, db_update, get_bool_or, get_day, get_opt_str, get_str, require_db, respond,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{find_clash_groups, Schedule, TimetableEntry, TimetableGrid};
use rusqlite::Connection;
use serde_json::{json, Value};

const MAX_PERIODS: usize = 24;
const MAX_CLASH_TIMETABLES: usize = 200;
const MAX_NOTE_LEN: usize = 500;

fn load_required(conn: &Connection, timetable_id: &str) -> Result<StoredTimetable, HandlerErr> {
    db::timetable_load(conn, timetable_id)
        .map_err(db_query)?
        .ok_or_else(|| {
            HandlerErr::new("not_found", "timetable not found")
                .with_details(json!({ "timetableId": timetable_id }))
        })
}

fn grid_json(grid: &TimetableGrid) -> Value {
    json!({
        "timetableId": grid.id(),
        "periods": grid.schedule().periods(),
        "entries": grid.entries().collect::<Vec<_>>(),
    })
}

fn handle_timetables_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "timetables": [] }));
    };
    match db::timetable_list(conn) {
        Ok(rows) => {
            let timetables: Vec<Value> = rows
                .into_iter()
                .map(|t| {
                    json!({
                        "id": t.id,
                        "name": t.name,
                        "periods": t.periods,
                        "published": t.published,
                        "publishedAt": t.published_at,
                        "entryCount": t.entry_count,
                    })
                })
                .collect();
            ok(&req.id, json!({ "timetables": timetables }))
        }
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_timetables_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_str(&req.params, "name")?;
    let Some(raw_periods) = req.params.get("periods").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("periods must be an array of strings"));
    };
    if raw_periods.is_empty() || raw_periods.len() > MAX_PERIODS {
        return Err(HandlerErr::bad_params(format!(
            "periods must have 1..={} entries",
            MAX_PERIODS
        )));
    }
    let mut periods: Vec<String> = Vec::with_capacity(raw_periods.len());
    for p in raw_periods {
        let s = p.as_str().map(str::trim).unwrap_or("");
        if s.is_empty() {
            return Err(HandlerErr::bad_params("period ids must be non-empty strings"));
        }
        periods.push(s.to_string());
    }
    let schedule = Schedule::new(periods);
    let id = db::timetable_create(conn, name, &schedule).map_err(db_update)?;
    tracing::info!(timetable_id = %id, name, "timetable created");
    Ok(json!({ "timetableId": id, "name": name, "periods": schedule.periods() }))
}

fn handle_timetables_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_str(&req.params, "timetableId")?;
    if !db::timetable_delete(conn, id).map_err(db_update)? {
        return Err(HandlerErr::new("not_found", "timetable not found"));
    }
    Ok(json!({ "ok": true }))
}

fn handle_entry_set(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_str(&req.params, "timetableId")?;
    let day = get_day(&req.params)?;
    let period_id = get_str(&req.params, "periodId")?;
    let subject_id = get_str(&req.params, "subjectId")?;
    let instructor_id = get_str(&req.params, "instructorId")?;
    let note = get_opt_str(&req.params, "note")?
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if note.map(|n| n.len() > MAX_NOTE_LEN).unwrap_or(false) {
        return Err(HandlerErr::bad_params(format!(
            "note length must be <= {}",
            MAX_NOTE_LEN
        )));
    }

    let mut entry = TimetableEntry::new(subject_id, instructor_id);
    if let Some(n) = note {
        entry = entry.with_note(n);
    }

    // Validate against the stored schedule before writing.
    let mut stored = load_required(conn, id)?;
    stored.grid.set_entry(day, period_id, entry.clone())?;
    db::timetable_entry_upsert(conn, id, day, period_id, &entry).map_err(db_update)?;

    let saved = load_required(conn, id)?;
    let current = saved.grid.get_entry(day, period_id)?;
    Ok(json!({ "entry": current }))
}

fn handle_entry_clear(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_str(&req.params, "timetableId")?;
    let day = get_day(&req.params)?;
    let period_id = get_str(&req.params, "periodId")?;

    let mut stored = load_required(conn, id)?;
    let removed = stored.grid.clear_entry(day, period_id)?;
    if removed.is_some() {
        db::timetable_entry_delete(conn, id, day, period_id).map_err(db_update)?;
    }
    Ok(json!({ "cleared": removed.is_some() }))
}

fn handle_entry_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_str(&req.params, "timetableId")?;
    let day = get_day(&req.params)?;
    let period_id = get_str(&req.params, "periodId")?;
    let stored = load_required(conn, id)?;
    let entry = stored.grid.get_entry(day, period_id)?;
    Ok(json!({ "entry": entry }))
}

fn handle_grid(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_str(&req.params, "timetableId")?;
    let stored = load_required(conn, id)?;
    let mut out = grid_json(&stored.grid);
    out["name"] = json!(stored.name);
    out["published"] = json!(stored.published);
    Ok(out)
}

/// Loads the named timetables plus, when asked, everything already
/// published. Each timetable is loaded once.
fn load_for_clash_check(
    conn: &Connection,
    ids: &[String],
    include_published: bool,
) -> Result<Vec<TimetableGrid>, HandlerErr> {
    let mut wanted: Vec<String> = ids.to_vec();
    if include_published {
        wanted.extend(db::published_timetable_ids(conn).map_err(db_query)?);
    }
    let mut seen = std::collections::HashSet::new();
    wanted.retain(|id| seen.insert(id.clone()));

    wanted
        .iter()
        .map(|id| load_required(conn, id).map(|t| t.grid))
        .collect()
}

fn handle_clashes(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let ids: Vec<String> = match req.params.get("timetableIds") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            if items.len() > MAX_CLASH_TIMETABLES {
                return Err(HandlerErr::bad_params(format!(
                    "timetableIds must have at most {} entries",
                    MAX_CLASH_TIMETABLES
                )));
            }
            items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| HandlerErr::bad_params("timetableIds must be strings"))
                })
                .collect::<Result<_, _>>()?
        }
        Some(_) => return Err(HandlerErr::bad_params("timetableIds must be an array")),
    };
    let include_published = get_bool_or(&req.params, "includePublished", true)?;

    let grids = load_for_clash_check(conn, &ids, include_published)?;
    let refs: Vec<&TimetableGrid> = grids.iter().collect();
    let clashes = find_clash_groups(&refs);
    let cells: Vec<_> = clashes.iter().flat_map(|c| c.cells.iter()).collect();
    Ok(json!({
        "checked": grids.len(),
        "clashes": clashes,
        "cells": cells,
    }))
}

/// Publishing is where clashes are enforced: detection stays advisory,
/// and `override: true` publishes regardless.
fn handle_publish(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_str(&req.params, "timetableId")?;
    let force = get_bool_or(&req.params, "override", false)?;

    let grids = load_for_clash_check(conn, &[id.to_string()], true)?;
    let refs: Vec<&TimetableGrid> = grids.iter().collect();
    let clashes: Vec<_> = find_clash_groups(&refs)
        .into_iter()
        .filter(|c| c.cells.iter().any(|cell| cell.timetable_id == id))
        .collect();

    if !clashes.is_empty() && !force {
        tracing::warn!(timetable_id = %id, clashes = clashes.len(), "publish blocked by clashes");
        return Err(
            HandlerErr::new("clash_detected", "instructor double-booked in another timetable")
                .with_details(json!({ "clashes": clashes })),
        );
    }
    if !clashes.is_empty() {
        tracing::warn!(timetable_id = %id, clashes = clashes.len(), "publishing with clash override");
    }

    let published_at = db::timetable_mark_published(conn, id).map_err(db_update)?;
    Ok(json!({
        "timetableId": id,
        "published": true,
        "publishedAt": published_at,
        "overriddenClashes": clashes,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: fn(&mut AppState, &Request) -> Result<Value, HandlerErr> =
        match req.method.as_str() {
            "timetables.list" => return Some(handle_timetables_list(state, req)),
            "timetables.create" => handle_timetables_create,
            "timetables.delete" => handle_timetables_delete,
            "timetable.entries.set" => handle_entry_set,
            "timetable.entries.clear" => handle_entry_clear,
            "timetable.entries.get" => handle_entry_get,
            "timetable.grid" => handle_grid,
            "timetable.clashes" => handle_clashes,
            "timetable.publish" => handle_publish,
            _ => return None,
        };
    Some(respond(req, handler(state, req)))
}
