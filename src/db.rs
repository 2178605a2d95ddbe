use crate::timetable::{Schedule, TimetableEntry, TimetableGrid};
use anyhow::{anyhow, Context};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "schoold.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetables(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            periods_json TEXT NOT NULL,
            published INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            timetable_id TEXT NOT NULL,
            day INTEGER NOT NULL,
            period_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            instructor_id TEXT NOT NULL,
            note TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(timetable_id, day, period_id),
            FOREIGN KEY(timetable_id) REFERENCES timetables(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_entries_instructor
         ON timetable_entries(instructor_id, day, period_id)",
        [],
    )?;

    Ok(conn)
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => {
            let v = serde_json::from_str(&text)
                .with_context(|| format!("settings value for {} is not valid JSON", key))?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, &text),
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TimetableSummary {
    pub id: String,
    pub name: String,
    pub periods: Vec<String>,
    pub published: bool,
    pub published_at: Option<String>,
    pub entry_count: i64,
}

#[derive(Debug, Clone)]
pub struct StoredTimetable {
    pub name: String,
    pub published: bool,
    pub grid: TimetableGrid,
}

pub fn timetable_create(conn: &Connection, name: &str, schedule: &Schedule) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let periods_json = serde_json::to_string(schedule.periods())?;
    conn.execute(
        "INSERT INTO timetables(id, name, periods_json, published, created_at)
         VALUES(?, ?, ?, 0, ?)",
        (&id, name, &periods_json, now_rfc3339()),
    )?;
    Ok(id)
}

pub fn timetable_list(conn: &Connection) -> anyhow::Result<Vec<TimetableSummary>> {
    let mut stmt = conn.prepare(
        "SELECT
           t.id,
           t.name,
           t.periods_json,
           t.published,
           t.published_at,
           (SELECT COUNT(*) FROM timetable_entries e WHERE e.timetable_id = t.id)
         FROM timetables t
         ORDER BY t.name, t.created_at",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, Option<String>>(4)?,
                r.get::<_, i64>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, name, periods_json, published, published_at, entry_count)| {
            let periods: Vec<String> = serde_json::from_str(&periods_json)
                .with_context(|| format!("timetable {} has malformed periods", id))?;
            Ok(TimetableSummary {
                id,
                name,
                periods,
                published: published != 0,
                published_at,
                entry_count,
            })
        })
        .collect()
}

pub fn timetable_delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM timetables WHERE id = ?", [id])?;
    Ok(n > 0)
}

/// Loads a timetable and rebuilds its grid. Rows whose cell is no longer in
/// the schedule are reported as an error rather than dropped.
pub fn timetable_load(conn: &Connection, id: &str) -> anyhow::Result<Option<StoredTimetable>> {
    let head: Option<(String, String, i64)> = conn
        .query_row(
            "SELECT name, periods_json, published FROM timetables WHERE id = ?",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((name, periods_json, published)) = head else {
        return Ok(None);
    };
    let periods: Vec<String> = serde_json::from_str(&periods_json)
        .with_context(|| format!("timetable {} has malformed periods", id))?;
    let mut grid = TimetableGrid::new(id, Schedule::new(periods));

    let mut stmt = conn.prepare(
        "SELECT day, period_id, subject_id, instructor_id, note
         FROM timetable_entries
         WHERE timetable_id = ?",
    )?;
    let rows = stmt
        .query_map([id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                TimetableEntry {
                    subject_id: r.get(2)?,
                    instructor_id: r.get(3)?,
                    note: r.get(4)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (day, period_id, entry) in rows {
        let day = u8::try_from(day).map_err(|_| anyhow!("stored day {} out of range", day))?;
        grid.set_entry(day, &period_id, entry)
            .with_context(|| format!("timetable {} has a stray entry", id))?;
    }

    Ok(Some(StoredTimetable {
        name,
        published: published != 0,
        grid,
    }))
}

pub fn timetable_entry_upsert(
    conn: &Connection,
    timetable_id: &str,
    day: u8,
    period_id: &str,
    entry: &TimetableEntry,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO timetable_entries(timetable_id, day, period_id, subject_id, instructor_id, note, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(timetable_id, day, period_id) DO UPDATE SET
           subject_id = excluded.subject_id,
           instructor_id = excluded.instructor_id,
           note = excluded.note,
           updated_at = excluded.updated_at",
        (
            timetable_id,
            day,
            period_id,
            &entry.subject_id,
            &entry.instructor_id,
            &entry.note,
            now_rfc3339(),
        ),
    )?;
    Ok(())
}

pub fn timetable_entry_delete(
    conn: &Connection,
    timetable_id: &str,
    day: u8,
    period_id: &str,
) -> anyhow::Result<bool> {
    let n = conn.execute(
        "DELETE FROM timetable_entries WHERE timetable_id = ? AND day = ? AND period_id = ?",
        (timetable_id, day, period_id),
    )?;
    Ok(n > 0)
}

pub fn published_timetable_ids(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM timetables WHERE published = 1 ORDER BY id")?;
    let ids = stmt
        .query_map([], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn timetable_mark_published(conn: &Connection, id: &str) -> anyhow::Result<String> {
    let at = now_rfc3339();
    conn.execute(
        "UPDATE timetables SET published = 1, published_at = ? WHERE id = ?",
        (&at, id),
    )?;
    Ok(at)
}
