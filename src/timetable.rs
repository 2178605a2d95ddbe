use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const FIRST_DAY: u8 = 1;
pub const LAST_DAY: u8 = 5;

/// The teaching week a grid is laid out on: days 1..=5 and an ordered list
/// of period ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    periods: Vec<String>,
}

impl Schedule {
    pub fn new<I, S>(periods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let periods = periods
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| seen.insert(p.clone()))
            .collect();
        Self { periods }
    }

    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    fn period_index(&self, period_id: &str) -> Option<usize> {
        self.periods.iter().position(|p| p == period_id)
    }

    /// Maps a (day, period) pair to its position in the grid, failing for
    /// anything outside the configured week.
    fn locate(&self, day: u8, period_id: &str) -> Result<(u8, usize)> {
        let idx = if (FIRST_DAY..=LAST_DAY).contains(&day) {
            self.period_index(period_id)
        } else {
            None
        };
        idx.map(|i| (day, i))
            .ok_or_else(|| EngineError::InvalidGridCoordinate {
                day,
                period_id: period_id.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub subject_id: String,
    pub instructor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TimetableEntry {
    pub fn new(subject_id: impl Into<String>, instructor_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            instructor_id: instructor_id.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedEntry<'a> {
    pub day: u8,
    pub period_id: &'a str,
    #[serde(flatten)]
    pub entry: &'a TimetableEntry,
}

/// Sparse (day, period) grid holding at most one entry per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TimetableGrid {
    id: String,
    schedule: Schedule,
    cells: BTreeMap<(u8, usize), TimetableEntry>,
}

impl TimetableGrid {
    pub fn new(id: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: id.into(),
            schedule,
            cells: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Last write wins; any existing entry in the cell is replaced.
    pub fn set_entry(&mut self, day: u8, period_id: &str, entry: TimetableEntry) -> Result<()> {
        let key = self.schedule.locate(day, period_id)?;
        self.cells.insert(key, entry);
        Ok(())
    }

    pub fn clear_entry(&mut self, day: u8, period_id: &str) -> Result<Option<TimetableEntry>> {
        let key = self.schedule.locate(day, period_id)?;
        Ok(self.cells.remove(&key))
    }

    pub fn get_entry(&self, day: u8, period_id: &str) -> Result<Option<&TimetableEntry>> {
        let key = self.schedule.locate(day, period_id)?;
        Ok(self.cells.get(&key))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied cells, day-major then in schedule period order.
    pub fn entries(&self) -> impl Iterator<Item = PlacedEntry<'_>> + '_ {
        self.cells.iter().map(|(&(day, idx), entry)| PlacedEntry {
            day,
            period_id: &self.schedule.periods[idx],
            entry,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellKey {
    pub timetable_id: String,
    pub day: u8,
    pub period_id: String,
}

/// One instructor booked into the same slot by more than one timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clash {
    pub instructor_id: String,
    pub day: u8,
    pub period_id: String,
    pub cells: Vec<CellKey>,
}

/// Groups every occupied cell across `grids` by (instructor, day, period)
/// and reports each group with two or more cells. Grids sharing an id are
/// only counted once. Never mutates the grids.
pub fn find_clash_groups(grids: &[&TimetableGrid]) -> Vec<Clash> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut groups: HashMap<(&str, u8, &str), Vec<CellKey>> = HashMap::new();

    for grid in grids {
        if !seen_ids.insert(grid.id()) {
            continue;
        }
        for placed in grid.entries() {
            groups
                .entry((placed.entry.instructor_id.as_str(), placed.day, placed.period_id))
                .or_default()
                .push(CellKey {
                    timetable_id: grid.id().to_string(),
                    day: placed.day,
                    period_id: placed.period_id.to_string(),
                });
        }
    }

    let mut clashes: Vec<Clash> = groups
        .into_iter()
        .filter(|(_, cells)| cells.len() >= 2)
        .map(|((instructor_id, day, period_id), mut cells)| {
            cells.sort();
            Clash {
                instructor_id: instructor_id.to_string(),
                day,
                period_id: period_id.to_string(),
                cells,
            }
        })
        .collect();
    clashes.sort_by(|a, b| {
        (a.day, &a.period_id, &a.instructor_id).cmp(&(b.day, &b.period_id, &b.instructor_id))
    });
    clashes
}

/// The set of cells to flag for instructor double-booking.
pub fn find_clashes(grids: &[&TimetableGrid]) -> BTreeSet<CellKey> {
    find_clash_groups(grids)
        .into_iter()
        .flat_map(|c| c.cells)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> Schedule {
        Schedule::new(["P1", "P2", "P3"])
    }

    #[test]
    fn set_entry_overwrites_cell() {
        let mut grid = TimetableGrid::new("s1", week());
        grid.set_entry(1, "P1", TimetableEntry::new("math", "T1")).unwrap();
        grid.set_entry(1, "P1", TimetableEntry::new("english", "T2")).unwrap();
        let got = grid.get_entry(1, "P1").unwrap().unwrap();
        assert_eq!(got.subject_id, "english");
        assert_eq!(got.instructor_id, "T2");
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn clear_entry_empties_cell() {
        let mut grid = TimetableGrid::new("s1", week());
        grid.set_entry(2, "P3", TimetableEntry::new("chem", "T4").with_note("lab")).unwrap();
        let removed = grid.clear_entry(2, "P3").unwrap();
        assert_eq!(removed.and_then(|e| e.note), Some("lab".to_string()));
        assert_eq!(grid.get_entry(2, "P3").unwrap(), None);
        assert_eq!(grid.clear_entry(2, "P3").unwrap(), None);
    }

    #[test]
    fn coordinates_outside_schedule_fail() {
        let mut grid = TimetableGrid::new("s1", week());
        let err = grid
            .set_entry(6, "P1", TimetableEntry::new("math", "T1"))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_grid_coordinate");
        assert!(grid.set_entry(0, "P1", TimetableEntry::new("math", "T1")).is_err());
        assert!(grid.get_entry(1, "P9").is_err());
        assert!(grid.clear_entry(3, "lunch").is_err());
        assert!(grid.is_empty());
    }

    #[test]
    fn entries_follow_schedule_order() {
        let mut grid = TimetableGrid::new("s1", Schedule::new(["early", "mid", "late"]));
        grid.set_entry(2, "early", TimetableEntry::new("a", "T1")).unwrap();
        grid.set_entry(1, "late", TimetableEntry::new("b", "T1")).unwrap();
        grid.set_entry(1, "early", TimetableEntry::new("c", "T1")).unwrap();
        let order: Vec<(u8, &str)> = grid.entries().map(|p| (p.day, p.period_id)).collect();
        assert_eq!(order, vec![(1, "early"), (1, "late"), (2, "early")]);
    }

    #[test]
    fn shared_instructor_same_slot_clashes() {
        let mut g1 = TimetableGrid::new("G1", week());
        let mut g2 = TimetableGrid::new("G2", week());
        g1.set_entry(1, "P1", TimetableEntry::new("math", "X")).unwrap();
        g2.set_entry(1, "P1", TimetableEntry::new("physics", "X")).unwrap();
        g2.set_entry(1, "P2", TimetableEntry::new("physics", "X")).unwrap();

        let clashes = find_clashes(&[&g1, &g2]);
        let expected: BTreeSet<CellKey> = [
            CellKey {
                timetable_id: "G1".into(),
                day: 1,
                period_id: "P1".into(),
            },
            CellKey {
                timetable_id: "G2".into(),
                day: 1,
                period_id: "P1".into(),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(clashes, expected);

        let groups = find_clash_groups(&[&g1, &g2]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].instructor_id, "X");
    }

    #[test]
    fn no_shared_slot_means_no_clash() {
        let mut g1 = TimetableGrid::new("G1", week());
        let mut g2 = TimetableGrid::new("G2", week());
        g1.set_entry(1, "P1", TimetableEntry::new("math", "X")).unwrap();
        g2.set_entry(1, "P1", TimetableEntry::new("history", "Y")).unwrap();
        g2.set_entry(2, "P1", TimetableEntry::new("history", "X")).unwrap();
        assert!(find_clashes(&[&g1, &g2]).is_empty());
    }

    #[test]
    fn same_grid_twice_is_not_a_clash() {
        let mut g1 = TimetableGrid::new("G1", week());
        g1.set_entry(4, "P2", TimetableEntry::new("math", "X")).unwrap();
        assert!(find_clashes(&[&g1, &g1]).is_empty());
        assert!(find_clashes(&[]).is_empty());
    }

    #[test]
    fn schedule_drops_duplicate_periods() {
        let s = Schedule::new(["P1", "P2", "P1"]);
        assert_eq!(s.periods(), &["P1".to_string(), "P2".to_string()]);
    }
}
