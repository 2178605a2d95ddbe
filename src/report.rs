//! End-of-term class report: grades every subject score, aggregates each
//! student's best subjects and ranks the class overall and per subject.

use crate::aggregate::{aggregate, SubjectWeight};
use crate::config::GradingConfig;
use crate::error::{EngineError, Result};
use crate::grading::{round_off_1_decimal, SubjectScore};
use crate::ranking::rank;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_id: String,
    pub percentage: f64,
    pub symbol: String,
    pub weight: u32,
    pub subject_position: usize,
    pub counted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    pub subjects: Vec<SubjectResult>,
    pub aggregate_score: u64,
    pub classification: String,
    pub total_percentage: f64,
    pub average_percentage: f64,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub best_of: usize,
    pub student_count: usize,
    pub students: Vec<StudentReport>,
}

pub fn build_class_report(scores: &[SubjectScore], config: &GradingConfig) -> Result<ClassReport> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for s in scores {
        s.validate()?;
        if !seen.insert((s.student_id.as_str(), s.subject_id.as_str())) {
            return Err(EngineError::DuplicateScore {
                subject_id: s.subject_id.clone(),
                student_id: s.student_id.clone(),
            });
        }
    }

    let mut student_order: Vec<&str> = Vec::new();
    let mut by_student: HashMap<&str, Vec<&SubjectScore>> = HashMap::new();
    let mut subject_order: Vec<&str> = Vec::new();
    let mut by_subject: HashMap<&str, Vec<(&str, f64)>> = HashMap::new();

    for s in scores {
        let pct = config.percentage_of(s);
        by_student
            .entry(s.student_id.as_str())
            .or_insert_with(|| {
                student_order.push(s.student_id.as_str());
                Vec::new()
            })
            .push(s);
        by_subject
            .entry(s.subject_id.as_str())
            .or_insert_with(|| {
                subject_order.push(s.subject_id.as_str());
                Vec::new()
            })
            .push((s.student_id.as_str(), pct));
    }

    let mut subject_positions: HashMap<(&str, &str), usize> = HashMap::new();
    for subject in &subject_order {
        let Some(entries) = by_subject.get(subject) else {
            continue;
        };
        for r in rank(entries) {
            subject_positions.insert((*subject, r.id), r.position);
        }
    }

    let mut reports: Vec<StudentReport> = Vec::with_capacity(student_order.len());
    // Unrounded totals by report index; positions must not see display rounding.
    let mut totals: Vec<(usize, f64)> = Vec::with_capacity(student_order.len());
    for student in &student_order {
        let rows = by_student.get(student).map(Vec::as_slice).unwrap_or(&[]);

        let mut subjects: Vec<SubjectResult> = Vec::with_capacity(rows.len());
        for s in rows {
            let percentage = config.percentage_of(s);
            let grade = config.grade_scale.resolve(percentage)?;
            subjects.push(SubjectResult {
                subject_id: s.subject_id.clone(),
                percentage: round_off_1_decimal(percentage),
                symbol: grade.symbol,
                weight: grade.weight,
                subject_position: subject_positions
                    .get(&(s.subject_id.as_str(), *student))
                    .copied()
                    .unwrap_or(0),
                counted: false,
            });
        }

        let weights: Vec<SubjectWeight> = subjects
            .iter()
            .map(|s| SubjectWeight::new(s.subject_id.clone(), s.weight))
            .collect();
        let agg = aggregate(&weights, config.best_of, &config.classification_scale);
        for s in subjects.iter_mut() {
            s.counted = agg.counted.iter().any(|c| c.subject_id == s.subject_id);
        }

        let total: f64 = rows.iter().map(|s| config.percentage_of(s)).sum();
        totals.push((reports.len(), total));
        let average = if rows.is_empty() {
            0.0
        } else {
            total / rows.len() as f64
        };
        reports.push(StudentReport {
            student_id: student.to_string(),
            subjects,
            aggregate_score: agg.aggregate_score,
            classification: agg.classification,
            total_percentage: round_off_1_decimal(total),
            average_percentage: round_off_1_decimal(average),
            position: 0,
        });
    }

    let ranked = rank(&totals);
    let mut ordered: Vec<StudentReport> = Vec::with_capacity(reports.len());
    for r in ranked {
        let mut report = reports[r.id].clone();
        report.position = r.position;
        ordered.push(report);
    }

    Ok(ClassReport {
        best_of: config.best_of,
        student_count: ordered.len(),
        students: ordered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(subject: &str, student: &str, awarded: f64) -> SubjectScore {
        SubjectScore::new(subject, student, awarded, 100.0)
    }

    #[test]
    fn ranks_students_and_subjects() {
        let config = GradingConfig {
            best_of: 2,
            ..GradingConfig::default()
        };
        let scores = vec![
            score("math", "amy", 85.0),
            score("eng", "amy", 70.0),
            score("bio", "amy", 40.0),
            score("math", "ben", 85.0),
            score("eng", "ben", 90.0),
            score("math", "cal", 50.0),
            score("eng", "cal", 60.0),
        ];
        let report = build_class_report(&scores, &config).unwrap();
        assert_eq!(report.student_count, 3);

        let order: Vec<(&str, usize)> = report
            .students
            .iter()
            .map(|s| (s.student_id.as_str(), s.position))
            .collect();
        assert_eq!(order, vec![("amy", 1), ("ben", 2), ("cal", 3)]);

        let amy = &report.students[0];
        // D1 (1) + C3 (3), F9 dropped
        assert_eq!(amy.aggregate_score, 4);
        assert_eq!(amy.classification, "Division 1");
        let bio = amy.subjects.iter().find(|s| s.subject_id == "bio").unwrap();
        assert_eq!(bio.symbol, "F9");
        assert!(!bio.counted);

        let amy_math = amy.subjects.iter().find(|s| s.subject_id == "math").unwrap();
        assert_eq!(amy_math.subject_position, 1);
        let ben = &report.students[1];
        let ben_math = ben.subjects.iter().find(|s| s.subject_id == "math").unwrap();
        assert_eq!(ben_math.subject_position, 1);
        let ben_eng = ben.subjects.iter().find(|s| s.subject_id == "eng").unwrap();
        assert_eq!(ben_eng.subject_position, 1);
    }

    #[test]
    fn invalid_row_fails_whole_report() {
        let scores = vec![
            score("math", "amy", 85.0),
            SubjectScore::new("eng", "amy", 120.0, 100.0),
        ];
        let err = build_class_report(&scores, &GradingConfig::default()).unwrap_err();
        assert_eq!(err.code(), "invalid_score");
    }

    #[test]
    fn near_equal_totals_keep_distinct_positions() {
        let scores = vec![
            SubjectScore::new("math", "ben", 74.98, 100.0),
            SubjectScore::new("eng", "ben", 74.98, 100.0),
            SubjectScore::new("math", "amy", 75.02, 100.0),
            SubjectScore::new("eng", "amy", 75.02, 100.0),
        ];
        let report = build_class_report(&scores, &GradingConfig::default()).unwrap();
        let amy = &report.students[0];
        let ben = &report.students[1];
        assert_eq!(amy.student_id, "amy");
        assert_eq!(amy.total_percentage, ben.total_percentage);
        assert_eq!(amy.position, 1);
        assert_eq!(ben.position, 2);
    }

    #[test]
    fn duplicate_subject_row_is_rejected() {
        let scores = vec![
            score("math", "amy", 85.0),
            score("eng", "amy", 60.0),
            score("math", "amy", 40.0),
        ];
        let err = build_class_report(&scores, &GradingConfig::default()).unwrap_err();
        assert_eq!(err.code(), "bad_params");
        assert_eq!(
            err,
            EngineError::DuplicateScore {
                subject_id: "math".to_string(),
                student_id: "amy".to_string(),
            }
        );
    }

    #[test]
    fn empty_scores_give_empty_report() {
        let report = build_class_report(&[], &GradingConfig::default()).unwrap();
        assert!(report.students.is_empty());
        assert_eq!(report.best_of, 8);
    }
}
