mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar};

#[test]
fn marks_matrix_pivots_question_scores() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let matrix = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.matrix",
        json!({
            "questions": [
                { "questionId": "q1", "maxScore": 10 },
                { "questionId": "q2", "maxScore": 10 }
            ],
            "scores": [
                { "studentId": "amy", "questionId": "q1", "score": 8 },
                { "studentId": "amy", "questionId": "q2", "score": 9 },
                { "studentId": "ben", "questionId": "q1", "score": 4 },
                { "studentId": "cal", "questionId": "q1", "score": 6 },
                { "studentId": "cal", "questionId": "q2", "score": 5 }
            ]
        }),
    );
    assert_eq!(matrix["totalPossible"].as_f64(), Some(20.0));

    let rows = matrix["rows"].as_array().expect("rows");
    let order: Vec<&str> = rows
        .iter()
        .map(|r| r["studentId"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(order, vec!["amy", "cal", "ben"]);
    assert_eq!(rows[0]["percentage"].as_f64(), Some(85.0));
    assert_eq!(rows[0]["percentile"].as_f64(), Some(100.0));
    assert_eq!(rows[2]["percentile"].as_f64(), Some(0.0));
    assert_eq!(rows[2]["cells"], json!([4.0, null]));
    assert_eq!(rows[2]["belowAverage"], true);
    assert_eq!(rows[0]["belowAverage"], false);

    let q2 = &matrix["questions"][1];
    assert_eq!(q2["scoredCount"], 2);
    assert_eq!(q2["avgScore"].as_f64(), Some(7.0));

    let over = request(
        &mut stdin,
        &mut reader,
        "2",
        "marks.matrix",
        json!({
            "questions": [ { "questionId": "q1", "maxScore": 10 } ],
            "scores": [ { "studentId": "amy", "questionId": "q1", "score": 11 } ]
        }),
    );
    assert_eq!(error_code(&over), "invalid_score");

    let unknown = request(
        &mut stdin,
        &mut reader,
        "3",
        "marks.matrix",
        json!({
            "questions": [ { "questionId": "q1", "maxScore": 10 } ],
            "scores": [ { "studentId": "amy", "questionId": "q9", "score": 1 } ]
        }),
    );
    assert_eq!(error_code(&unknown), "invalid_score");

    let dup = request(
        &mut stdin,
        &mut reader,
        "4",
        "marks.matrix",
        json!({
            "questions": [
                { "questionId": "q1", "maxScore": 10 },
                { "questionId": "q1", "maxScore": 5 }
            ],
            "scores": []
        }),
    );
    assert_eq!(error_code(&dup), "bad_params");
    assert_eq!(dup["error"]["details"]["questionId"], "q1");

    let _ = child.kill();
}
