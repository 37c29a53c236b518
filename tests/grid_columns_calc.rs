mod test_support;

use serde_json::{json, Value};
use test_support::{open_fresh_record, request_err, request_ok, spawn_sidecar, temp_dir};

fn rec(extra: Value) -> Value {
    let mut p = json!({ "teacherId": "t1", "recordKey": "5th_A" });
    for (k, v) in extra.as_object().expect("object") {
        p[k] = v.clone();
    }
    p
}

#[test]
fn grid_entry_sanitizes_and_clamps_while_raw_set_does_not() {
    let workspace = temp_dir("gradebook-grid-clamp");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_fresh_record(&mut stdin, &mut reader, &workspace, "t1");

    let _ = request_ok(&mut stdin, &mut reader, "1", "students.add", rec(json!({ "name": "Ali" })));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "columns.add",
        rec(json!({ "semester": 0, "month": 0, "title": "HW", "max": 40 })),
    );

    let set = |value: Value| rec(json!({ "studentId": 1, "key": "s0-m0-c0", "value": value }));

    let r = request_ok(&mut stdin, &mut reader, "3", "grid.setGrade", set(json!("a3b5")));
    assert_eq!(r["value"], 35);
    let r = request_ok(&mut stdin, &mut reader, "4", "grid.setGrade", set(json!("99")));
    assert_eq!(r["value"], 40);
    let r = request_ok(&mut stdin, &mut reader, "5", "grid.setGrade", set(json!("")));
    assert!(r["value"].is_null());
    let r = request_ok(&mut stdin, &mut reader, "6", "grid.setGrade", set(json!(12)));
    assert_eq!(r["value"], 12);
    assert_eq!(r["averages"]["studentId"], 1);

    // Mid-year is capped at 100 regardless of exam max.
    let r = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grid.setGrade",
        rec(json!({ "studentId": 1, "key": "midYear", "value": "150" })),
    );
    assert_eq!(r["value"], 100);

    let r = request_ok(&mut stdin, &mut reader, "8", "grid.setRaw", set(json!("99")));
    assert_eq!(r["value"], 99);
    let r = request_ok(&mut stdin, &mut reader, "9", "grid.setRaw", set(json!("-4")));
    assert!(r["value"].is_null());

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "10",
            "grid.setGrade",
            rec(json!({ "studentId": 1, "key": "s2-m0-c0", "value": "1" })),
        ),
        "bad_params"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "11", "grid.setGrade", rec(json!({ "studentId": 9, "key": "midYear", "value": "1" }))),
        "not_found"
    );

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn removing_a_middle_column_shifts_later_grades() {
    let workspace = temp_dir("gradebook-column-rekey");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_fresh_record(&mut stdin, &mut reader, &workspace, "t1");
    let _ = request_ok(&mut stdin, &mut reader, "1", "students.add", rec(json!({ "name": "Ali" })));

    for (i, title) in ["a", "b", "c"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "columns.add",
            rec(json!({ "semester": 1, "month": 0, "title": title, "max": 10 })),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "grid.setGrade",
            rec(json!({ "studentId": 1, "key": format!("s1-m0-c{}", i), "value": i + 1 })),
        );
    }

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "columns.remove",
        rec(json!({ "semester": 1, "month": 0, "col": 1 })),
    );
    assert_eq!(removed["removed"]["title"], "b");
    assert_eq!(removed["columns"].as_array().map(|c| c.len()), Some(2));

    let state = request_ok(&mut stdin, &mut reader, "3", "records.get", rec(json!({})));
    let grades = &state["state"]["students"][0]["grades"];
    assert_eq!(grades["s1-m0-c0"], 1);
    assert_eq!(grades["s1-m0-c1"], 3);
    assert!(grades.get("s1-m0-c2").is_none());

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "4",
            "columns.remove",
            rec(json!({ "semester": 1, "month": 0, "col": 5 })),
        ),
        "bad_params"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "5",
            "columns.update",
            rec(json!({ "semester": 1, "month": 0, "col": 0, "max": -1 })),
        ),
        "bad_params"
    );

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn record_averages_follow_regime_rules() {
    let workspace = temp_dir("gradebook-calc-ipc");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_fresh_record(&mut stdin, &mut reader, &workspace, "t1");
    let _ = request_ok(&mut stdin, &mut reader, "1", "students.add", rec(json!({ "name": "Ali" })));
    let _ = request_ok(&mut stdin, &mut reader, "2", "records.setExamMax", rec(json!({ "value": 50 })));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "columns.add",
        rec(json!({ "semester": 0, "month": 0, "title": "HW", "max": 40 })),
    );
    for (i, (key, value)) in [("s0-m0-c0", 35), ("s0-m0-exam", 40), ("midYear", 70), ("finalExam", 85)]
        .iter()
        .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "grid.setGrade",
            rec(json!({ "studentId": 1, "key": key, "value": value })),
        );
    }

    let one = request_ok(&mut stdin, &mut reader, "4", "calc.student", rec(json!({ "studentId": 1 })));
    let month = &one["semesters"][0]["months"][0];
    assert_eq!(month["regime"], "pointSum");
    assert_eq!(month["displayAvg"], 75);
    assert_eq!(month["normalizedAvg"], 83);
    assert_eq!(month["avgMax"], 90);
    // Month 1 has no daily columns: percentage regime over an exam-only month.
    assert_eq!(one["semesters"][0]["months"][1]["regime"], "percentage");
    // round((83 + 0) / 2) = 42; yearly = round((42 + 70 + 0) / 3) = 37;
    // final = round((37 + 85) / 2) = 61
    assert_eq!(one["semesters"][0]["average"], 42);
    assert_eq!(one["yearlyEffort"], 37);
    assert_eq!(one["finalGrade"], 61);

    let all = request_ok(&mut stdin, &mut reader, "5", "calc.record", rec(json!({})));
    assert_eq!(all["students"][0], one);

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn huge_raw_values_and_maxima_keep_the_sidecar_alive() {
    let workspace = temp_dir("gradebook-calc-extreme");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_fresh_record(&mut stdin, &mut reader, &workspace, "t1");
    let _ = request_ok(&mut stdin, &mut reader, "1", "students.add", rec(json!({ "name": "Ali" })));
    for i in 0..2 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "columns.add",
            rec(json!({ "semester": 0, "month": 0, "title": "big", "max": i64::MAX })),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "grid.setRaw",
            rec(json!({ "studentId": 1, "key": format!("s0-m0-c{}", i), "value": i64::MAX.to_string() })),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grid.setRaw",
        rec(json!({ "studentId": 1, "key": "midYear", "value": i64::MAX.to_string() })),
    );

    let all = request_ok(&mut stdin, &mut reader, "3", "calc.record", rec(json!({})));
    assert_eq!(all["students"][0]["semesters"][0]["months"][0]["dailyMax"], i64::MAX);
    assert_eq!(all["students"][0]["semesters"][0]["months"][0]["dailyTotal"], i64::MAX);
    let _ = request_ok(&mut stdin, &mut reader, "4", "reports.semesterTable", rec(json!({ "semester": 0 })));
    let entered = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grid.setGrade",
        rec(json!({ "studentId": 1, "key": "finalExam", "value": "7" })),
    );
    assert_eq!(entered["value"], 7);

    // The sidecar is still answering and the record is intact.
    let state = request_ok(&mut stdin, &mut reader, "6", "records.get", rec(json!({})));
    assert_eq!(state["state"]["students"][0]["grades"]["midYear"], i64::MAX);

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}
