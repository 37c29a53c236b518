mod test_support;

use serde_json::json;
use test_support::{request, request_err, request_ok, send_line, spawn_sidecar, temp_dir};

#[test]
fn router_handles_health_bad_json_and_unknown_methods() {
    let workspace = temp_dir("gradebook-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    assert!(health["workspacePath"].is_null());

    let bad = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(bad["ok"], false);
    assert_eq!(bad["error"]["code"], "bad_json");

    let unknown = request(&mut stdin, &mut reader, "2", "nope.nothing", json!({}));
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["error"]["code"], "not_implemented");

    assert_eq!(
        request_err(&mut stdin, &mut reader, "3", "records.list", json!({ "teacherId": "t1" })),
        "no_workspace"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "4", "workspace.select", json!({})),
        "bad_params"
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("gradebook.sqlite3").is_file());

    // Every record-scoped family refuses to act on a record that is not open.
    let scoped = json!({ "teacherId": "t1", "recordKey": "5th_A" });
    for (i, method) in [
        "records.get",
        "students.add",
        "columns.copyFirstMonthToAll",
        "calc.record",
        "reports.pages",
    ]
    .iter()
    .enumerate()
    {
        let code = request_err(&mut stdin, &mut reader, &format!("s{}", i), method, scoped.clone());
        assert_eq!(code, "not_found", "{}", method);
    }

    assert_eq!(
        request_err(&mut stdin, &mut reader, "6", "records.get", json!({ "teacherId": "t1" })),
        "bad_params"
    );

    let _ = child.kill();
    let _ = std::fs::remove_dir_all(workspace);
}
