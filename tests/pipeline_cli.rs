mod support;

use predicates::str::contains;
use support::{TestWorkspace, MONDAY, WEDNESDAY};

fn stdout_json(output: &std::process::Output) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn week_runs_initial_then_reconcile() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    let monday = ws.write_sheet(
        "monday.csv",
        &[
            "ELE-1,2024-03-01,2024-03-08,,false",
            "merc-2,2024-03-01,2024-03-08,,false",
            "ops-9,2024-03-01,2024-03-08,,false",
        ],
    )?;

    let output = ws
        .cmd()
        .args(["--json", "--now", MONDAY, "ingest"])
        .arg(&monday)
        .output()?;
    assert!(output.status.success());
    let body = stdout_json(&output)?;
    assert_eq!(body["command"], "ingest");
    assert_eq!(body["data"]["status_code"], 200);
    assert_eq!(body["data"]["mode"], "initial");
    assert_eq!(body["data"]["outcome"]["week"], 10);
    assert_eq!(body["data"]["outcome"]["unmatched_rows"], 1);
    assert_eq!(body["data"]["outcome"]["published"].as_array().map(Vec::len), Some(2));

    assert!(ws.object_exists("10_requested.csv"));
    assert!(ws.object_exists("10_ele_report.csv"));
    assert!(ws.object_exists("10_merc_report.csv"));
    assert!(!ws.object_exists("inbox/monday.csv"));

    let outbox = ws.outbox()?;
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[0]["to"], "ele@example.com");
    assert_eq!(outbox[0]["from"], "reports@example.com");
    assert_eq!(outbox[0]["subject"], "CSV Report 10_ele_report.csv");

    let wednesday = ws.write_sheet("wednesday.csv", &["ELE-1,2024-03-01,2024-03-08,,false"])?;
    ws.cmd()
        .args(["--now", WEDNESDAY, "ingest"])
        .arg(&wednesday)
        .assert()
        .success()
        .stdout(contains("actweek ingest: week 10 week reconciled"))
        .stdout(contains("10_merc_incomplete.csv -> merc@example.com (1 rows)"));

    assert!(ws.object_exists("10_completed.csv"));
    assert!(ws.object_exists("10_merc_incomplete.csv"));
    assert!(!ws.object_exists("10_ele_incomplete.csv"));
    assert_eq!(
        ws.read_object("10_merc_incomplete.csv")?,
        format!("{}\nmerc-2,2024-03-01,2024-03-08,,false\n", support::HEADER)
    );

    let outbox = ws.outbox()?;
    assert_eq!(outbox.len(), 3);
    assert_eq!(outbox[2]["to"], "merc@example.com");
    assert!(outbox[2]["text"]
        .as_str()
        .unwrap_or_default()
        .contains("There are 1 actions"));

    ws.cmd()
        .args(["--now", WEDNESDAY, "week"])
        .assert()
        .success()
        .stdout(contains("actweek week: week 10 reconciled"));
    Ok(())
}

#[test]
fn third_sheet_is_blocked() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    for name in ["a.csv", "b.csv"] {
        let sheet = ws.write_sheet(name, &[])?;
        ws.cmd().args(["--now", MONDAY, "ingest"]).arg(&sheet).assert().success();
    }

    let sheet = ws.write_sheet("c.csv", &[])?;
    ws.cmd()
        .args(["--json", "--now", WEDNESDAY, "ingest"])
        .arg(&sheet)
        .assert()
        .code(3)
        .stdout(contains("\"status_code\": 409"))
        .stdout(contains("\"kind\": \"blocked\""));
    assert!(ws.object_exists("inbox/c.csv"));
    Ok(())
}

#[test]
fn reconciled_week_number_reopens_next_year() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    for (name, now) in [("a.csv", MONDAY), ("b.csv", WEDNESDAY)] {
        let sheet = ws.write_sheet(name, &[])?;
        ws.cmd().args(["--now", now, "ingest"]).arg(&sheet).assert().success();
    }

    let sheet = ws.write_sheet("next.csv", &["ele-4,2025-02-28,2025-03-07,,false"])?;
    ws.cmd()
        .args(["--now", "2025-03-03T09:00:00Z", "ingest"])
        .arg(&sheet)
        .assert()
        .success()
        .stdout(contains("actweek ingest: week 10 requested sheet reported"))
        .stdout(contains("10_ele_report.csv -> ele@example.com (1 rows)"));

    assert!(!ws.object_exists("inbox/next.csv"));
    assert!(ws.read_object("10_requested.csv")?.contains("ele-4,2025-02-28"));
    ws.cmd()
        .args(["--now", "2025-03-03T09:00:00Z", "week"])
        .assert()
        .success()
        .stdout(contains("actweek week: week 10 initial_received"))
        .stdout(contains("- year: 2025"));
    Ok(())
}

#[test]
fn empty_requested_sheet_sends_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    let sheet = ws.write_sheet("monday.csv", &[])?;
    ws.cmd()
        .args(["--now", MONDAY, "ingest"])
        .arg(&sheet)
        .assert()
        .success()
        .stdout(contains("ele: nothing to report"));

    assert!(ws.object_exists("10_requested.csv"));
    assert!(!ws.object_exists("10_ele_report.csv"));
    assert!(ws.outbox()?.is_empty());
    Ok(())
}

#[test]
fn invalid_sheet_is_rejected_before_archiving() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    let sheet = ws.write_file("bad.csv", "owner,due date\nele,2024-03-08\n")?;
    ws.cmd()
        .args(["--json", "--now", MONDAY, "ingest"])
        .arg(&sheet)
        .assert()
        .code(2)
        .stdout(contains("\"status_code\": 400"))
        .stdout(contains("create date"));

    assert!(ws.object_exists("inbox/bad.csv"));
    assert!(!ws.object_exists("10_requested.csv"));
    assert!(!ws.object_exists("10_state.json"));
    Ok(())
}

#[test]
fn missing_secret_fails_before_processing() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    let sheet = ws.write_sheet("monday.csv", &["ele,2024-03-01,2024-03-08,,false"])?;
    ws.cmd()
        .env_remove("ACTWEEK_MERC_EMAIL")
        .args(["--now", MONDAY, "ingest"])
        .arg(&sheet)
        .assert()
        .code(4)
        .stderr(contains("ACTWEEK_MERC_EMAIL"));

    assert!(!ws.object_exists("10_requested.csv"));
    assert!(ws.outbox()?.is_empty());
    Ok(())
}

#[test]
fn handle_reads_payload_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    ws.write_file(
        ".actweek/store/actions/inbox/Week 10.csv",
        &format!("{}\nmerc,2024-03-01,2024-03-08,,false\n", support::HEADER),
    )?;
    let payload = r#"{"Records":[{"s3":{"bucket":{"name":"actions"},"object":{"key":"inbox/Week+10.csv"}}}]}"#;

    ws.cmd()
        .args(["--json", "--now", MONDAY, "handle", "--event", "-"])
        .write_stdin(payload)
        .assert()
        .success()
        .stdout(contains("Successfully processed and emailed requested CSV files."));

    assert!(ws.object_exists("10_merc_report.csv"));
    assert!(!ws.object_exists("inbox/Week 10.csv"));

    let foreign = r#"{"Records":[{"s3":{"bucket":{"name":"other"},"object":{"key":"inbox/x.csv"}}}]}"#;
    ws.cmd()
        .args(["--json", "--now", MONDAY, "handle"])
        .write_stdin(foreign)
        .assert()
        .code(2)
        .stdout(contains("\"status_code\": 400"));
    Ok(())
}

#[test]
fn events_are_written_as_jsonl() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    let sheet = ws.write_sheet(
        "monday.csv",
        &["ele,2024-03-01,2024-03-08,,false", "ops,2024-03-01,2024-03-08,,false"],
    )?;
    ws.cmd()
        .args(["--events", "events.jsonl", "--now", MONDAY, "ingest"])
        .arg(&sheet)
        .assert()
        .success();

    let content = std::fs::read_to_string(ws.path().join("events.jsonl"))?;
    let kinds: Vec<String> = content
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|event| event["event"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "snapshot_archived",
            "owners_unmatched",
            "report_published",
            "notification_sent"
        ]
    );
    Ok(())
}

#[test]
fn watch_once_drains_the_inbox() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    ws.write_file(
        ".actweek/store/actions/inbox/a.csv",
        &format!("{}\nele,2024-03-01,2024-03-08,,false\n", support::HEADER),
    )?;
    ws.write_file(".actweek/store/actions/inbox/notes.txt", "not a sheet")?;

    ws.cmd()
        .args(["--now", MONDAY, "watch", "--once"])
        .assert()
        .success()
        .stdout(contains("actweek watch: week 10 requested sheet reported"));

    assert!(ws.object_exists("10_ele_report.csv"));
    assert!(ws.object_exists("inbox/notes.txt"));
    Ok(())
}
