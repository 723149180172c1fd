mod support;

use predicates::str::contains;
use support::{TestWorkspace, HEADER, MONDAY};

#[test]
fn diff_lists_rows_missing_from_completed() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::bare()?;
    let requested = ws.write_sheet(
        "requested.csv",
        &["ele,2024-03-01,2024-03-08,,false", "merc,2024-03-02,2024-03-09,,false"],
    )?;
    // Same row with reordered columns and another date spelling still matches.
    let completed = ws.write_file(
        "completed.csv",
        "complete,owner,due date,create date,date completed\nfalse,ele,03/08/2024,2024-03-01,\n",
    )?;

    ws.cmd()
        .arg("diff")
        .arg(&requested)
        .arg(&completed)
        .args(["--out", "open.csv"])
        .assert()
        .success()
        .stdout(contains("actweek diff: 1 of 2 requested rows incomplete"))
        .stdout(contains("line 3: merc due 2024-03-09"));

    let written = std::fs::read_to_string(ws.path().join("open.csv"))?;
    assert_eq!(written, format!("{HEADER}\nmerc,2024-03-02,2024-03-09,,false\n"));
    Ok(())
}

#[test]
fn diff_rejects_mismatched_columns() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::bare()?;
    let requested = ws.write_sheet("requested.csv", &["ele,2024-03-01,2024-03-08,,false"])?;
    let completed = ws.write_file(
        "completed.csv",
        &format!("{HEADER},notes\nele,2024-03-01,2024-03-08,,false,late\n"),
    )?;

    ws.cmd()
        .args(["--json", "diff"])
        .arg(&requested)
        .arg(&completed)
        .assert()
        .code(2)
        .stdout(contains("only in completed: [notes]"));
    Ok(())
}

#[test]
fn report_counts_open_and_completed() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::bare()?;
    let sheet = ws.write_sheet(
        "sheet.csv",
        &[
            "ele,2024-02-20,2024-03-01,,false",
            "merc,2024-02-20,2024-03-10,2024-02-28,true",
            "ele,2024-03-01,2024-03-20,,false",
        ],
    )?;

    let output = ws
        .cmd()
        .args(["--json", "--now", MONDAY, "report"])
        .arg(&sheet)
        .args(["--out", "enriched.csv"])
        .output()?;
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let summary = &body["data"]["summary"];
    assert_eq!(summary["week"], 10);
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["open"], 2);
    assert_eq!(summary["overdue"], 1);
    assert_eq!(summary["completed"], 1);
    assert_eq!(summary["completed_last_week"], 1);
    assert_eq!(body["data"]["rows"][0]["days_open"], 13);
    assert_eq!(body["data"]["rows"][1]["days_since_complete"], 5);

    let enriched = std::fs::read_to_string(ws.path().join("enriched.csv"))?;
    let header = enriched.lines().next().unwrap_or_default();
    assert!(header.ends_with("days_open,past_due,week_created,week_completed,days_since_complete"));
    Ok(())
}

#[test]
fn split_writes_open_rows_per_owner() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new()?;
    let sheet = ws.write_sheet(
        "sheet.csv",
        &[
            "ELE-1,2024-03-01,2024-03-08,,false",
            "merc-2,2024-03-01,2024-03-08,2024-03-05,true",
            "ops,2024-03-01,2024-03-08,,false",
        ],
    )?;

    ws.cmd()
        .arg("split")
        .arg(&sheet)
        .args(["--out", "split"])
        .assert()
        .success()
        .stdout(contains("actweek split: 2 open rows across 1 owners"))
        .stdout(contains("1 open row(s) with unrecognized owners: ops"));

    let ele = std::fs::read_to_string(ws.path().join("split").join("ele_open.csv"))?;
    assert_eq!(ele, format!("{HEADER}\nELE-1,2024-03-01,2024-03-08,,false\n"));
    assert!(!ws.path().join("split").join("merc_open.csv").exists());
    Ok(())
}
