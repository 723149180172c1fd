use actweek::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let blocked = Error::WeekClosed {
        week: 10,
        phase: "reconciled".to_string(),
    };
    assert_eq!(blocked.exit_code(), exit_codes::BLOCKED);

    let op = Error::OperationFailed("boom".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn status_codes_follow_error_class() {
    assert_eq!(Error::MissingColumn("owner".to_string()).status_code(), 400);
    assert_eq!(Error::InvalidEvent("no records".to_string()).status_code(), 400);
    assert_eq!(Error::ObjectNotFound("inbox/a.csv".to_string()).status_code(), 404);
    assert_eq!(Error::Conflict("10_state.json".to_string()).status_code(), 409);
    assert_eq!(Error::Notify("down".to_string()).status_code(), 500);

    let missing = Error::MissingSnapshot {
        week: 10,
        key: "10_requested.csv".to_string(),
    };
    assert_eq!(missing.status_code(), 500);
    assert_eq!(missing.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::InvalidRow {
        line: 4,
        column: "due date".to_string(),
        value: "soon".to_string(),
    };
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("line 4"));
    let details = json.details.expect("details");
    assert_eq!(details["column"], "due date");
}
