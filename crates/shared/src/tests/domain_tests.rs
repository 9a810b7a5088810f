use super::*;

#[test]
fn weekday_parses_full_names_and_abbreviations() {
    assert_eq!("Monday".parse::<Weekday>().expect("day"), Weekday::Monday);
    assert_eq!("wed".parse::<Weekday>().expect("day"), Weekday::Wednesday);
    assert_eq!(" FRIDAY ".parse::<Weekday>().expect("day"), Weekday::Friday);
    let err = "Someday".parse::<Weekday>().expect_err("unknown day");
    assert_eq!(err, UnknownWeekday("Someday".into()));
    assert_eq!(err.to_string(), "unknown day 'Someday'");
}

#[test]
fn weekday_serializes_as_full_name() {
    let json = serde_json::to_string(&Weekday::Thursday).expect("json");
    assert_eq!(json, "\"Thursday\"");
    let parsed: Weekday = serde_json::from_str("\"tue\"").expect("parse");
    assert_eq!(parsed, Weekday::Tuesday);
}

#[test]
fn weekday_ordering_follows_the_calendar() {
    let mut days = vec![Weekday::Friday, Weekday::Monday, Weekday::Wednesday];
    days.sort();
    assert_eq!(days, vec![Weekday::Monday, Weekday::Wednesday, Weekday::Friday]);
}

#[test]
fn entry_update_distinguishes_null_batch_from_missing_batch() {
    let clear: EntryUpdate = serde_json::from_str(r#"{"batch": null}"#).expect("clear");
    assert_eq!(clear.batch, Some(None));
    assert!(!clear.is_empty());

    let untouched: EntryUpdate = serde_json::from_str(r#"{"faculty": "Dr. X"}"#).expect("faculty");
    assert_eq!(untouched.batch, None);
    assert_eq!(untouched.faculty.as_deref(), Some("Dr. X"));

    let empty: EntryUpdate = serde_json::from_str("{}").expect("empty");
    assert!(empty.is_empty());
}

#[test]
fn free_sentinel_marks_unoccupied_entries() {
    let entry = ScheduleEntry {
        id: EntryId(1),
        location: "Lab A".into(),
        day: Weekday::Monday,
        time_slot: "9-10".into(),
        faculty: FREE_FACULTY.into(),
        batch: None,
        capacity: 30,
    };
    assert!(entry.is_free());
    assert_eq!(entry.fields().location, "Lab A");
}
