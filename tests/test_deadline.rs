use std::time::{Duration, SystemTime, UNIX_EPOCH};

use task_manager::{
    create_deadline, deadline_is_expired, deadline_to_timeout, Deadline, SystemClock,
};

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

#[test]
fn test_create_default_deadline() {
    assert_eq!(create_deadline(None, None, &SystemClock), None);
}

#[test]
fn test_create_deadline_from_deadline() {
    assert_eq!(
        create_deadline(None, Some(at(1)), &SystemClock),
        Some(Deadline::at(at(1)))
    );
}

#[test]
fn test_create_deadline_from_timeout() {
    assert_eq!(
        create_deadline(Some(secs(1)), None, &|| at(0)),
        Some(Deadline::at(at(1)))
    );
}

#[test]
fn test_create_deadline_minimum_from_deadline_and_timeout() {
    assert_eq!(
        create_deadline(Some(secs(30)), Some(at(10)), &|| at(0)),
        Some(Deadline::at(at(10)))
    );
    assert_eq!(
        create_deadline(Some(secs(10)), Some(at(30)), &|| at(0)),
        Some(Deadline::at(at(10)))
    );
}

#[test]
fn test_unrepresentable_timeout_counts_as_absent() {
    assert_eq!(create_deadline(Some(Duration::MAX), None, &|| at(0)), None);
    assert_eq!(
        create_deadline(Some(Duration::MAX), Some(at(5)), &|| at(0)),
        Some(Deadline::at(at(5)))
    );
}

#[test]
fn test_deadline_is_expired() {
    assert!(deadline_is_expired(&Deadline::at(at(0)), &|| at(1)));
    assert!(deadline_is_expired(&Deadline::at(at(1)), &|| at(1)));
    assert!(!deadline_is_expired(&Deadline::at(at(1)), &|| at(0)));
    assert!(!deadline_is_expired(&Deadline::at(at(2)), &|| at(1)));
}

#[test]
fn test_deadline_to_timeout() {
    assert_eq!(deadline_to_timeout(&Deadline::at(at(1)), &|| at(0)), secs(1));
    assert_eq!(deadline_to_timeout(&Deadline::at(at(30)), &|| at(10)), secs(20));
    // Past deadlines saturate at zero.
    assert_eq!(
        deadline_to_timeout(&Deadline::at(at(10)), &|| at(30)),
        Duration::ZERO
    );
}

#[test]
fn test_deadline_methods_match_free_functions() {
    let deadline = Deadline::create(Some(secs(5)), None, &|| at(100)).unwrap();
    assert_eq!(deadline.instant(), at(105));
    assert!(!deadline.is_expired(&|| at(104)));
    assert!(deadline.is_expired(&|| at(105)));
    assert_eq!(deadline.to_timeout(&|| at(101)), secs(4));
}
