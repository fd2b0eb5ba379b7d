//! # Attendance API Types
//!
//! Wire types shared by the kiosk endpoints and the kiosk terminal client.

use crate::db::models::{Schedule, Student};
use serde::{Deserialize, Serialize};

/// What a scan did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceAction {
    /// First scan for the class: a session was opened
    Entry,
    /// Second scan: the open session was closed
    Exit,
    /// The student already entered and left; nothing changed
    AlreadyCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub id: String,
    pub title: String,
    pub location: String,
    pub starts_at: String,
    pub ends_at: String,
}

impl From<Schedule> for ScheduleSummary {
    fn from(schedule: Schedule) -> Self {
        Self {
            id: schedule.id,
            title: schedule.title,
            location: schedule.location,
            starts_at: schedule.starts_at,
            ends_at: schedule.ends_at,
        }
    }
}

/// Result of a scan, whichever path authenticated the student
///
/// ## Example JSON
/// ```json
/// {
///   "student": { "id": "5f0c…", "name": "Ada Lovelace" },
///   "action": "ENTRY",
///   "schedule": { "id": "…", "title": "Algebra", "location": "Room 101",
///                 "startsAt": "2024-09-02T09:00:00.000Z", "endsAt": "2024-09-02T10:00:00.000Z" },
///   "timestamp": "2024-09-02T08:57:12.345Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub student: StudentSummary,
    pub action: AttendanceAction,
    pub schedule: ScheduleSummary,
    pub timestamp: String,
}

/// Weak-path scan: the typed code alone
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanRequest {
    pub passkey: String,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleQuery {
    pub location: String,
}

/// Banner payload; `schedule` is null when nothing is on at the location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSchedule {
    pub schedule: Option<ScheduleSummary>,
}

/// A student whose identity a kiosk path has established
///
/// Both the typed-code path and the biometric path end here, and the toggle
/// engine accepts nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedStudent {
    pub id: String,
    pub name: String,
}

impl From<Student> for AuthenticatedStudent {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
        }
    }
}

impl From<&AuthenticatedStudent> for StudentSummary {
    fn from(student: &AuthenticatedStudent) -> Self {
        Self {
            id: student.id.clone(),
            name: student.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_string(&AttendanceAction::Entry).unwrap(), "\"ENTRY\"");
        assert_eq!(serde_json::to_string(&AttendanceAction::Exit).unwrap(), "\"EXIT\"");
        assert_eq!(
            serde_json::to_string(&AttendanceAction::AlreadyCompleted).unwrap(),
            "\"ALREADY_COMPLETED\""
        );
    }

    #[test]
    fn test_schedule_summary_uses_camel_case() {
        let summary = ScheduleSummary {
            id: "s1".into(),
            title: "Algebra".into(),
            location: "Room 101".into(),
            starts_at: "2024-09-02T09:00:00.000Z".into(),
            ends_at: "2024-09-02T10:00:00.000Z".into(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["startsAt"], "2024-09-02T09:00:00.000Z");
        assert_eq!(json["endsAt"], "2024-09-02T10:00:00.000Z");
        assert!(json.get("starts_at").is_none());
    }
}
