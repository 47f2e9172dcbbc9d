use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AppError;

/// Lifecycle of a task. Stored and rendered by its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    Open,
    ToDo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Open,
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::Done,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Open => "Open",
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    pub fn is_active_work(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct UnknownStatus(pub String);

impl From<UnknownStatus> for AppError {
    fn from(value: UnknownStatus) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    /// Case-insensitive; spaces, underscores and hyphens are ignored, so
    /// "In Progress", "in_progress" and "INPROGRESS" are the same value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match key.as_str() {
            "open" => Ok(TaskStatus::Open),
            "todo" => Ok(TaskStatus::ToDo),
            "inprogress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_normalises_case_and_separators() {
        for raw in ["In Progress", "InProgress", "in_progress", "IN-PROGRESS", " in progress "] {
            assert_eq!(raw.parse::<TaskStatus>(), Ok(TaskStatus::InProgress), "{raw}");
        }
        assert_eq!("to do".parse::<TaskStatus>(), Ok(TaskStatus::ToDo));
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert!("Blocked".parse::<TaskStatus>().is_err());
        assert!("".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn labels_round_trip_through_storage_form() {
        for status in TaskStatus::ALL {
            assert_eq!(status.label().parse::<TaskStatus>(), Ok(status));
        }
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::InProgress.is_active_work());
        assert!(!TaskStatus::Open.is_active_work());
    }

    #[test]
    fn json_uses_display_labels() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(parsed, TaskStatus::Done);
    }
}
