use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TallyError, TallyResult};

pub const MAX_TITLE_CHARS: usize = 200;
/// Leading hex digits of the id shown in listings.
pub const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub completed: bool,

    pub created_date: NaiveDate,
}

impl Task {
    pub fn new(title: String, today: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            completed: false,
            created_date: today,
        }
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..SHORT_ID_LEN].to_string()
    }
}

/// Trims `raw` and checks it is a storable title.
pub fn validate_title(raw: &str) -> TallyResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(TallyError::Validation(
            "Please enter a task before adding.".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(TallyError::Validation(format!(
            "Task description is too long. Please keep it under {MAX_TITLE_CHARS} characters."
        )));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{MAX_TITLE_CHARS, Task, validate_title};

    #[test]
    fn title_bounds() {
        assert!(validate_title("").is_err());
        assert!(validate_title(" \t ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_CHARS + 1)).is_err());
        assert_eq!(
            validate_title(&"x".repeat(MAX_TITLE_CHARS)).expect("200 chars is allowed"),
            "x".repeat(MAX_TITLE_CHARS)
        );
        assert_eq!(validate_title("  buy milk ").expect("trimmed"), "buy milk");
        // length is counted in characters, not bytes
        assert!(validate_title(&"é".repeat(MAX_TITLE_CHARS)).is_ok());
    }

    #[test]
    fn persisted_shape_uses_created_date_key() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid day");
        let task = Task::new("write tests".to_string(), day);
        let value = serde_json::to_value(&task).expect("serialize task");

        assert_eq!(value["title"], "write tests");
        assert_eq!(value["completed"], false);
        assert_eq!(value["createdDate"], "2024-01-15");
    }

    #[test]
    fn legacy_records_without_id_or_flag_load() {
        let raw = r#"{"title":"old","createdDate":"2023-12-31"}"#;
        let task: Task = serde_json::from_str(raw).expect("legacy record");
        assert_eq!(task.title, "old");
        assert!(!task.completed);
        assert!(!task.id.is_nil());
    }
}
