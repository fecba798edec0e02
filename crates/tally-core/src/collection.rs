use chrono::NaiveDate;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{TallyError, TallyResult};
use crate::sync::RemoteTodo;
use crate::task::{Task, validate_title};

/// Ordered task list. Titles double as lookup keys for the title-based
/// operations, so two tasks with the same title are only distinguishable by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCollection {
    tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Builds a collection from a remote payload. Every entry is stamped
    /// with `today`; entries without a non-empty string title are dropped.
    pub fn from_remote(todos: Vec<RemoteTodo>, today: NaiveDate) -> Self {
        let tasks = todos
            .into_iter()
            .filter_map(|todo| {
                let title = todo.title.filter(|title| !title.is_empty())?;
                let mut task = Task::new(title, today);
                task.completed = todo.completed;
                Some(task)
            })
            .collect();
        Self { tasks }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[instrument(skip(self, raw_title, today), fields(title_len = raw_title.len()))]
    pub fn add(&mut self, raw_title: &str, today: NaiveDate) -> TallyResult<&Task> {
        let title = validate_title(raw_title)?;
        self.tasks.push(Task::new(title, today));
        debug!(count = self.tasks.len(), "task appended");
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Flips the first task titled exactly `title`. Returns the new flag, or
    /// `None` when nothing matched.
    #[instrument(skip(self))]
    pub fn toggle(&mut self, title: &str) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|task| task.title == title)?;
        task.completed = !task.completed;
        Some(task.completed)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn toggle_id(&mut self, id: Uuid) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        task.completed = !task.completed;
        Some(task.completed)
    }

    /// Drops every task titled exactly `title`.
    #[instrument(skip(self))]
    pub fn remove(&mut self, title: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.title != title);
        before - self.tasks.len()
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn remove_id(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        before != self.tasks.len()
    }

    /// Finds the task whose id starts with `prefix`. Accepts the short id
    /// from listings or a full id, with or without hyphens.
    pub fn resolve_id(&self, prefix: &str) -> TallyResult<Uuid> {
        let needle: String = prefix
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if needle.is_empty() {
            return Err(TallyError::Validation("Please give a todo id.".to_string()));
        }

        let mut matches = self
            .tasks
            .iter()
            .filter(|task| task.id.simple().to_string().starts_with(&needle));
        let Some(first) = matches.next() else {
            return Err(TallyError::Validation(format!("No todo with id {prefix}.")));
        };
        if matches.next().is_some() {
            return Err(TallyError::Validation(format!(
                "Id {prefix} matches more than one todo."
            )));
        }
        Ok(first.id)
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::TaskCollection;
    use crate::error::TallyError;
    use crate::sync::RemoteTodo;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).expect("valid day")
    }

    #[test]
    fn add_appends_pending_task_dated_today() {
        let mut tasks = TaskCollection::new();
        tasks.add("first", today()).expect("add first");
        let added = tasks.add("  second  ", today()).expect("add second").clone();

        assert_eq!(tasks.len(), 2);
        assert_eq!(added.title, "second");
        assert!(!added.completed);
        assert_eq!(added.created_date, today());
        assert_eq!(tasks.tasks()[0].title, "first");
    }

    #[test]
    fn invalid_titles_leave_collection_untouched() {
        let mut tasks = TaskCollection::new();
        tasks.add("keep", today()).expect("add keep");

        let too_long = "a".repeat(201);
        for bad in ["", " ", too_long.as_str()] {
            let err = tasks.add(bad, today()).expect_err("should reject");
            assert!(matches!(err, TallyError::Validation(_)));
        }
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn toggle_hits_first_match_and_round_trips() {
        let mut tasks = TaskCollection::new();
        tasks.add("dup", today()).expect("add");
        tasks.add("dup", today()).expect("add");

        assert_eq!(tasks.toggle("dup"), Some(true));
        assert!(tasks.tasks()[0].completed);
        assert!(!tasks.tasks()[1].completed);

        assert_eq!(tasks.toggle("dup"), Some(false));
        assert!(!tasks.tasks()[0].completed);

        assert_eq!(tasks.toggle("missing"), None);
    }

    #[test]
    fn remove_drops_all_exact_matches() {
        let mut tasks = TaskCollection::new();
        for title in ["a", "b", "a", "A"] {
            tasks.add(title, today()).expect("add");
        }

        assert_eq!(tasks.remove("a"), 2);
        let titles: Vec<&str> = tasks.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "A"]);

        let snapshot = tasks.clone();
        assert_eq!(tasks.remove("zzz"), 0);
        assert_eq!(tasks, snapshot);
    }

    #[test]
    fn id_operations_separate_duplicate_titles() {
        let mut tasks = TaskCollection::new();
        tasks.add("dup", today()).expect("add");
        let second = tasks.add("dup", today()).expect("add").id;

        assert_eq!(tasks.toggle_id(second), Some(true));
        assert!(!tasks.tasks()[0].completed);
        assert!(tasks.tasks()[1].completed);

        assert!(tasks.remove_id(second));
        assert!(!tasks.remove_id(second));
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn ids_resolve_from_unique_prefixes() {
        let mut tasks = TaskCollection::new();
        let first = tasks.add("one", today()).expect("add").clone();
        let second = tasks.add("two", today()).expect("add").clone();

        assert_eq!(tasks.resolve_id(&first.short_id()), Ok(first.id));
        assert_eq!(
            tasks.resolve_id(&second.id.to_string().to_uppercase()),
            Ok(second.id)
        );
        assert!(matches!(
            tasks.resolve_id(""),
            Err(TallyError::Validation(_))
        ));
        assert!(matches!(
            tasks.resolve_id("zz"),
            Err(TallyError::Validation(_))
        ));

        let mut same_prefix = TaskCollection::new();
        same_prefix.add("a", today()).expect("add");
        same_prefix.add("b", today()).expect("add");
        let shared = same_prefix.tasks()[0].id.simple().to_string();
        let mut twins = same_prefix.into_tasks();
        twins[1].id = uuid::Uuid::parse_str(&format!("{}ffffffffffff", &shared[..20]))
            .expect("valid uuid");
        let twins = TaskCollection::from_tasks(twins);
        assert!(twins.resolve_id(&shared[..8]).is_err());
        assert_eq!(twins.resolve_id(&shared), Ok(twins.tasks()[0].id));
    }

    #[test]
    fn remote_payload_is_restamped_and_filtered() {
        let payload = serde_json::json!([
            {"userId": 1, "id": 1, "title": "delectus aut autem", "completed": false},
            {"id": 2, "title": "quis ut nam", "completed": true, "createdDate": "1999-01-01"},
            {"id": 3, "title": ""},
            {"id": 4, "title": 42, "completed": true},
            {"id": 5, "title": "no flag"}
        ]);
        let todos = payload
            .as_array()
            .expect("array payload")
            .iter()
            .map(RemoteTodo::from_value)
            .collect();

        let tasks = TaskCollection::from_remote(todos, today());
        let summary: Vec<(&str, bool)> = tasks
            .tasks()
            .iter()
            .map(|t| (t.title.as_str(), t.completed))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("delectus aut autem", false),
                ("quis ut nam", true),
                ("no flag", false)
            ]
        );
        assert!(tasks.tasks().iter().all(|t| t.created_date == today()));
    }
}
