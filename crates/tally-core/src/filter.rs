use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{
  debug,
  trace
};

use crate::task::Task;

/// Active search criteria. An empty set
/// matches every task.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Criteria {
  query: Option<String>,
  from:  Option<NaiveDate>,
  to:    Option<NaiveDate>
}

impl Criteria {
  pub fn text(query: &str) -> Self {
    let mut criteria = Self::default();
    criteria.set_query(query);
    criteria
  }

  pub fn dates(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>
  ) -> Self {
    Self {
      query: None,
      from,
      to
    }
  }

  pub fn query(&self) -> Option<&str> {
    self.query.as_deref()
  }

  pub fn from_day(
    &self
  ) -> Option<NaiveDate> {
    self.from
  }

  pub fn to_day(
    &self
  ) -> Option<NaiveDate> {
    self.to
  }

  pub fn is_empty(&self) -> bool {
    self.query.is_none()
      && self.from.is_none()
      && self.to.is_none()
  }

  fn set_query(&mut self, raw: &str) {
    let normalized =
      raw.trim().to_lowercase();
    self.query = if normalized.is_empty()
    {
      None
    } else {
      Some(normalized)
    };
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    if let Some(query) = &self.query
      && !task
        .title
        .to_lowercase()
        .contains(query.as_str())
    {
      return false;
    }

    if let Some(from) = self.from
      && task.created_date < from
    {
      return false;
    }

    if let Some(to) = self.to
      && task.created_date > to
    {
      return false;
    }

    true
  }
}

/// Recomputes the visible subset,
/// preserving collection order.
#[tracing::instrument(skip(
  tasks, criteria
), fields(total = tasks.len()))]
pub fn filter_tasks<'a>(
  tasks: &'a [Task],
  criteria: &Criteria
) -> Vec<&'a Task> {
  if criteria.is_empty() {
    return tasks.iter().collect();
  }

  let visible: Vec<&Task> = tasks
    .iter()
    .filter(|task| criteria.matches(task))
    .collect();
  trace!(
    visible = visible.len(),
    "filtered tasks"
  );
  visible
}

/// How a new search interacts with the
/// criteria already in place.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum ComposeMode {
  /// A text search drops any date
  /// range and vice versa.
  #[default]
  LastWins,
  /// Text and date criteria both apply.
  Intersect
}

impl FromStr for ComposeMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "last" | "last-wins"
      | "lastwins" => Ok(Self::LastWins),
      | "intersect" | "and" | "both" => {
        Ok(Self::Intersect)
      }
      | other => {
        Err(anyhow!(
          "invalid filter.compose \
           setting: {other}"
        ))
      }
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct FilterState {
  mode:     ComposeMode,
  criteria: Criteria
}

impl FilterState {
  pub fn new(mode: ComposeMode) -> Self {
    Self {
      mode,
      criteria: Criteria::default()
    }
  }

  pub fn mode(&self) -> ComposeMode {
    self.mode
  }

  pub fn criteria(&self) -> &Criteria {
    &self.criteria
  }

  #[tracing::instrument(skip(self))]
  pub fn search(&mut self, query: &str) {
    match self.mode {
      | ComposeMode::LastWins => {
        self.criteria =
          Criteria::text(query);
      }
      | ComposeMode::Intersect => {
        self.criteria.set_query(query);
      }
    }
    debug!(criteria = ?self.criteria, "text filter applied");
  }

  #[tracing::instrument(skip(self))]
  pub fn date_range(
    &mut self,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>
  ) {
    match self.mode {
      | ComposeMode::LastWins => {
        self.criteria =
          Criteria::dates(from, to);
      }
      | ComposeMode::Intersect => {
        self.criteria.from = from;
        self.criteria.to = to;
      }
    }
    debug!(criteria = ?self.criteria, "date filter applied");
  }

  /// Moves the lower bound and keeps the
  /// upper one in place.
  pub fn set_from(
    &mut self,
    from: Option<NaiveDate>
  ) {
    let to = self.criteria.to;
    self.date_range(from, to);
  }

  /// Moves the upper bound and keeps the
  /// lower one in place.
  pub fn set_to(
    &mut self,
    to: Option<NaiveDate>
  ) {
    let from = self.criteria.from;
    self.date_range(from, to);
  }

  pub fn clear(&mut self) {
    self.criteria = Criteria::default();
  }

  pub fn apply<'a>(
    &self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    filter_tasks(tasks, &self.criteria)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    ComposeMode,
    Criteria,
    FilterState,
    filter_tasks
  };
  use crate::task::Task;

  fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(
      s, "%Y-%m-%d"
    )
    .expect("valid day")
  }

  fn sample() -> Vec<Task> {
    vec![
      Task::new(
        "Buy ABC batteries".to_string(),
        day("2024-01-15")
      ),
      Task::new(
        "call mom".to_string(),
        day("2024-02-10")
      ),
      Task::new(
        "abc lesson".to_string(),
        day("2024-03-01")
      ),
    ]
  }

  fn titles(
    view: &[&Task]
  ) -> Vec<String> {
    view
      .iter()
      .map(|task| task.title.clone())
      .collect()
  }

  #[test]
  fn empty_criteria_keep_everything_in_order()
   {
    let tasks = sample();
    let view = filter_tasks(
      &tasks,
      &Criteria::text("   ")
    );
    assert_eq!(
      titles(&view),
      titles(
        &tasks.iter().collect::<Vec<_>>()
      )
    );
  }

  #[test]
  fn text_match_ignores_case() {
    let tasks = sample();
    for query in ["ABC", "abc", "aBc"] {
      let view = filter_tasks(
        &tasks,
        &Criteria::text(query)
      );
      assert_eq!(
        titles(&view),
        vec![
          "Buy ABC batteries",
          "abc lesson"
        ]
      );
    }
  }

  #[test]
  fn date_bounds_are_inclusive() {
    let tasks = sample();
    let january = filter_tasks(
      &tasks,
      &Criteria::dates(
        Some(day("2024-01-01")),
        Some(day("2024-01-31"))
      )
    );
    assert_eq!(
      titles(&january),
      vec!["Buy ABC batteries"]
    );

    let from_feb = filter_tasks(
      &tasks,
      &Criteria::dates(
        Some(day("2024-02-01")),
        None
      )
    );
    assert_eq!(
      titles(&from_feb),
      vec!["call mom", "abc lesson"]
    );

    let exact = filter_tasks(
      &tasks,
      &Criteria::dates(
        Some(day("2024-02-10")),
        Some(day("2024-02-10"))
      )
    );
    assert_eq!(
      titles(&exact),
      vec!["call mom"]
    );

    let until = filter_tasks(
      &tasks,
      &Criteria::dates(
        None,
        Some(day("2024-02-10"))
      )
    );
    assert_eq!(until.len(), 2);
  }

  #[test]
  fn last_filter_wins_by_default() {
    let tasks = sample();
    let mut state = FilterState::default();

    state.search("abc");
    state.date_range(
      Some(day("2024-02-01")),
      None
    );
    assert_eq!(
      titles(&state.apply(&tasks)),
      vec!["call mom", "abc lesson"]
    );

    state.search("abc");
    assert!(
      state.criteria().from_day().is_none()
    );
    assert_eq!(
      state.apply(&tasks).len(),
      2
    );
  }

  #[test]
  fn intersect_mode_combines_criteria() {
    let tasks = sample();
    let mut state = FilterState::new(
      ComposeMode::Intersect
    );

    state.search("abc");
    state.date_range(
      Some(day("2024-02-01")),
      None
    );
    assert_eq!(
      titles(&state.apply(&tasks)),
      vec!["abc lesson"]
    );

    state.clear();
    assert_eq!(
      state.apply(&tasks).len(),
      3
    );
  }

  #[test]
  fn one_sided_bounds_keep_the_other_side()
  {
    for mode in [
      ComposeMode::LastWins,
      ComposeMode::Intersect
    ] {
      let mut state =
        FilterState::new(mode);
      state.set_from(Some(day(
        "2024-01-01"
      )));
      state.set_to(Some(day(
        "2024-01-31"
      )));
      assert_eq!(
        state.criteria().from_day(),
        Some(day("2024-01-01"))
      );
      assert_eq!(
        state.criteria().to_day(),
        Some(day("2024-01-31"))
      );

      state.set_from(None);
      assert!(
        state
          .criteria()
          .from_day()
          .is_none()
      );
      assert_eq!(
        state.criteria().to_day(),
        Some(day("2024-01-31"))
      );
    }
  }

  #[test]
  fn compose_mode_parses_config_values()
  {
    assert_eq!(
      "intersect"
        .parse::<ComposeMode>()
        .expect("intersect"),
      ComposeMode::Intersect
    );
    assert_eq!(
      " Last "
        .parse::<ComposeMode>()
        .expect("last"),
      ComposeMode::LastWins
    );
    assert!(
      "sometimes"
        .parse::<ComposeMode>()
        .is_err()
    );
  }
}
