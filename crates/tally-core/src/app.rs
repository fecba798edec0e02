//! Application state and the intent dispatch table.
//!
//! `App` is built once at startup and owns everything the front end can
//! change. Every intent takes `&mut App`, so a remote fetch that replaces the
//! whole collection can never interleave with a local edit.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::collection::TaskCollection;
use crate::config::Config;
use crate::datastore::{Hydration, TaskStore};
use crate::datetime::{resolve_timezone, today_in};
use crate::error::TallyResult;
use crate::filter::{ComposeMode, FilterState};
use crate::notify::{BusyGuard, Notice, Notifier};
use crate::paginate::{Page, Pagination};
use crate::sync::SyncClient;
use crate::task::Task;

const CORRUPT_STORE_MESSAGE: &str = "Unable to load saved todos. Starting with empty list.";

#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Post new tasks to the remote API as they are added.
    pub api_enabled: bool,
    pub page_size: usize,
    pub compose: ComposeMode,
    pub timezone: Tz,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_enabled: false,
            page_size: crate::paginate::DEFAULT_PAGE_SIZE,
            compose: ComposeMode::default(),
            timezone: chrono_tz::UTC,
        }
    }
}

impl AppSettings {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            api_enabled: cfg.api_enabled(),
            page_size: cfg.page_size()?,
            compose: cfg.compose_mode()?,
            timezone: resolve_timezone(cfg.timezone().as_deref()),
        })
    }
}

/// Everything a user can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Add(String),
    Toggle(String),
    Remove(String),
    ToggleId(Uuid),
    RemoveId(Uuid),
    Search(String),
    FilterByDate {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// Lower date bound only; the upper bound stays.
    FilterFrom(Option<NaiveDate>),
    /// Upper date bound only; the lower bound stays.
    FilterTo(Option<NaiveDate>),
    ClearFilter,
    FetchRemote,
    PreviousPage,
    NextPage,
    GoToPage(usize),
    SetPageSize(usize),
}

pub struct App {
    settings: AppSettings,
    store: TaskStore,
    tasks: TaskCollection,
    filter: FilterState,
    pagination: Pagination,
    remote: Option<SyncClient>,
    notifier: Arc<dyn Notifier>,
    clock: fn() -> DateTime<Utc>,
}

impl App {
    /// Hydrates from `store`. A corrupt stored value yields an empty list
    /// and a warning instead of an error.
    #[instrument(skip_all)]
    pub fn open(
        settings: AppSettings,
        store: TaskStore,
        remote: Option<SyncClient>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let hydration = store.load().context("failed to hydrate task list")?;
        if let Hydration::Corrupt(err) = &hydration {
            notifier.notify(&Notice::warning(CORRUPT_STORE_MESSAGE));
            debug!(error = %err, "starting from an empty list");
        }
        let tasks = TaskCollection::from_tasks(hydration.into_tasks());
        let pagination = Pagination::new(settings.page_size)?;
        info!(count = tasks.len(), "task list hydrated");

        Ok(Self {
            filter: FilterState::new(settings.compose),
            settings,
            store,
            tasks,
            pagination,
            remote,
            notifier,
            clock: Utc::now,
        })
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        today_in(&self.settings.timezone, (self.clock)())
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn visible(&self) -> Vec<&Task> {
        self.filter.apply(self.tasks.tasks())
    }

    pub fn current_page(&self) -> Page<&Task> {
        self.pagination.page_of(&self.visible())
    }

    /// Maps a displayed short id (or any unique id prefix) to the full id.
    pub fn resolve_id(&self, prefix: &str) -> TallyResult<Uuid> {
        self.tasks.resolve_id(prefix)
    }

    pub fn export_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self.tasks.tasks()).context("failed to serialize tasks")
    }

    pub async fn check_connectivity(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.check_connectivity().await,
            None => false,
        }
    }

    /// Applies one intent. Only persistence failures come back as errors;
    /// everything the user can fix is reported through the notifier.
    #[instrument(skip(self))]
    pub async fn dispatch(&mut self, intent: Intent) -> anyhow::Result<()> {
        match intent {
            Intent::Add(title) => self.add(&title).await?,
            Intent::Toggle(title) => {
                let before = self.tasks.clone();
                match self.tasks.toggle(&title) {
                    Some(completed) => {
                        self.commit(before)?;
                        debug!(completed, "task toggled");
                    }
                    None => debug!("no task with that title"),
                }
            }
            Intent::ToggleId(id) => {
                let before = self.tasks.clone();
                if self.tasks.toggle_id(id).is_some() {
                    self.commit(before)?;
                }
            }
            Intent::Remove(title) => {
                let before = self.tasks.clone();
                let removed = self.tasks.remove(&title);
                if removed > 0 {
                    self.commit(before)?;
                }
                debug!(removed, "remove by title");
            }
            Intent::RemoveId(id) => {
                let before = self.tasks.clone();
                if self.tasks.remove_id(id) {
                    self.commit(before)?;
                }
            }
            Intent::Search(query) => {
                self.filter.search(&query);
                self.pagination.reset();
            }
            Intent::FilterByDate { from, to } => {
                self.filter.date_range(from, to);
                self.pagination.reset();
            }
            Intent::FilterFrom(from) => {
                self.filter.set_from(from);
                self.pagination.reset();
            }
            Intent::FilterTo(to) => {
                self.filter.set_to(to);
                self.pagination.reset();
            }
            Intent::ClearFilter => {
                self.filter.clear();
                self.pagination.reset();
            }
            Intent::FetchRemote => self.fetch_remote().await?,
            Intent::PreviousPage => {
                self.pagination.previous();
            }
            Intent::NextPage => {
                let len = self.visible().len();
                self.pagination.next(len);
            }
            Intent::GoToPage(page) => {
                let len = self.visible().len();
                self.pagination.go_to(page, len);
            }
            Intent::SetPageSize(size) => {
                if let Err(err) = self.pagination.set_page_size(size) {
                    self.notifier.notify(&Notice::warning(err.to_string()));
                }
            }
        }

        let len = self.visible().len();
        self.pagination.clamp(len);
        Ok(())
    }

    /// Writes the collection; on failure puts `before` back so memory and
    /// store stay in agreement.
    fn commit(&mut self, before: TaskCollection) -> anyhow::Result<()> {
        if let Err(err) = self.store.save(self.tasks.tasks()) {
            self.tasks = before;
            return Err(err);
        }
        Ok(())
    }

    async fn add(&mut self, raw_title: &str) -> anyhow::Result<()> {
        let before = self.tasks.clone();
        let today = self.today();
        let title = match self.tasks.add(raw_title, today) {
            Ok(task) => task.title.clone(),
            Err(err) => {
                self.notifier.notify(&Notice::warning(err.user_message("")));
                return Ok(());
            }
        };
        self.commit(before)?;
        info!(count = self.tasks.len(), "task added");

        if self.settings.api_enabled
            && let Some(remote) = &self.remote
        {
            let _busy = BusyGuard::start(self.notifier.clone(), "Saving todo to API...");
            if !remote.check_connectivity().await {
                self.notifier.notify(&Notice::warning(
                    "API is not accessible. Todo saved locally only.",
                ));
                return Ok(());
            }
            match remote.post_one(&title, self.notifier.as_ref()).await {
                Ok(_) => self
                    .notifier
                    .notify(&Notice::success("Todo saved to API successfully!")),
                Err(err) => self.notifier.notify(&Notice::error(
                    err.user_message("Failed to save todo to API."),
                )),
            }
        }
        Ok(())
    }

    async fn fetch_remote(&mut self) -> anyhow::Result<()> {
        let Some(remote) = self.remote.clone() else {
            self.notifier
                .notify(&Notice::error("Remote sync is not configured."));
            return Ok(());
        };

        self.notifier
            .notify(&Notice::info("Loading todos from API..."));
        let _busy = BusyGuard::start(self.notifier.clone(), "Loading todos from API...");

        match remote.fetch_all(self.notifier.as_ref()).await {
            Ok(todos) => {
                let before = self.tasks.clone();
                let fetched = TaskCollection::from_remote(todos, self.today());
                self.tasks.replace_all(fetched.into_tasks());
                self.commit(before)?;
                self.filter.clear();
                self.notifier.notify(&Notice::success(format!(
                    "Successfully loaded {} todos from API!",
                    self.tasks.len()
                )));
            }
            Err(err) => {
                self.notifier.notify(&Notice::error(
                    err.user_message("Failed to load todos from API."),
                ));
                self.reload_from_store()?;
            }
        }
        Ok(())
    }

    /// Falls back to whatever the store holds, not to the in-memory list.
    fn reload_from_store(&mut self) -> anyhow::Result<()> {
        match self.store.load()? {
            Hydration::Loaded(tasks) => {
                self.tasks.replace_all(tasks);
                self.filter.clear();
                self.notifier
                    .notify(&Notice::info("Loaded existing todos from local storage."));
            }
            Hydration::Corrupt(err) => {
                debug!(error = %err, "fallback store is corrupt");
                self.tasks.replace_all(Vec::new());
                self.filter.clear();
                self.notifier.notify(&Notice::warning(CORRUPT_STORE_MESSAGE));
            }
            Hydration::Missing => debug!("no stored todos to fall back on"),
        }
        Ok(())
    }
}
