use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::filter::ComposeMode;
use crate::paginate::DEFAULT_PAGE_SIZE;
use crate::sync::{
  ApiSettings,
  DEFAULT_BASE_URL,
  DEFAULT_MAX_ATTEMPTS,
  DEFAULT_PROBE_TIMEOUT,
  DEFAULT_RETRY_DELAY,
  RetryPolicy
};

const RC_ENV_VAR: &str = "TALLYRC";
const RC_FILE_NAME: &str = ".tallyrc";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.tally"),
      ("api.enabled", "off"),
      ("api.base_url", DEFAULT_BASE_URL),
      ("filter.compose", "last"),
      ("timezone", "UTC"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    map.insert(
      "api.retries".to_string(),
      DEFAULT_MAX_ATTEMPTS.to_string()
    );
    map.insert(
      "api.retry_delay_ms".to_string(),
      DEFAULT_RETRY_DELAY
        .as_millis()
        .to_string()
    );
    map.insert(
      "api.probe_timeout_ms".to_string(),
      DEFAULT_PROBE_TIMEOUT
        .as_millis()
        .to_string()
    );
    map.insert(
      "page.size".to_string(),
      DEFAULT_PAGE_SIZE.to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading tallyrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no tallyrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self
      .map
      .get(key)
      .map(|raw| {
        raw.trim().parse::<u64>().with_context(
          || {
            format!(
              "config key {key} expects \
               a whole number, got \
               {raw:?}"
            )
          }
        )
      })
      .transpose()
  }

  pub fn api_enabled(&self) -> bool {
    self
      .get_bool("api.enabled")
      .unwrap_or(false)
  }

  pub fn color(&self) -> bool {
    self.get_bool("color").unwrap_or(true)
  }

  pub fn timezone(&self) -> Option<String> {
    self.get("timezone")
  }

  pub fn compose_mode(
    &self
  ) -> anyhow::Result<ComposeMode> {
    match self.get("filter.compose") {
      | Some(raw) => raw.parse(),
      | None => Ok(ComposeMode::default())
    }
  }

  pub fn page_size(
    &self
  ) -> anyhow::Result<usize> {
    let size = self
      .get_u64("page.size")?
      .unwrap_or(DEFAULT_PAGE_SIZE as u64);
    if size == 0 {
      return Err(anyhow!(
        "page.size must be at least 1"
      ));
    }
    usize::try_from(size).context(
      "page.size is out of range"
    )
  }

  pub fn api_settings(
    &self
  ) -> anyhow::Result<ApiSettings> {
    let base_url = self
      .get("api.base_url")
      .filter(|url| !url.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_BASE_URL.to_string()
      });

    let max_attempts = self
      .get_u64("api.retries")?
      .map(u32::try_from)
      .transpose()
      .context("api.retries is out of range")?
      .unwrap_or(DEFAULT_MAX_ATTEMPTS)
      .max(1);

    let unit_delay = self
      .get_u64("api.retry_delay_ms")?
      .map(Duration::from_millis)
      .unwrap_or(DEFAULT_RETRY_DELAY);

    let probe_timeout = self
      .get_u64("api.probe_timeout_ms")?
      .map(Duration::from_millis)
      .unwrap_or(DEFAULT_PROBE_TIMEOUT);

    Ok(ApiSettings {
      base_url: base_url.trim().to_string(),
      retry: RetryPolicy {
        max_attempts,
        unit_delay
      },
      probe_timeout
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include already loaded; skipping");
          continue;
        }
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping tallyrc"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".tally"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
