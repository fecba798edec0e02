pub mod app;
pub mod cli;
pub mod collection;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod notify;
pub mod paginate;
pub mod render;
pub mod sync;
pub mod task;

use std::ffi::OsString;
use std::io::{
  self,
  BufRead,
  Write
};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

use crate::app::{
  App,
  AppSettings,
  Intent
};
use crate::cli::{
  Command,
  ShellCommand
};
use crate::filter::ComposeMode;
use crate::notify::{
  ConsoleNotifier,
  Notice,
  Notifier
};
use crate::render::Renderer;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tally CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.tallyrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let kv =
    datastore::FileKvStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let command =
    cli.command.unwrap_or(
      Command::List {
        search:   None,
        from:     None,
        to:       None,
        page:     1,
        per_page: None
      }
    );

  let notifier = Arc::new(
    if command == Command::Shell {
      ConsoleNotifier::banner_only(
        cfg.color()
      )
    } else {
      ConsoleNotifier::new(cfg.color())
    }
  );

  let settings =
    AppSettings::from_config(&cfg)?;
  let remote = sync::SyncClient::new(
    &cfg.api_settings()?
  )?;
  let mut app = App::open(
    settings,
    datastore::TaskStore::new(
      Box::new(kv)
    ),
    Some(remote),
    notifier.clone()
  )?;
  let renderer = Renderer::new(&cfg);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(execute(
    &mut app, command, &renderer,
    &notifier
  ))
}

#[tracing::instrument(skip(
  app, renderer, notifier
))]
async fn execute(
  app: &mut App,
  command: Command,
  renderer: &Renderer,
  notifier: &ConsoleNotifier
) -> anyhow::Result<()> {
  match command {
    | Command::List {
      search,
      from,
      to,
      page,
      per_page
    } => {
      if let Some(size) = per_page {
        app
          .dispatch(Intent::SetPageSize(
            size
          ))
          .await?;
      }

      let today = app.today();
      let from = cli::parse_day_arg(
        from.as_deref(),
        today
      )?;
      let to = cli::parse_day_arg(
        to.as_deref(),
        today
      )?;
      let has_dates =
        from.is_some() || to.is_some();

      if search.is_some()
        && has_dates
        && app.filter().mode()
          == ComposeMode::LastWins
      {
        warn!(
          "filter.compose is last-wins; \
           the date range replaces \
           --search"
        );
      }
      if let Some(query) = search {
        app
          .dispatch(Intent::Search(query))
          .await?;
      }
      if has_dates {
        app
          .dispatch(
            Intent::FilterByDate {
              from,
              to
            }
          )
          .await?;
      }

      app
        .dispatch(Intent::GoToPage(page))
        .await?;
      renderer.print_page(
        &app.current_page(),
        app.filter()
      )
    }
    | Command::Ping => {
      if app.check_connectivity().await {
        notifier.notify(&Notice::success(
          "API is reachable."
        ));
      } else {
        notifier.notify(&Notice::warning(
          "API is not accessible."
        ));
      }
      Ok(())
    }
    | Command::Export => {
      let mut out = io::stdout().lock();
      writeln!(
        out,
        "{}",
        app.export_json()?
      )?;
      Ok(())
    }
    | Command::Shell => {
      run_shell(app, renderer, notifier)
        .await
    }
    | other => {
      let intent =
        other.intent(|raw| {
          app
            .resolve_id(raw)
            .map_err(anyhow::Error::from)
        })?;
      if let Some(intent) = intent {
        app.dispatch(intent).await?;
      }
      renderer.print_page(
        &app.current_page(),
        app.filter()
      )
    }
  }
}

#[tracing::instrument(skip_all)]
async fn run_shell(
  app: &mut App,
  renderer: &Renderer,
  notifier: &ConsoleNotifier
) -> anyhow::Result<()> {
  redraw(app, renderer, notifier)?;

  let stdin = io::stdin();
  let mut line = String::new();
  loop {
    {
      let mut out = io::stdout().lock();
      write!(out, "tally> ")?;
      out.flush()?;
    }

    line.clear();
    if stdin.lock().read_line(&mut line)?
      == 0
    {
      debug!("stdin closed, leaving shell");
      break;
    }

    match cli::parse_shell_line(
      &line,
      app.today()
    ) {
      | Err(err) => {
        notifier.notify(&Notice::warning(
          format!("{err:#}")
        ));
        redraw(app, renderer, notifier)?;
      }
      | Ok(ShellCommand::Empty) => {}
      | Ok(ShellCommand::Quit) => break,
      | Ok(ShellCommand::Help) => {
        println!("{}", cli::SHELL_HELP);
      }
      | Ok(ShellCommand::List) => {
        redraw(app, renderer, notifier)?;
      }
      | Ok(ShellCommand::Intent(intent)) => {
        notifier.dismiss();
        app.dispatch(intent).await?;
        redraw(app, renderer, notifier)?;
      }
    }
  }

  Ok(())
}

fn redraw(
  app: &App,
  renderer: &Renderer,
  notifier: &ConsoleNotifier
) -> anyhow::Result<()> {
  if let Some(notice) =
    notifier.live_banner()
  {
    println!(
      "{}",
      notifier.format(&notice)
    );
  }
  renderer.print_page(
    &app.current_page(),
    app.filter()
  )
}
