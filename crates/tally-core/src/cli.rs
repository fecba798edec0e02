use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::app::Intent;
use crate::datetime::parse_day;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tally",
    version,
    about = "Tally: a small to-do list with optional remote sync",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "tallyrc")]
    pub tallyrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task dated today.
    Add {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Flip the completed flag of the first task with this exact title.
    Done {
        /// Short id from `list`, or any unique id prefix.
        #[arg(long, conflicts_with = "title")]
        id: Option<String>,
        #[arg(num_args = 0.., trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Delete every task with this exact title.
    Rm {
        #[arg(long, conflicts_with = "title")]
        id: Option<String>,
        #[arg(num_args = 0.., trailing_var_arg = true)]
        title: Vec<String>,
    },
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long = "per-page")]
        per_page: Option<usize>,
    },
    /// Replace the local list with the remote one.
    Fetch,
    /// Probe the remote API.
    Ping,
    /// Print the stored list as JSON.
    Export,
    /// Interactive session.
    Shell,
}

impl Command {
    /// Intents for commands that map onto a single mutation. `resolve_id`
    /// turns an `--id` argument into the task's full id.
    pub fn intent<F>(&self, resolve_id: F) -> anyhow::Result<Option<Intent>>
    where
        F: Fn(&str) -> anyhow::Result<Uuid>,
    {
        let intent = match self {
            Self::Add { title } => Some(Intent::Add(title.join(" "))),
            Self::Done { id: Some(id), .. } => Some(Intent::ToggleId(resolve_id(id)?)),
            Self::Done { title, .. } => Some(Intent::Toggle(required_title(title, "done")?)),
            Self::Rm { id: Some(id), .. } => Some(Intent::RemoveId(resolve_id(id)?)),
            Self::Rm { title, .. } => Some(Intent::Remove(required_title(title, "rm")?)),
            Self::Fetch => Some(Intent::FetchRemote),
            Self::List { .. } | Self::Ping | Self::Export | Self::Shell => None,
        };
        Ok(intent)
    }
}

fn required_title(words: &[String], command: &str) -> anyhow::Result<String> {
    if words.is_empty() {
        return Err(anyhow!("{command} needs a title or --id"));
    }
    Ok(words.join(" "))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of argv.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// One parsed line of the interactive shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Intent(Intent),
    List,
    Help,
    Quit,
    Empty,
}

pub fn shell_command_names() -> Vec<&'static str> {
    vec![
        "add", "toggle", "done", "rm", "search", "from", "to", "dates", "clear", "fetch", "next",
        "prev", "page", "size", "list", "help", "quit", "exit",
    ]
}

/// Resolves `token` to a known name, accepting any unambiguous prefix.
pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

pub const SHELL_HELP: &str = "\
add <title>        add a task
toggle <title>     flip completed on the first exact match (alias: done)
rm <title>         remove every exact match
search <text>      case-insensitive title filter
from <day>         created on or after day
to <day>           created on or before day
dates <from> <to>  both bounds; '-' leaves one open
clear              drop all filters
fetch              replace the list with the remote one
next | prev        move between pages
page <n>           jump to page n
size <n>           items per page
list               redraw
quit               leave the shell";

#[tracing::instrument(skip(today))]
pub fn parse_shell_line(line: &str, today: NaiveDate) -> anyhow::Result<ShellCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellCommand::Empty);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let command = expand_command_abbrev(&head.to_ascii_lowercase(), &shell_command_names())
        .ok_or_else(|| anyhow!("unknown or ambiguous command: {head} (try 'help')"))?;
    debug!(command, args = rest, "shell command resolved");

    let intent = match command {
        "add" => Intent::Add(rest.to_string()),
        "toggle" | "done" => Intent::Toggle(non_empty(rest, command)?),
        "rm" => Intent::Remove(non_empty(rest, command)?),
        "search" => Intent::Search(rest.to_string()),
        "from" => Intent::FilterFrom(optional_day(rest, today)?),
        "to" => Intent::FilterTo(optional_day(rest, today)?),
        "dates" => {
            let mut parts = rest.split_whitespace();
            let from = optional_day(parts.next().unwrap_or("-"), today)?;
            let to = optional_day(parts.next().unwrap_or("-"), today)?;
            if parts.next().is_some() {
                return Err(anyhow!("dates takes at most two days"));
            }
            Intent::FilterByDate { from, to }
        }
        "clear" => Intent::ClearFilter,
        "fetch" => Intent::FetchRemote,
        "next" => Intent::NextPage,
        "prev" => Intent::PreviousPage,
        "page" => Intent::GoToPage(number(rest, command)?),
        "size" => Intent::SetPageSize(number(rest, command)?),
        "list" => return Ok(ShellCommand::List),
        "help" => return Ok(ShellCommand::Help),
        _ => return Ok(ShellCommand::Quit),
    };

    Ok(ShellCommand::Intent(intent))
}

fn non_empty(rest: &str, command: &str) -> anyhow::Result<String> {
    if rest.is_empty() {
        return Err(anyhow!("{command} needs a title"));
    }
    Ok(rest.to_string())
}

fn number(rest: &str, command: &str) -> anyhow::Result<usize> {
    rest.parse::<usize>()
        .with_context(|| format!("{command} expects a number, got {rest:?}"))
}

fn optional_day(raw: &str, today: NaiveDate) -> anyhow::Result<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return Ok(None);
    }
    parse_day(raw, today).map(Some)
}

/// `--from` / `--to` values for the one-shot `list` command.
pub fn parse_day_arg(raw: Option<&str>, today: NaiveDate) -> anyhow::Result<Option<NaiveDate>> {
    raw.map(|value| optional_day(value, today))
        .transpose()
        .map(Option::flatten)
}
