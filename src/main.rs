//! Purpose: `fbscrape` CLI entry point.
//! Role: Binary crate root; parses args, loads `.env`, installs logging, dispatches commands.
//! Invariants: Result and error files go to the output directory; stdout carries only paths and listings.
//! Invariants: Errors are emitted on stderr (text on a TTY, one JSON line otherwise).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod output;

use fbscrape::api::{Error, ErrorKind, WaitPolicy, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

/// Global settings shared by every scrape command.
#[derive(Clone, Debug)]
struct RunSettings {
    output_dir: PathBuf,
    wait: WaitPolicy,
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err((
                Error::new(ErrorKind::Config)
                    .with_message("failed to load .env file")
                    .with_source(err),
                cli.color,
            ));
        }
    }
    init_tracing();

    let color_mode = cli.color;
    let settings = RunSettings {
        output_dir: cli.output_dir,
        wait: WaitPolicy {
            max_wait: cli.max_wait,
            poll_interval: cli.poll_interval,
        },
    };

    command_dispatch::dispatch_command(cli.command, &settings)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "fbscrape",
    version,
    about = "Facebook scraper powered by the Thordata Web Scraper API",
    long_about = None,
    before_help = r#"Each command submits one scraping job, waits for it, and saves the result as JSON.

Credentials come from the environment (or a .env file):
  THORDATA_SCRAPER_TOKEN, THORDATA_PUBLIC_TOKEN, THORDATA_PUBLIC_KEY
"#,
    after_help = r#"EXAMPLES
  $ fbscrape post https://www.facebook.com/somepage/posts/123
  $ fbscrape event search https://www.facebook.com/events/search?q=jazz https://www.facebook.com/events/search?q=rock
  $ fbscrape comment https://www.facebook.com/somepage/posts/123 --comments-sort Newest --limit-records 50

Results are written to output/<operation>.json; failures to output/error_<operation>_<timestamp>.json."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "output",
        help = "Directory for result and error files",
        value_hint = ValueHint::DirPath
    )]
    output_dir: PathBuf,
    #[arg(
        long,
        global = true,
        default_value = "600s",
        value_parser = parse_duration,
        help = "Maximum time to wait for a job (ms|s|m|h)"
    )]
    max_wait: Duration,
    #[arg(
        long,
        global = true,
        default_value = "3s",
        value_parser = parse_duration,
        help = "Interval between job status checks (ms|s|m|h)"
    )]
    poll_interval: Duration,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Facebook Posts Scraper",
        after_help = r#"EXAMPLES
  $ fbscrape post https://www.facebook.com/somepage/posts/123"#
    )]
    Post {
        #[arg(help = "Facebook post URL")]
        url: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Facebook Events Scraper",
        subcommand_required = true
    )]
    Event {
        #[command(subcommand)]
        command: EventCommand,
    },
    #[command(arg_required_else_help = true, about = "Facebook Profile Scraper")]
    Profile {
        #[arg(help = "Facebook profile URL")]
        url: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Facebook Post Comments Scraper",
        after_help = r#"EXAMPLES
  $ fbscrape comment https://www.facebook.com/somepage/posts/123
  $ fbscrape comment https://www.facebook.com/somepage/posts/123 --get-all-replies --comments-sort "All comments""#
    )]
    Comment(CommentArgs),
    #[command(about = "List supported operations and their vendor job types")]
    Operations {
        #[arg(long, help = "Emit JSON even on a terminal")]
        json: bool,
    },
    #[command(about = "Print version info")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ fbscrape completion bash > ~/.local/share/bash-completion/completions/fbscrape
  $ fbscrape completion zsh > ~/.zfunc/_fbscrape
  $ fbscrape completion fish > ~/.config/fish/completions/fbscrape.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum EventCommand {
    #[command(about = "Events by event list URL (facebook_event_by-eventlist-url)")]
    Eventlist {
        #[arg(help = "Event list URL")]
        url: String,
        #[arg(long, help = "Only return upcoming events")]
        upcoming_events_only: bool,
    },
    #[command(about = "Events by search URL (facebook_event_by-search-url)")]
    Search {
        #[arg(required = true, num_args = 1.., help = "Search URL(s); each becomes its own job entry")]
        url: Vec<String>,
    },
    #[command(about = "Events by events URL (facebook_event_by-events-url)")]
    Events {
        #[arg(required = true, num_args = 1.., help = "Events URL(s); each becomes its own job entry")]
        url: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct CommentArgs {
    #[arg(help = "Facebook post comments URL")]
    url: String,
    #[arg(long, help = "Expand every reply thread")]
    get_all_replies: bool,
    #[arg(long, value_name = "N", help = "Maximum number of comments to collect")]
    limit_records: Option<u32>,
    #[arg(long, value_enum, help = "Comment ordering")]
    comments_sort: Option<CommentsSort>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CommentsSort {
    #[value(name = "Most Relevant", alias = "Most Relevent")]
    MostRelevant,
    #[value(name = "Newest")]
    Newest,
    #[value(name = "All comments")]
    AllComments,
}

impl CommentsSort {
    fn label(self) -> &'static str {
        match self {
            CommentsSort::MostRelevant => "Most Relevant",
            CommentsSort::Newest => "Newest",
            CommentsSort::AllComments => "All comments",
        }
    }
}

fn parse_duration(input: &str) -> Result<Duration, Error> {
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message("invalid duration")
            .with_hint("Use a number plus ms|s|m|h (e.g. 10s).")
    };
    let trimmed = input.trim();
    let split = trimmed.char_indices().find(|(_, ch)| !ch.is_ascii_digit());
    let (num_str, unit) = match split {
        Some((idx, _)) => trimmed.split_at(idx),
        None => ("", ""),
    };
    if num_str.is_empty() || unit.is_empty() {
        return Err(invalid());
    }
    let value: u64 = num_str.parse().map_err(|_| invalid())?;
    let millis = match unit {
        "ms" => value,
        "s" => value.saturating_mul(1_000),
        "m" => value.saturating_mul(60_000),
        "h" => value.saturating_mul(3_600_000),
        _ => return Err(invalid()),
    };
    Ok(Duration::from_millis(millis))
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, width) in widths.iter_mut().enumerate() {
            let len = row.get(idx).map(|cell| cell.chars().count()).unwrap_or(0);
            *width = (*width).max(len);
        }
    }

    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    std::iter::once(format_table_line(&header_cells, &widths))
        .chain(rows.iter().map(|row| format_table_line(row, &widths)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        if idx + 1 < widths.len() {
            line.push_str(&" ".repeat(width.saturating_sub(cell.chars().count())));
        }
    }
    line
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| err.detailed_message())
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().name()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `fbscrape --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "fbscrape") else {
        return "Try `fbscrape --help`.".to_string();
    };
    let parts = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return "Try `fbscrape --help`.".to_string();
    }
    format!("Try `fbscrape {} --help`.", parts.join(" "))
}
