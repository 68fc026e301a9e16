use std::fmt;

use exam_core::ExamSettings;
use exam_core::model::{TestId, UserId};
use services::{AppServices, Clock};
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUserId { raw: String },
    InvalidSeconds { flag: &'static str, raw: String },
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidSeconds { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingUser => write!(f, "results requires --user or EXAM_USER_ID"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Results,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "results" => Some(Self::Results),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    test: Option<String>,
    user_id: Option<UserId>,
    module_secs: Option<u32>,
    warning_secs: Option<u32>,
    review_editable: bool,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take    [--db <sqlite_url>] [--test <id>] [--user <uuid>] [options]");
    eprintln!("  cargo run -p app -- results [--db <sqlite_url>] --test <id> --user <uuid>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --module-seconds <n>      Length of each module (default: 3840)");
    eprintln!("  --warning-seconds <n>     Reveal a hidden timer at this many seconds (default: 300)");
    eprintln!("  --review-editable         Allow changing answers while reviewing");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:exam.sqlite3");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EXAM_DB_URL, EXAM_TEST_ID, EXAM_USER_ID, EXAM_MODULE_SECONDS,");
    eprintln!("  EXAM_WARNING_SECONDS, EXAM_REVIEW_EDITABLE, RUST_LOG");
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parse_seconds(flag: &'static str, raw: String) -> Result<u32, ArgsError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ArgsError::InvalidSeconds { flag, raw })
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:exam.sqlite3".into()), normalize_sqlite_url);
        let mut test = std::env::var("EXAM_TEST_ID").ok();
        let mut user_id = std::env::var("EXAM_USER_ID")
            .ok()
            .and_then(|value| value.trim().parse::<UserId>().ok());
        let mut module_secs = std::env::var("EXAM_MODULE_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok());
        let mut warning_secs = std::env::var("EXAM_WARNING_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok());
        let mut review_editable = env_flag("EXAM_REVIEW_EDITABLE");

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--test" => {
                    test = Some(require_value(args, "--test")?);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let parsed = value
                        .trim()
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--module-seconds" => {
                    let value = require_value(args, "--module-seconds")?;
                    module_secs = Some(parse_seconds("--module-seconds", value)?);
                }
                "--warning-seconds" => {
                    let value = require_value(args, "--warning-seconds")?;
                    warning_secs = Some(parse_seconds("--warning-seconds", value)?);
                }
                "--review-editable" => review_editable = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            test,
            user_id,
            module_secs,
            warning_secs,
            review_editable,
        })
    }

    fn settings(&self) -> Result<ExamSettings, exam_core::SettingsError> {
        let mut settings = ExamSettings::default().with_review_editable(self.review_editable);
        if let Some(secs) = self.module_secs {
            settings = settings.with_module_duration_secs(secs)?;
        }
        if let Some(secs) = self.warning_secs {
            settings = settings.with_warning_threshold_secs(secs);
        }
        Ok(settings)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: take a test when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let settings = parsed.settings()?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), settings).await?;
    tracing::info!(db_url = %parsed.db_url, command = ?cmd, "storage ready");

    match cmd {
        Command::Take => terminal::take(&services, parsed.test.as_deref(), parsed.user_id).await,
        Command::Results => {
            let user_id = parsed.user_id.ok_or(ArgsError::MissingUser)?;
            let Some(test_id) = TestId::from_param(parsed.test.as_deref()) else {
                println!("No test selected.");
                return Ok(());
            };
            terminal::print_results(&services, user_id, &test_id).await
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
