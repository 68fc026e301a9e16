use std::fmt;
use std::path::PathBuf;

use exam_core::model::{Question, QuestionRecord, TestId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    test_id: TestId,
    test_name: Option<String>,
    questions: PathBuf,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingQuestions,
    UnknownArg(String),
    InvalidTestId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingQuestions => write!(f, "--questions <file.json> is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "sqlite:exam.sqlite3".into());
        let mut test_id = TestId::from_param(std::env::var("EXAM_TEST_ID").ok().as_deref())
            .unwrap_or_else(|| TestId::new("practice-1"));
        let mut test_name: Option<String> = None;
        let mut questions: Option<PathBuf> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--test-id" => {
                    let value = require_value(&mut args, "--test-id")?;
                    test_id = TestId::from_param(Some(&value))
                        .ok_or(ArgsError::InvalidTestId { raw: value })?;
                }
                "--test-name" => {
                    test_name = Some(require_value(&mut args, "--test-name")?);
                }
                "--questions" => {
                    questions = Some(PathBuf::from(require_value(&mut args, "--questions")?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            test_id,
            test_name,
            questions: questions.ok_or(ArgsError::MissingQuestions)?,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- --questions <file.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:exam.sqlite3)");
    eprintln!("  --test-id <id>            Test id to upsert (default: practice-1)");
    eprintln!("  --test-name <name>        Optional display name");
    eprintln!("  --questions <file.json>   JSON array of question records");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EXAM_DB_URL, EXAM_TEST_ID");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let raw = std::fs::read_to_string(&args.questions)?;
    let records: Vec<QuestionRecord> = serde_json::from_str(&raw)?;
    let questions = records
        .into_iter()
        .map(QuestionRecord::into_question)
        .collect::<Result<Vec<Question>, _>>()?;

    let storage = Storage::sqlite(&args.db_url).await?;
    storage
        .content
        .save_questions(&args.test_id, args.test_name.as_deref(), &questions)
        .await?;

    println!(
        "Seeded test {} with {} questions into {}",
        args.test_id,
        questions.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
