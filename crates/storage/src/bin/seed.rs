use std::fmt;

use exam_core::model::{Difficulty, QuestionDraft, QuestionId, Topic};
use storage::repository::{QuestionFilter, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    per_topic: u32,
    first_id: u64,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidPerTopic { raw: String },
    InvalidFirstId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidPerTopic { raw } => write!(f, "invalid --per-topic value: {raw}"),
            ArgsError::InvalidFirstId { raw } => write!(f, "invalid --first-id value: {raw}"),
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
        let mut db_url = std::env::var("EXAM_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:exam.sqlite3?mode=rwc".into());
        let mut per_topic = std::env::var("EXAM_SEED_PER_TOPIC")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(30);
        let mut first_id = 1;

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
                "--per-topic" => {
                    let value = require_value(&mut args, "--per-topic")?;
                    per_topic = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidPerTopic { raw: value.clone() })?;
                }
                "--first-id" => {
                    let value = require_value(&mut args, "--first-id")?;
                    first_id = value
                        .parse::<u64>()
                        .map_err(|_| ArgsError::InvalidFirstId { raw: value.clone() })?;
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
            per_topic,
            first_id,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:exam.sqlite3?mode=rwc)");
    eprintln!("  --per-topic <n>           Questions to upsert for each topic (default: 30)");
    eprintln!("  --first-id <id>           ID of the first generated question (default: 1)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EXAM_DATABASE_URL, EXAM_SEED_PER_TOPIC");
}

/// Deterministic practice question `n` for `topic`.
fn sample_draft(topic: Topic, n: u32) -> QuestionDraft {
    let areas = topic.focus_areas();
    let area = areas[n as usize % areas.len()];
    let difficulty = Difficulty::ALL[n as usize % Difficulty::ALL.len()];
    let correct = n as usize % 4;

    let options = (0..4)
        .map(|i| {
            if i == correct {
                format!("The documented behaviour of {area}")
            } else {
                format!("A common misconception about {area} (#{i})")
            }
        })
        .collect();

    QuestionDraft {
        topic: topic.as_str().to_owned(),
        subtopic: area.to_owned(),
        difficulty: difficulty.as_str().to_owned(),
        prompt: format!(
            "[{}] Practice question {} on {area}: which statement is accurate?",
            topic.display_name(),
            n + 1
        ),
        code_sample: None,
        options,
        correct_answer: correct,
        explanation: format!("Only one option matches the documented behaviour of {area}."),
        references: vec!["https://docs.databricks.com/".into()],
        tags: vec![topic.as_str().to_owned(), difficulty.as_str().to_owned()],
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let mut next_id = args.first_id;
    for topic in Topic::ALL {
        for n in 0..args.per_topic {
            let question = sample_draft(topic, n).validate(QuestionId::new(next_id))?;
            storage.questions.upsert_question(&question).await?;
            next_id += 1;
        }
    }

    let total = storage.questions.count(&QuestionFilter::all()).await?;
    println!(
        "Seeded {} questions per topic into {} ({total} in bank)",
        args.per_topic, args.db_url
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
