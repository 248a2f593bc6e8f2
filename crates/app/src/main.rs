use std::fmt;

use rand::Rng;
use tracing::info;

use exam_core::model::{ExamKind, SessionId, UserId};
use exam_core::priority::DEFAULT_WEAK_THRESHOLD;
use exam_core::trend::Timeframe;
use services::{AppServices, Clock, EngineConfig, init_tracing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Report,
}

#[derive(Debug, Clone)]
struct Args {
    command: Command,
    db_url: Option<String>,
    user: UserId,
    kind: ExamKind,
    accuracy: f64,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidKind { raw: String },
    InvalidAccuracy { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidKind { raw } => write!(f, "invalid --kind value: {raw}"),
            ArgsError::InvalidAccuracy { raw } => {
                write!(f, "invalid --accuracy value (expected 0.0..=1.0): {raw}")
            }
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
        let mut args = std::env::args().skip(1).peekable();
        let command = match args.peek().map(String::as_str) {
            Some("report") => {
                args.next();
                Command::Report
            }
            Some("run") => {
                args.next();
                Command::Run
            }
            _ => Command::Run,
        };

        let mut parsed = Self {
            command,
            db_url: None,
            user: UserId::new(1),
            kind: ExamKind::Practice,
            accuracy: 0.7,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    parsed.user = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                }
                "--kind" => {
                    let value = require_value(&mut args, "--kind")?;
                    parsed.kind = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidKind { raw: value.clone() })?;
                }
                "--accuracy" => {
                    let value = require_value(&mut args, "--accuracy")?;
                    parsed.accuracy = value
                        .parse::<f64>()
                        .ok()
                        .filter(|a| (0.0..=1.0).contains(a))
                        .ok_or_else(|| ArgsError::InvalidAccuracy { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [run|report] [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run                       Take a simulated exam, then print feedback (default)");
    eprintln!("  report                    Print trends, priorities and weak areas only");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: EXAM_DATABASE_URL)");
    eprintln!("  --user <id>               Learner id (default: 1)");
    eprintln!("  --kind <practice|assessment>  Exam kind for run (default: practice)");
    eprintln!("  --accuracy <0.0-1.0>      Chance of answering correctly (default: 0.7)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DATABASE_URL, EXAM_TOTAL_QUESTIONS, EXAM_TIME_LIMIT_SECS, RUST_LOG, ...");
}

/// Answer every remaining question, picking the right option with probability `accuracy`.
fn answer_all(app: &AppServices, id: SessionId, accuracy: f64) {
    let engine = app.engine();
    let mut rng = rand::rng();
    while let Some(question) = engine.current_question(id) {
        let options = question.options().len();
        let selected = if rng.random_bool(accuracy) {
            question.correct_answer()
        } else {
            (question.correct_answer() + rng.random_range(1..options)) % options
        };
        if engine.submit_answer(id, question.id(), selected).is_none() {
            break;
        }
    }
}

async fn take_exam(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let exam_loop = app.exam_loop();
    let session = match args.kind {
        ExamKind::Practice => exam_loop.start_exam(args.user, ExamKind::Practice).await?,
        ExamKind::Assessment => {
            let total = app.config().allocation.total_questions();
            exam_loop.start_assessment(args.user, total, None).await?
        }
    };
    let id = session.id();
    info!(session = %id, questions = session.questions().len(), "exam started");

    answer_all(app, id, args.accuracy);

    let outcome = exam_loop.finish_exam(id).await?;
    let quick = &outcome.immediate;
    println!(
        "Score: {:.1}% ({}/{}) in {} - {}",
        quick.percentage,
        quick.correct_answers,
        quick.total_questions,
        quick.elapsed,
        if quick.passed { "PASS" } else { "FAIL" }
    );
    if let Some(best) = &quick.best_topic {
        println!("  best:  {} ({:.0}%)", best.topic.display_name(), best.percentage);
    }
    if let Some(worst) = &quick.worst_topic {
        println!("  worst: {} ({:.0}%)", worst.topic.display_name(), worst.percentage);
    }
    for line in outcome
        .report
        .insights
        .recommendations
        .iter()
        .chain(&outcome.report.pacing.recommendations)
    {
        println!("  - {line}");
    }
    Ok(())
}

async fn print_report(app: &AppServices, user: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let progress = app.progress();
    let history = progress.history(user).await?;
    let aggregates = history.aggregates();
    println!(
        "\nHistory: {} exams, average {:.1}%, best {:.1}%, worst {:.1}%",
        aggregates.exam_count,
        aggregates.average_score,
        aggregates.best_score,
        aggregates.worst_score
    );

    println!("\nTrends:");
    for trend in progress.trends_for(user, Timeframe::All).await? {
        println!(
            "  {:<40} {:?} ({:+.2}%/exam, avg {:.1}%)",
            trend.topic.display_name(),
            trend.trend,
            trend.improvement_rate,
            trend.average_score
        );
    }

    println!("\nPriorities:");
    for priority in progress.prioritize(user, DEFAULT_WEAK_THRESHOLD).await? {
        println!(
            "  [{}] {}: {}",
            priority.priority, priority.reason, priority.recommended_action
        );
    }

    let weak = progress.weak_areas(user, DEFAULT_WEAK_THRESHOLD).await?;
    if !weak.is_empty() {
        println!("\nWeak areas:");
        for area in weak {
            println!(
                "  {} at {:.1}% ({:.1} points to go)",
                area.topic.display_name(),
                area.average_score,
                area.points_needed
            );
        }
    }

    println!("\nNext exam:");
    for rec in progress
        .recommendations(user, &app.config().allocation)
        .await?
    {
        println!(
            "  {:?} {:<40} {} questions{} - {}",
            rec.priority,
            rec.topic.display_name(),
            rec.recommended_questions,
            if rec.reduce_allocation { " (reduce)" } else { "" },
            rec.message
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = EngineConfig::from_env()?;
    if let Some(db_url) = &args.db_url {
        config.database_url.clone_from(db_url);
    }
    init_tracing(&config.rust_log);

    let app = AppServices::new_sqlite(config, Clock::default()).await?;
    let recovered = app.exam_loop().recover_sessions(args.user).await?;
    for id in recovered {
        let engine = app.engine();
        let closed = engine.result(id).is_some() || (engine.resume(id) && engine.expire(id));
        if closed {
            app.exam_loop().finish_exam(id).await?;
            info!(session = %id, "closed out interrupted session");
        }
    }

    if args.command == Command::Run {
        take_exam(&app, &args).await?;
    }
    print_report(&app, args.user).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
