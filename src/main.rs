use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rehearse::config::{self, Config};
use rehearse::export::{self, ExportBundle};
use rehearse::quiz::{self, Quiz};
use rehearse::record;
use rehearse::review::{NoLookup, TaskLookup};
use rehearse::roadmap::Catalog;
use rehearse::schedule::Difficulty;
use rehearse::store::FileStore;
use rehearse::tracker::Tracker;

#[derive(Parser)]
#[command(name = "rehearse")]
#[command(about = "Learning roadmap tracker with spaced-repetition reviews", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data file (defaults to the platform data directory)
    #[arg(long, global = true, env = "REHEARSE_DATA")]
    data: Option<PathBuf>,

    /// Roadmap CSV file or directory (repeatable)
    #[arg(long, global = true, env = "REHEARSE_ROADMAP", value_delimiter = ',')]
    roadmap: Vec<String>,

    /// Set log level
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show progress, streak and due reviews
    Status,
    /// Mark tasks as completed
    Complete { ids: Vec<String> },
    /// Mark tasks as not completed
    Uncomplete { ids: Vec<String> },
    /// List reviews due now
    Due,
    /// Work through due reviews in the terminal
    Review,
    /// Answer a short multiple-choice knowledge check
    Quiz {
        /// Question bank CSV (question,options,answer,explanation)
        #[arg(long)]
        bank: Option<PathBuf>,
        /// Number of questions to ask
        #[arg(short = 'n', long, default_value_t = quiz::QUIZ_LENGTH)]
        count: usize,
    },
    /// Write all data to a JSON file
    Export { path: Option<PathBuf> },
    /// Replace data with the contents of an exported JSON file
    Import { path: PathBuf },
    /// Delete all progress, reviews and the streak
    Reset,
    /// Start the web UI
    Serve {
        #[arg(short, long, env = "REHEARSE_PORT", default_value_t = config::DEFAULT_PORT)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = Config::new(cli.data, cli.roadmap, &cli.log_level);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Config) -> rehearse::Result<()> {
    let catalog = Catalog::load(&config.roadmap)?;
    let store = FileStore::open(&config.data_path)?;
    tracing::debug!(path = %store.path().display(), "data file opened");

    let mut tracker = Tracker::open(store);
    let today = Local::now().date_naive();
    tracker.check_in(today)?;

    let lookup: &dyn TaskLookup = if catalog.is_empty() {
        &NoLookup
    } else {
        &catalog
    };
    let total = (!catalog.is_empty()).then(|| catalog.len());

    match command {
        Commands::Status => {
            let summary = tracker.summary(total);
            println!(
                "Progress:  {}/{} tasks ({}%)",
                summary.completed, summary.total, summary.percentage
            );
            println!("Retention: {}%", summary.retention_score);
            println!("Streak:    {} days", tracker.streak().count);
            println!("Due:       {} reviews", tracker.due(record::now()).len());
        }
        Commands::Complete { ids } => {
            warn_unknown(&catalog, &ids);
            tracker.set_completed(&ids, true, record::now())?;
            println!("Marked {} task(s) complete.", ids.len());
        }
        Commands::Uncomplete { ids } => {
            tracker.set_completed(&ids, false, record::now())?;
            println!("Marked {} task(s) not complete.", ids.len());
        }
        Commands::Due => {
            let items = tracker.due_items(lookup, record::now());
            if items.is_empty() {
                println!("No reviews due.");
            }
            for item in items {
                println!("{}  {}", item.task_id, item.info.title);
            }
        }
        Commands::Review => review(&mut tracker, lookup)?,
        Commands::Quiz { bank, count } => {
            let bank = match bank {
                Some(path) => quiz::load_bank(&path)?,
                None => quiz::builtin_bank(),
            };
            run_quiz(Quiz::draw(&bank, count, &mut rand::thread_rng()))?;
        }
        Commands::Export { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(export::file_name(today)));
            std::fs::write(&path, tracker.export(record::now()).to_json()?)?;
            println!("Exported to {}", path.display());
        }
        Commands::Import { path } => {
            let text = std::fs::read_to_string(&path)?;
            tracker.import(ExportBundle::from_json(&text)?)?;
            println!("Imported {}", path.display());
        }
        Commands::Reset => {
            tracker.reset()?;
            println!("All data reset.");
        }
        Commands::Serve { port } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(rehearse::web::serve(tracker, catalog, port))?;
        }
    }
    Ok(())
}

fn warn_unknown(catalog: &Catalog, ids: &[String]) {
    if catalog.is_empty() {
        return;
    }
    for id in ids {
        if catalog.get(id).is_none() {
            tracing::warn!(task_id = %id, "task is not in the roadmap");
        }
    }
}

fn review(tracker: &mut Tracker<FileStore>, lookup: &dyn TaskLookup) -> rehearse::Result<()> {
    let items = tracker.due_items(lookup, record::now());
    if items.is_empty() {
        println!("No reviews due today. Great job staying on top of your learning!");
        return Ok(());
    }

    println!("{} reviews due.\n", items.len());

    let mut counts = [0u32; 3]; // easy, medium, hard
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let mut buf = String::new();

    for (i, item) in items.iter().enumerate() {
        println!("[{}/{}] {}", i + 1, items.len(), item.info.title);
        println!("{}", item.info.description);
        println!();

        let difficulty = loop {
            print!("How well do you remember it? (e=easy, m=medium, h=hard): ");
            io::stdout().flush()?;
            buf.clear();
            if stdin.read_line(&mut buf)? == 0 {
                println!();
                return Ok(());
            }
            match buf.parse::<Difficulty>() {
                Ok(d) => break d,
                Err(e) => println!("{e}"),
            }
        };

        let idx = match difficulty {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        };
        counts[idx] += 1;

        if let Err(e) = tracker.record_review(&item.task_id, difficulty, record::now()) {
            eprintln!("Failed to save review: {e}");
        }
        println!();
    }

    println!("All reviews complete! Your knowledge is getting stronger.");
    println!(
        "  Easy: {}, Medium: {}, Hard: {}",
        counts[0], counts[1], counts[2]
    );
    Ok(())
}

fn run_quiz(mut quiz: Quiz) -> rehearse::Result<()> {
    if quiz.is_empty() {
        println!("No quiz questions available.");
        return Ok(());
    }

    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let mut buf = String::new();
    let total = quiz.len();

    for i in 0..total {
        let question = quiz.questions()[i].clone();
        println!("Question {} of {}", i + 1, total);
        println!("{}", question.question);
        for (n, option) in question.options.iter().enumerate() {
            println!("  {}) {}", n + 1, option);
        }

        let marking = loop {
            print!("Your answer (1-{}): ", question.options.len());
            io::stdout().flush()?;
            buf.clear();
            if stdin.read_line(&mut buf)? == 0 {
                println!();
                return Ok(());
            }
            let choice = buf.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            match choice.and_then(|c| quiz.answer(i, c)) {
                Some(marking) => break marking,
                None => println!("Enter a number between 1 and {}.", question.options.len()),
            }
        };

        if marking.correct {
            println!("Correct!");
        } else {
            println!(
                "Incorrect. The answer is {}) {}",
                marking.correct_option + 1,
                question.options[marking.correct_option]
            );
        }
        if !question.explanation.is_empty() {
            println!("Explanation: {}", question.explanation);
        }
        println!();
    }

    let result = quiz.result();
    println!(
        "You got {} out of {} questions correct ({}%).",
        result.correct, result.total, result.percentage
    );
    println!("{}", result.tier.message());
    Ok(())
}
