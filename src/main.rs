//! # Curriculum Harness CLI (`cur`)
//!
//! ## Usage
//!
//! ```bash
//! cur --config ./config/cur.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cur ingest` | Build a course from a spreadsheet and a document, validate and store it |
//! | `cur validate <id>` | Re-validate a stored course |
//! | `cur get <id>` | Print a stored course as JSON |
//! | `cur list` | List stored courses |
//! | `cur search "<query>"` | Rank course entities and methodology entries |
//! | `cur recover <file>` | Recover a JSON object from saved generation output |
//! | `cur generate <id> <module> "<instruction>"` | Grounded structured generation |
//! | `cur completions <shell>` | Print shell completions |

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use curriculum_harness::{config, generation, get, ingest, recover_cmd, search};

/// Curriculum Harness CLI: turn curriculum spreadsheets and course
/// documents into a grounded, queryable knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. The file is optional; defaults apply when it is absent.
#[derive(Parser)]
#[command(
    name = "cur",
    about = "Curriculum Harness — turn curriculum spreadsheets and course documents into a grounded, queryable knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cur.toml")]
    config: PathBuf,

    /// Log at debug level (overrides RUST_LOG). Logs go to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one course.
    ///
    /// Reads the module grid from the spreadsheet, enrichment from the
    /// document pages, reconciles both and stores the course unless the
    /// validation report has errors.
    Ingest {
        /// Course display name; its slug becomes the course id.
        #[arg(long)]
        name: String,

        /// Module grid (`.xlsx` or JSON `[[cell, ...], ...]`).
        #[arg(long)]
        spreadsheet: PathBuf,

        /// Document pages as positioned fragments (`.json`).
        #[arg(long)]
        document: PathBuf,

        /// General competency text; overrides any captured from the document.
        #[arg(long)]
        competency: Option<String>,

        /// Run the pipeline and print the report without storing.
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Re-validate a stored course.
    Validate {
        /// Course id.
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Print a stored course as JSON.
    Get {
        /// Course id.
        id: String,
    },

    /// List stored courses.
    List,

    /// Search stored courses and the methodology corpus.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Only return entities of this course (methodology entries stay).
        #[arg(long)]
        course: Option<String>,

        /// Leave the methodology corpus out of the index.
        #[arg(long)]
        no_methodology: bool,

        #[arg(long)]
        json: bool,
    },

    /// Recover a JSON object from saved generation output.
    Recover {
        /// Input file, or `-` for stdin.
        file: PathBuf,

        /// Print single-line JSON.
        #[arg(long)]
        compact: bool,
    },

    /// Generate structured content for one module, grounded in the index.
    Generate {
        /// Course id.
        course: String,
        /// Module name (accent- and case-insensitive).
        module: String,
        /// What to generate.
        instruction: String,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "cur", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Recover { file, compact } => {
            recover_cmd::run_recover(file, *compact)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            name,
            spreadsheet,
            document,
            competency,
            dry_run,
            json,
        } => {
            let req = ingest::IngestRequest {
                name,
                spreadsheet,
                document,
                competency,
                dry_run,
            };
            let report = ingest::run_ingest(&cfg, &req).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ingest::print_report(&report);
            }
            if !report.validation.valid {
                std::process::exit(1);
            }
        }
        Commands::Validate { id, json } => {
            let report = get::run_validate(&cfg, &id, json).await?;
            if !report.valid {
                std::process::exit(1);
            }
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::List => {
            get::run_list(&cfg).await?;
        }
        Commands::Search {
            query,
            limit,
            course,
            no_methodology,
            json,
        } => {
            let opts = search::SearchOptions {
                limit,
                course,
                no_methodology,
            };
            search::run_search(&cfg, &query, &opts, json).await?;
        }
        Commands::Generate {
            course,
            module,
            instruction,
        } => {
            generation::run_generate(&cfg, &course, &module, &instruction).await?;
        }
        Commands::Completions { .. } | Commands::Recover { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
