use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::conversations::handle_conversations_list;
use commands::report::{handle_export, handle_summary, handle_table};
use logging::setup_logging;

#[derive(Parser)]
#[command(author, version, about = "Evaluation reports, datasets and saved conversations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect saved evaluation runs
    #[command(subcommand)]
    Report(ReportCommand),

    /// Work with saved conversations
    #[command(subcommand)]
    Conversations(ConversationsCommand),
}

#[derive(Subcommand)]
enum ReportCommand {
    #[command(about = "Render one dataset's results as a LaTeX table")]
    Table {
        #[arg(long, value_name = "DIR", help = "Directory containing saved runs")]
        base_dir: PathBuf,

        #[arg(long, value_name = "RUN_ID", help = "Run to load")]
        run_id: String,

        #[arg(long, value_name = "DATASET_ID", help = "Dataset to render")]
        dataset: String,

        #[arg(
            long,
            value_name = "NAMES",
            value_delimiter = ',',
            help = "Score columns to include (default: all)"
        )]
        scores: Option<Vec<String>>,

        #[arg(long, help = "Leave out the token and cost columns")]
        no_metrics: bool,
    },

    #[command(about = "Render the per-dataset summary table for a run")]
    Summary {
        #[arg(long, value_name = "DIR", help = "Directory containing saved runs")]
        base_dir: PathBuf,

        #[arg(long, value_name = "RUN_ID", help = "Run to load")]
        run_id: String,

        #[arg(
            long,
            value_name = "NAMES",
            value_delimiter = ',',
            help = "Score columns to include (default: all)"
        )]
        scores: Option<Vec<String>>,

        #[arg(long, help = "Leave out the token and cost columns")]
        no_metrics: bool,
    },

    #[command(about = "Export a run as CSV")]
    Export {
        #[arg(long, value_name = "DIR", help = "Directory containing saved runs")]
        base_dir: PathBuf,

        #[arg(long, value_name = "RUN_ID", help = "Run to load")]
        run_id: String,

        #[arg(short, long, value_name = "FILE", help = "Destination CSV file")]
        output: PathBuf,

        #[arg(long, help = "One row per dataset instead of one per case")]
        aggregate: bool,
    },
}

#[derive(Subcommand)]
enum ConversationsCommand {
    #[command(about = "List saved conversations, newest first")]
    List {
        #[arg(
            long,
            value_name = "DIR",
            default_value = "saved_conversations",
            help = "Directory of saved conversations"
        )]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Report(report) => match report {
            ReportCommand::Table {
                base_dir,
                run_id,
                dataset,
                scores,
                no_metrics,
            } => handle_table(&base_dir, &run_id, &dataset, scores.as_deref(), !no_metrics),
            ReportCommand::Summary {
                base_dir,
                run_id,
                scores,
                no_metrics,
            } => handle_summary(&base_dir, &run_id, scores.as_deref(), !no_metrics),
            ReportCommand::Export {
                base_dir,
                run_id,
                output,
                aggregate,
            } => handle_export(&base_dir, &run_id, &output, aggregate),
        },
        Command::Conversations(ConversationsCommand::List { dir }) => {
            handle_conversations_list(&dir)
        }
    }
}
