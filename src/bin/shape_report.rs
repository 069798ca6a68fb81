use anyhow::Context;
use application_etl::core::report::{from_jsonl, shape, write_report, ReportFormat};
use application_etl::utils::logger;
use application_etl::LocalStorage;
use clap::Parser;

/// Flattens `extracted_data` / `eval_data` columns of an evaluated JSONL dataset.
#[derive(Parser)]
#[command(name = "shape-report")]
struct Args {
    /// JSONL file with one evaluated row per line
    #[arg(short, long)]
    input: String,

    /// Directory the shaped report is written to
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Output formats
    #[arg(short, long, value_delimiter = ',', default_value = "jsonl")]
    format: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let formats = args
        .format
        .iter()
        .map(|f| f.parse::<ReportFormat>())
        .collect::<Result<Vec<_>, _>>()?;

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input))?;
    let table = from_jsonl(&bytes)?;
    tracing::info!("Loaded {} rows from {}", table.len(), args.input);

    let shaped = shape(table)?;
    tracing::info!("Shaped report has {} columns", shaped.columns().len());

    let storage = LocalStorage::new(args.output_dir.clone());
    for path in write_report(&storage, &shaped, &formats).await? {
        println!("📁 Report saved to: {}", path);
    }
    Ok(())
}
