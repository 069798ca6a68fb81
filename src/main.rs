use application_etl::core::evaluation::RequiredFieldsEvaluator;
use application_etl::core::json_source::JsonSourceReader;
use application_etl::domain::model::PatternTable;
use application_etl::utils::error::ErrorSeverity;
use application_etl::utils::{logger, validation::Validate};
use application_etl::{
    ApplicationPipeline, EtlEngine, EtlError, GitHubRepository, LocalStorage, RepoRef, TomlConfig,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "application-etl")]
#[command(about = "Pair application images with their JSON data and build a field report")]
struct Args {
    /// Path to the TOML pipeline configuration
    #[arg(short, long, default_value = "pipeline.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override the monitoring setting from the config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show what would be processed without touching the network
    #[arg(long)]
    dry_run: bool,
}

fn exit_with(e: &EtlError) -> ! {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting application-etl");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        exit_with(&e);
    }
    tracing::info!("✅ Configuration loaded and validated");

    display_config_summary(&config, &args);

    if args.dry_run {
        perform_dry_run(&config);
        return;
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let token_env = Some(config.token_env());
    let repository = match GitHubRepository::from_env(&config.source.repository, token_env) {
        Ok(repository) => repository
            .with_api_base_url(config.api_base_url())
            .with_raw_base_url(config.raw_base_url())
            .with_timeout(config.timeout()),
        Err(e) => exit_with(&e),
    };

    let mut pipeline = match ApplicationPipeline::new(
        LocalStorage::new(config.load.output_path.clone()),
        repository,
        config.clone(),
    ) {
        Ok(pipeline) => {
            pipeline.with_reader(JsonSourceReader::default().with_timeout(config.timeout()))
        }
        Err(e) => exit_with(&e),
    };

    if let Some(required_fields) = config.required_fields() {
        match RequiredFieldsEvaluator::new(required_fields.to_vec()) {
            Ok(evaluator) => pipeline = pipeline.with_evaluator(Box::new(evaluator)),
            Err(e) => exit_with(&e),
        }
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);
    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => exit_with(&e),
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("-")
    );
    println!(
        "  Source: {} ({}:{})",
        config.source.repository,
        config.branch(),
        config.source.folder
    );
    if let Some(dir) = &config.source.download_dir {
        println!("  Download to: {}", dir);
    }
    println!("  Patterns: {}", config.extract.patterns_file);
    println!("  Output: {}", config.load.output_path);
    println!("  Formats: {}", config.load.output_formats.join(", "));
    println!("  Concurrent Requests: {}", config.concurrent_requests());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();
    println!("📡 Listing endpoint:");
    println!(
        "  {}/repos/{}/contents/{}?ref={}",
        config.api_base_url(),
        RepoRef::parse(&config.source.repository)
            .map(|r| r.full_name())
            .unwrap_or_else(|_| config.source.repository.clone()),
        config.source.folder,
        config.branch()
    );

    println!();
    match PatternTable::from_file(&config.extract.patterns_file) {
        Ok(patterns) => {
            println!("🔄 Extracted fields ({}):", patterns.len());
            for (field, expression) in patterns.iter() {
                println!("  {} <- {}", field, expression);
            }
        }
        Err(e) => exit_with(&e),
    }

    if let Some(required_fields) = config.required_fields() {
        println!();
        println!("✅ Required fields: {}", required_fields.join(", "));
    }

    println!();
    println!("✅ Dry run analysis complete.");
}
