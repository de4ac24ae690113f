use bulk_buy::app::report::{self, ReportWriter};
use bulk_buy::app::shopping_list;
use bulk_buy::domain::ports::AliasResolver;
use bulk_buy::utils::error::{BulkError, ErrorSeverity};
use bulk_buy::utils::{logger, validation::Validate};
use bulk_buy::{BulkBuyEngine, CliConfig, InMemoryAliasLibrary, LocalStorage};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting bulk-buy");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ bulk-buy failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> bulk_buy::Result<()> {
    cli.validate()?;
    let config = cli.resolve()?;
    if config.sources.is_empty() {
        return Err(BulkError::MissingConfigError {
            field: "sources".to_string(),
        });
    }

    let aliases = match &cli.aliases {
        Some(path) => {
            let library = InMemoryAliasLibrary::load(path)?;
            tracing::info!(cards = library.card_count(), "loaded alias library");
            Some(library)
        }
        None => None,
    };

    let text = tokio::fs::read_to_string(&cli.from).await?;
    let request = shopping_list::parse_request(
        &text,
        config.delivery_fee(),
        aliases.as_ref().map(|a| a as &dyn AliasResolver),
    )?;

    let mut engine = BulkBuyEngine::new(config.build_sources()?)
        .with_max_concurrent(config.max_concurrent_fetches())
        .with_search(config.search_mode()?, config.max_exact_nodes());
    if let Some(deadline) = config.deadline() {
        engine = engine.with_timeout(deadline);
    }
    tracing::info!(sources = ?engine.source_names(), "engine ready");

    let result = engine.process(&request).await?;

    println!("Cheapest offers per item:");
    println!("{}", report::render_plan(&result.greedy));
    if let Some(delivery) = &result.delivery {
        println!("With delivery ({} per seller):", request.delivery_fee());
        println!("{}", report::render_delivery(delivery));
    }
    println!("Who has what:");
    println!("{}", report::render_possession_text(&result.possession_table()));

    if cli.dry_run {
        tracing::info!("Dry run, report bundle not written");
        return Ok(());
    }

    let writer = ReportWriter::new(
        LocalStorage::new(config.output_path()),
        config.bundle_name(),
        config.output_formats()?,
    );
    let path = writer.write(&result).await?;
    tracing::info!("✅ Report saved to: {}/{}", config.output_path(), path);
    println!("📁 Report saved to: {}/{}", config.output_path(), path);
    Ok(())
}
