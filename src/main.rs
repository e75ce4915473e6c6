mod cli;

use pixluna::{
    acquisition::{Acquirer, AcquisitionResult},
    config,
    http::HttpClient,
    source::ProviderRegistry,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is loaded before logging so `debug_log` can raise the level.
    let config = match &cli.command {
        Commands::Validate { .. } | Commands::Version => None,
        _ => Some(config::load_config_or_default(cli.config.as_deref())?),
    };

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        let debug = cli.verbose || config.as_ref().is_some_and(|c| c.debug_log);
        if debug {
            "pixluna=debug,pixluna_common=debug".to_string()
        } else {
            "pixluna=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Fetch {
            tag,
            count,
            source,
            out,
        } => {
            let acquirer = build_acquirer(config.unwrap_or_default())?;
            let rt = tokio::runtime::Runtime::new()?;
            let results = rt
                .block_on(acquirer.acquire_batch(tag.as_deref(), count, source.as_deref()))
                .context("Failed to start batch")?;
            report(&results, &out)
        }
        Commands::Pixiv {
            pid,
            page,
            all,
            out,
        } => {
            let acquirer = build_acquirer(config.unwrap_or_default())?;
            let rt = tokio::runtime::Runtime::new()?;
            let results = rt
                .block_on(acquirer.acquire_pixiv_pages(&pid, page, all))
                .with_context(|| format!("Failed to fetch pixiv work {pid}"))?;
            report(&results, &out)
        }
        Commands::Sources => {
            let registry = ProviderRegistry::with_builtin();
            let defaults = config
                .map(|c| c.default_source_provider)
                .unwrap_or_default();
            for (alias, description) in registry.describe() {
                let marker = if defaults.contains(&alias) { "*" } else { " " };
                println!("{marker} {alias:<12} {description}");
            }
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("pixluna {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_acquirer(config: config::Config) -> Result<Acquirer> {
    let http = HttpClient::from_config(&config).context("Failed to build HTTP client")?;
    let registry = Arc::new(ProviderRegistry::with_builtin());
    Ok(Acquirer::new(registry, Arc::new(config), http))
}

/// Write each success to `out` and print one line per result.
fn report(results: &[AcquisitionResult], out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory: {}", out.display()))?;

    let mut sorted: Vec<&AcquisitionResult> = results.iter().collect();
    sorted.sort_by_key(|r| r.index());

    for result in sorted {
        match result {
            AcquisitionResult::Success { index, image } => {
                let path = out.join(image.file_name(*index));
                std::fs::write(&path, &image.data)
                    .with_context(|| format!("Failed to write image file: {}", path.display()))?;
                println!(
                    "✓ [{}] {} by {} ({}, {} bytes) -> {}",
                    index,
                    image.metadata.title,
                    image.metadata.author,
                    image.content_type,
                    image.data.len(),
                    path.display()
                );
                if let Some(notice) = &image.notice {
                    println!("    note: {notice}");
                }
            }
            AcquisitionResult::Error {
                index,
                kind,
                message,
            } => {
                println!("✗ [{index}] {kind}: {message}");
            }
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Max concurrency: {}", config.max_concurrency);
    println!(
        "  Default sources: {}",
        config.default_source_provider.join(", ")
    );
    println!(
        "  Adult content: {} (p = {})",
        config.is_r18, config.r18_probability
    );
    println!("  Flip mode: {}", config.image_processing.flip_mode);
    println!(
        "  Confusion: {}, compress: {} (level {})",
        config.image_processing.confusion,
        config.image_processing.compress,
        config.image_processing.compression_level
    );
    println!("  Proxy: {}", if config.proxy.enabled { config.proxy.host.as_str() } else { "disabled" });

    Ok(())
}
