//! Command dispatcher that routes parsed CLI commands to their handlers.
//!
//! Handlers are blocking; the binary runs them off the async runtime so the
//! Ctrl+C listener stays responsive.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use tracing::{info, warn};

use crate::cli::formatters;
use crate::cli::{Commands, MappingCommands};
use crate::config::AppConfig;
use crate::export;
use crate::importers::{run_batch, BatchOptions, CancellationToken};
use crate::mapping::collector::{collect_descriptions, write_descriptions};
use crate::mapping::generator::{generate, MappingStores};
use crate::mapping::review::review;
use crate::mapping::sanitizer::{apply_fixes, default_report_path, SanitizeReport, TickerSanitizer};
use crate::mapping::{normalize_description, B3RegistryLookup, MappingFiles, OfflineLookup, TickerLookup};
use crate::tickers::{FallbackTable, TickerMapping, TickerResolver};
use crate::ui::progress::DocumentProgress;

/// Route a parsed command to its handler
pub fn dispatch_command(
    command: Commands,
    config: &AppConfig,
    token: &CancellationToken,
    quiet: bool,
) -> Result<()> {
    match command {
        Commands::Extract { year, .. } => dispatch_extract(config, year, token, quiet),
        Commands::Mapping { action } => dispatch_mapping(action, config, quiet),
    }
}

fn dispatch_extract(
    config: &AppConfig,
    year: Option<i32>,
    token: &CancellationToken,
    quiet: bool,
) -> Result<()> {
    info!("Extracting notes from {:?}", config.input_folder);

    let mapping = TickerMapping::load(&config.mapping_file)?;
    if mapping.is_empty() {
        warn!(
            "Mapping file {:?} is empty or missing; only direct tickers and the built-in table will resolve",
            config.mapping_file
        );
    }
    let resolver = TickerResolver::new(FallbackTable::default(), Some(&mapping));

    let options = BatchOptions {
        year,
        password: config.pdf_password.clone(),
    };
    let progress = DocumentProgress::new(quiet);
    let outcome = run_batch(&config.input_folder, &options, &resolver, token, &|event| {
        progress.handle(event)
    })?;

    println!("{}", formatters::format_batch_summary(&outcome));

    match export::export(&outcome.transactions, config.output_format, &config.output_folder)? {
        Some(path) => println!(
            "{} Exported {} operation(s) to {}",
            "✓".green().bold(),
            outcome.transactions.len(),
            path.display()
        ),
        None => println!("{} No operations found, nothing exported", "ℹ".blue().bold()),
    }
    Ok(())
}

fn dispatch_mapping(action: MappingCommands, config: &AppConfig, quiet: bool) -> Result<()> {
    let files = MappingFiles::beside(&config.mapping_file);

    match action {
        MappingCommands::Collect { year, output, .. } => {
            let progress = DocumentProgress::new(quiet);
            let collection = collect_descriptions(
                &config.input_folder,
                year,
                config.pdf_password.as_deref(),
                &|event| progress.handle(event),
            )?;

            for description in &collection.descriptions {
                println!("{}", description);
            }
            print!("{}", formatters::format_skipped(&collection.skipped));
            println!(
                "\n{} {} unique description(s) in {} document(s)",
                "✓".green().bold(),
                collection.descriptions.len(),
                collection.documents
            );

            if let Some(path) = output {
                write_descriptions(&path, &collection.descriptions)?;
                println!("Saved to {}", path.display());
            }
            Ok(())
        }

        MappingCommands::Generate {
            year,
            online,
            descriptions,
            ..
        } => {
            let descriptions: Vec<String> = if descriptions.is_empty() {
                let progress = DocumentProgress::new(quiet);
                let collection = collect_descriptions(
                    &config.input_folder,
                    year,
                    config.pdf_password.as_deref(),
                    &|event| progress.handle(event),
                )?;
                print!("{}", formatters::format_skipped(&collection.skipped));
                collection.descriptions
            } else {
                descriptions.iter().map(|d| normalize_description(d)).collect()
            };

            let lookup = lookup_for(online);
            let mut stores = MappingStores::load(&files)?;
            let summary = generate(descriptions, &mut stores, lookup.as_ref());
            stores.persist(&files)?;

            println!("{}", formatters::format_generate_summary(&summary));
            println!(
                "{} {} new mapping(s) saved to {}",
                "✓".green().bold(),
                summary.added(),
                files.mapping.display()
            );
            if summary.unmapped > 0 {
                println!(
                    "Fill in {} and run `corretagem mapping review`",
                    files.unmapped.display()
                );
            }
            Ok(())
        }

        MappingCommands::Sanitize { fix, report, online } => {
            let mapping = TickerMapping::load(&files.mapping)?;
            let lookup = lookup_for(online);
            let sanitizer = TickerSanitizer::new(lookup.as_ref());
            let result = sanitizer.sanitize(&mapping, fix);

            print!("{}", formatters::format_sanitize_report(&result));

            if fix {
                let changed = apply_fixes(&files.mapping, &result.fixes)?;
                println!("{} Corrected {} line(s)", "✓".green().bold(), changed);
            }
            if report {
                write_report(&files.mapping, &result)?;
            }
            Ok(())
        }

        MappingCommands::Review => {
            let summary = review(&files)?;
            println!("{}", formatters::format_review_summary(&summary));
            Ok(())
        }
    }
}

fn lookup_for(online: bool) -> Box<dyn TickerLookup> {
    if online {
        Box::new(B3RegistryLookup::new())
    } else {
        Box::new(OfflineLookup)
    }
}

fn write_report(mapping: &Path, result: &SanitizeReport) -> Result<()> {
    let path = default_report_path(mapping);
    let rows = result.write_csv(&path)?;
    println!("Report with {} row(s) written to {}", rows, path.display());
    Ok(())
}
