//! Venezuela R011 Direct Cleaning - command line
//!
//! Offline counterpart of the API server:
//! - `clean` runs the workbook cleaning on a local file
//! - `check` verifies BigQuery and Cloud Storage access with the configured credentials

use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vzla_cleaning::providers::build_http_client;
use vzla_cleaning::utils::constants::PROCESSED_PREFIX;
use vzla_cleaning::{
    is_excel_filename, process_excel_file, secure_filename, test_bigquery_connection,
    test_storage_connection, CredentialResolver, ServerConfig, UploadContext,
};

#[derive(Parser)]
#[command(name = "vzla_cleaning")]
#[command(version, about = "Clean Venezuela R011 Excel workbooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop fully empty rows from a workbook
    Clean {
        /// Input workbook (.xlsx or .xls)
        input: PathBuf,
        /// Output path (default: processed_<name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Test BigQuery and Cloud Storage connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clean { input, output } => clean(&input, output).await,
        Commands::Check => check().await,
    }
}

async fn clean(input: &Path, output: Option<PathBuf>) -> Result<()> {
    let raw_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("Input path has no usable file name: {}", input.display()))?;
    if !is_excel_filename(raw_name) {
        bail!("Please provide an Excel file (.xlsx or .xls), got {}", raw_name);
    }

    let filename = secure_filename(raw_name);
    let output = output
        .unwrap_or_else(|| input.with_file_name(format!("{}{}", PROCESSED_PREFIX, filename)));

    let content = tokio::fs::read(input)
        .await
        .wrap_err_with(|| format!("Could not read {}", input.display()))?;

    let processed =
        tokio::task::spawn_blocking(move || process_excel_file(&content, &filename)).await??;

    tokio::fs::write(&output, &processed.content)
        .await
        .wrap_err_with(|| format!("Could not write {}", output.display()))?;

    let (rows, cols) = processed.table.shape();
    info!(
        "✅ Wrote {} ({} rows x {} columns, {} empty rows dropped)",
        output.display(),
        rows,
        cols,
        processed.dropped_rows
    );
    Ok(())
}

async fn check() -> Result<()> {
    let config = ServerConfig::from_env();
    let http = build_http_client()?;
    let resolver = CredentialResolver::from_config(&config, http.clone());
    let credentials = resolver.resolve().await?;

    info!("🔑 Credentials: {}", credentials.kind());
    let ctx = UploadContext::new(http, credentials, config.endpoints, config.bigquery_job_timeout);

    let (bigquery_ok, bigquery_message) = test_bigquery_connection(&ctx).await;
    println!("{} {}", if bigquery_ok { "✅" } else { "❌" }, bigquery_message);

    let (storage_ok, storage_message) = test_storage_connection(&ctx).await;
    println!("{} {}", if storage_ok { "✅" } else { "❌" }, storage_message);

    if !(bigquery_ok && storage_ok) {
        bail!("Connection check failed");
    }
    Ok(())
}
