use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use nobg_service::models::{ErrorResponse, HealthResponse, RemovalResponse};
use nobg_service::upload::{allowed_file, ArtifactNames};
use nobg_service::ArtifactStorage;
use prettytable::{Cell, Row, Table};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;

const API_URL: &str = "http://localhost:5000";
const UPLOAD_DIR: &str = "static/uploads";

#[derive(Parser)]
#[command(name = "nobg")]
#[command(about = "Remove image backgrounds and manage stored artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Upload an image and download it without background")]
    Remove {
        #[arg(short, long, help = "Image to process (png, jpg, jpeg, webp, bmp)")]
        file: PathBuf,

        #[arg(short, long, help = "Where to write the PNG result")]
        output: Option<PathBuf>,

        #[arg(short, long, default_value = API_URL, help = "Service base URL")]
        server: String,
    },

    #[command(about = "Check that the service is up")]
    Health {
        #[arg(short, long, default_value = API_URL, help = "Service base URL")]
        server: String,
    },

    #[command(about = "List stored artifacts")]
    Artifacts {
        #[arg(short, long, default_value = UPLOAD_DIR, help = "Upload directory")]
        dir: PathBuf,
    },

    #[command(about = "Delete artifacts older than the retention period")]
    Sweep {
        #[arg(short, long, default_value = UPLOAD_DIR, help = "Upload directory")]
        dir: PathBuf,

        #[arg(short, long, default_value_t = 3600, help = "Retention in seconds")]
        retention_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(cli.command).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Remove { file, output, server } => remove_background(&file, output, &server).await,
        Commands::Health { server } => health(&server).await,
        Commands::Artifacts { dir } => list_artifacts(dir).await,
        Commands::Sweep { dir, retention_secs } => sweep(dir, retention_secs).await,
    }
}

async fn remove_background(file: &Path, output: Option<PathBuf>, server: &str) -> Result<()> {
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Input path has no file name")?;
    if !allowed_file(&file_name) {
        bail!("{} is not a png, jpg, jpeg, webp or bmp file", file_name);
    }

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let form = Form::new().part("image", Part::bytes(bytes).file_name(file_name.clone()));

    let client = reqwest::Client::new();
    println!("⏳ Uploading {} ...", file_name);
    let response = client
        .post(format!("{}/remove-bg", server))
        .header(reqwest::header::ACCEPT, "application/json")
        .multipart(form)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| status.to_string());
        bail!("Failed to remove background: {}", message);
    }

    let result: RemovalResponse = response.json().await?;
    let download = client
        .get(format!("{}{}", server, result.download_url))
        .send()
        .await?;
    if !download.status().is_success() {
        bail!("Failed to download result: HTTP {}", download.status());
    }
    let png = download.bytes().await?;

    let output = output.unwrap_or_else(|| PathBuf::from(ArtifactNames::from_core(&result.filename).download_name()));
    tokio::fs::write(&output, &png)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✅ Background removed!");
    println!("   Stored as: {}", result.filename);
    println!("   Saved to:  {}", output.display());
    Ok(())
}

async fn health(server: &str) -> Result<()> {
    let response = reqwest::Client::new()
        .get(format!("{}/health", server))
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("Service answered HTTP {}", response.status());
    }

    let health: HealthResponse = response.json().await?;
    println!("💚 {} at {}", health.status, health.timestamp);
    Ok(())
}

async fn list_artifacts(dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        println!("📭 No upload directory at {}.", dir.display());
        return Ok(());
    }
    let storage = ArtifactStorage::open(dir, Duration::from_secs(3600)).await?;
    let artifacts = storage.list().await?;

    if artifacts.is_empty() {
        println!("📭 No artifacts found in {}.", storage.dir().display());
        return Ok(());
    }

    println!("\n📁 Artifacts in {} ({})\n", storage.dir().display(), artifacts.len());

    let now = Utc::now();
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Kind"),
        Cell::new("Name"),
        Cell::new("Size"),
        Cell::new("Age"),
    ]));

    for artifact in artifacts {
        let age = artifact.age(now).num_seconds().max(0);
        table.add_row(Row::new(vec![
            Cell::new(artifact.kind.as_str()),
            Cell::new(&artifact.file_name),
            Cell::new(&format!("{} B", artifact.size)),
            Cell::new(&format!("{}m {:02}s", age / 60, age % 60)),
        ]));
    }

    table.printstd();
    println!();
    Ok(())
}

async fn sweep(dir: PathBuf, retention_secs: u64) -> Result<()> {
    let storage = ArtifactStorage::open(dir, Duration::from_secs(retention_secs)).await?;
    let report = storage.sweep().await;

    println!("🗑️  Sweep of {} finished", storage.dir().display());
    println!("   Scanned: {}", report.scanned);
    println!("   Removed: {}", report.removed);
    if report.failed > 0 {
        println!("   ⚠️  Failed: {}", report.failed);
    }
    Ok(())
}
