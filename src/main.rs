//! Command-line host for the Folio gateway.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fg_app::{PreloadScheduler, PreloadTick, RequestOptions};
use fg_core::http::HttpMethod;
use fg_core::response::GatewayResponse;
use fg_core::upload::UploadFile;
use folio_gateway::bootstrap::{self, GatewayRuntime};

#[derive(Parser)]
#[command(name = "folio-gateway")]
#[command(about = "Signed, caching client for the Folio API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct GlobalArgs {
    /// Config file path (default: <config dir>/folio-gateway/config.toml)
    #[arg(long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,

    /// Treat the network as offline; uploads go to the queue
    #[arg(long, global = true)]
    offline: bool,

    /// Cookie to seed the jar with, e.g. "csrf_token=abc"
    #[arg(long, global = true)]
    cookie: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a backend path through the cache
    Get {
        path: String,
        /// Skip the cache for this request
        #[arg(long)]
        no_cache: bool,
    },
    /// Send a mutation
    Send {
        #[arg(value_enum)]
        method: Method,
        path: String,
        /// JSON body
        #[arg(long)]
        body: Option<String>,
    },
    /// Upload an image, queueing it when the backend cannot be reached
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "uploads")]
        folder: String,
        /// MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// List queued uploads
    Pending,
    /// Replay queued uploads now
    Replay,
    /// Drop expired cache entries
    Sweep,
    /// Warm the image registry with the configured preload list
    Preload,
    /// Keep running with background replay, sweeping and preloading until Ctrl-C
    Run,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Post,
    Put,
    Delete,
}

impl From<Method> for HttpMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Post => HttpMethod::Post,
            Method::Put => HttpMethod::Put,
            Method::Delete => HttpMethod::Delete,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { global, command } = Cli::parse();

    let config = bootstrap::resolve_config(global.config.clone())?;
    bootstrap::tracing::init_tracing_subscriber(Some(config.storage.log_dir.as_path()))?;

    let mut runtime = bootstrap::wire_dependencies(&config).await?;
    runtime.start().await?;
    runtime.network().set_online(!global.offline);
    for cookie in &global.cookie {
        runtime.add_cookie(cookie);
    }

    let result = run_command(&mut runtime, command).await;
    runtime.shutdown().await?;
    result
}

async fn run_command(runtime: &mut GatewayRuntime, command: Commands) -> Result<()> {
    let client = runtime.client().clone();
    match command {
        Commands::Get { path, no_cache } => {
            let options = if no_cache {
                RequestOptions::uncached()
            } else {
                RequestOptions::default()
            };
            let response = client.get(&path, options).await?;
            print_response(&response)
        }
        Commands::Send { method, path, body } => {
            let body = body
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("--body is not valid JSON")?;
            let response = client
                .request(method.into(), &path, body, RequestOptions::default())
                .await?;
            print_response(&response)
        }
        Commands::Upload { file, folder, mime } => {
            let file = read_upload_file(&file, mime).await?;
            let outcome = client.upload_image(file, &folder).await?;
            print_json(&json!({
                "url": outcome.url,
                "pending": outcome.pending,
                "fromCache": outcome.from_cache,
                "pendingId": outcome.pending_id.map(|id| id.to_string()),
                "cancelled": outcome.cancelled,
            }))
        }
        Commands::Pending => {
            let pending = client.uploads().list_pending().await?;
            let rows: Vec<Value> = pending
                .iter()
                .map(|upload| {
                    json!({
                        "id": upload.id.to_string(),
                        "fileName": upload.file_name,
                        "mimeType": upload.mime_type,
                        "folder": upload.folder,
                        "bytes": upload.payload.len(),
                        "attempts": upload.attempt_count,
                        "createdAt": format_timestamp(upload.created_at_ms),
                    })
                })
                .collect();
            print_json(&Value::Array(rows))
        }
        Commands::Replay => {
            let report = client.replay_pending_uploads().await?;
            print_json(&json!({
                "replayed": report.replayed,
                "failed": report.failed,
                "remaining": report.remaining,
            }))
        }
        Commands::Sweep => {
            let report = client.sweep().await?;
            print_json(&json!({
                "memoryRemoved": report.memory_removed,
                "persistedRemoved": report.persisted_removed,
                "persistedSwept": report.persisted_swept,
            }))
        }
        Commands::Preload => {
            let preload = &runtime.config().preload;
            let scheduler = PreloadScheduler::new(
                client,
                preload.urls.clone(),
                Duration::from_millis(preload.interval_ms),
            );
            let mut fetched = 0usize;
            let mut skipped = 0usize;
            let mut failed = 0usize;
            loop {
                match scheduler.run_once().await {
                    PreloadTick::Fetched(_) => fetched += 1,
                    PreloadTick::Skipped(_) => skipped += 1,
                    PreloadTick::Failed(_) => failed += 1,
                    PreloadTick::Yielded => {}
                    PreloadTick::Exhausted => break,
                }
            }
            print_json(&json!({ "fetched": fetched, "skipped": skipped, "failed": failed }))
        }
        Commands::Run => {
            runtime.spawn_background_tasks();
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    }
}

async fn read_upload_file(path: &Path, mime: Option<String>) -> Result<UploadFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let last_modified_ms = tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map(|time| chrono::DateTime::<chrono::Utc>::from(time).timestamp_millis())
        .unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime_type = mime.unwrap_or_else(|| guess_mime(&file_name).to_string());

    Ok(UploadFile {
        file_name,
        mime_type,
        bytes,
        last_modified_ms,
    })
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn print_response(response: &GatewayResponse) -> Result<()> {
    tracing::debug!(source = ?response.source, "request finished");
    print_json(&response.data)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
