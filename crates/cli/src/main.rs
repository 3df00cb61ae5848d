//! Command-line front end for cidfan.

use anyhow::{Context, Result, bail};
use cidfan_core::config::AppConfig;
use cidfan_core::input::{DEFAULT_GLOB_PATTERN, DirectoryInput, FileInput, UploadInput};
use cidfan_core::{AggregateUploadResult, encode_entries, rewrite_root};
use cidfan_proxy::extract_pin_candidates;
use cidfan_uploader::{Backend, FanoutUploader, backends_from_config};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use futures::{StreamExt, stream};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Largest header `car --output` needs to patch.
const HEADER_PATCH_WINDOW: u64 = 256;

#[derive(Parser)]
#[command(name = "cidfan")]
#[command(about = "Upload content to every configured content-addressed backend")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CIDFAN_CONFIG", default_value = "cidfan.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload to every configured backend and print the aggregate result
    Upload {
        #[command(subcommand)]
        command: UploadCommands,
    },
    /// Pack a directory into a CAR archive and print its root CID
    Car {
        /// Directory to pack
        dir: PathBuf,
        /// Glob pattern selecting files under the directory
        #[arg(long, default_value = DEFAULT_GLOB_PATTERN)]
        pattern: String,
        /// Write the archive here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the pin candidates of a saved node add response
    Pins {
        /// NDJSON add response
        file: PathBuf,
        /// The add request used wrap-with-directory
        #[arg(long, default_value_t = false)]
        wrap: bool,
    },
    /// List configured backends
    Backends {
        /// Check each backend and report whether it is reachable
        #[arg(long, default_value_t = false)]
        check: bool,
    },
}

#[derive(Subcommand)]
enum UploadCommands {
    /// Upload one file
    File { path: PathBuf },
    /// Upload text as text.txt
    Text {
        /// Text to upload; `-` reads stdin
        content: String,
    },
    /// Upload a JSON value as data.json
    Json {
        /// JSON document; `-` reads stdin
        value: String,
    },
    /// Upload a directory
    Dir {
        path: PathBuf,
        #[arg(long, default_value = DEFAULT_GLOB_PATTERN)]
        pattern: String,
        /// Name for the uploaded directory
        #[arg(long)]
        name: Option<String>,
    },
    /// Download a URL and upload its body
    Url { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Upload { command } => handle_upload_command(&config, command).await,
        Commands::Car {
            dir,
            pattern,
            output,
        } => handle_car_command(&config, &dir, &pattern, output.as_deref()).await,
        Commands::Pins { file, wrap } => handle_pins_command(&file, wrap),
        Commands::Backends { check } => handle_backends_command(&config, check).await,
    }
}

/// Load configuration: optional TOML file, then `CIDFAN_` environment.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("CIDFAN_").split("__"));

    let config: AppConfig = figment
        .extract()
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    Ok(config)
}

fn read_arg_or_stdin(value: String) -> Result<String> {
    if value != "-" {
        return Ok(value);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

fn upload_input(command: UploadCommands) -> Result<UploadInput> {
    Ok(match command {
        UploadCommands::File { path } => UploadInput::File(FileInput::path(path)),
        UploadCommands::Text { content } => UploadInput::Text(read_arg_or_stdin(content)?),
        UploadCommands::Json { value } => {
            let raw = read_arg_or_stdin(value)?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("argument is not valid JSON")?;
            UploadInput::Json(value)
        }
        UploadCommands::Dir {
            path,
            pattern,
            name,
        } => {
            let mut input = DirectoryInput::path(path).with_pattern(pattern);
            if let Some(name) = name {
                input = input.with_name(name);
            }
            UploadInput::Directory(input)
        }
        UploadCommands::Url { url } => UploadInput::Url(url),
    })
}

async fn handle_upload_command(config_path: &Path, command: UploadCommands) -> Result<()> {
    let config = load_config(config_path)?;
    let input = upload_input(command)?;

    let backends = backends_from_config(&config)
        .await
        .context("failed to build backends")?;
    let token = CancellationToken::new();
    let fanout = FanoutUploader::new(backends)
        .context("no usable backends configured")?
        .with_fs_access(config.fs_access())
        .with_cancellation(token.clone());

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling pending uploads");
            ctrl_c.cancel();
        }
    });

    let result = fanout.upload(input).await?;
    print_aggregate(&result)?;
    if !result.success {
        bail!(
            "no backend succeeded: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_aggregate(result: &AggregateUploadResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}

async fn handle_car_command(
    config_path: &Path,
    dir: &Path,
    pattern: &str,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?.encoder;
    let resolved = DirectoryInput::path(dir)
        .with_pattern(pattern)
        .resolve()
        .await
        .with_context(|| format!("failed to read {}", dir.display()))?;

    let Some(output) = output else {
        let archive = cidfan_core::pack(resolved.entries, config).await?;
        println!("{}", archive.root);
        return Ok(());
    };

    let entries = stream::iter(resolved.entries.into_iter().map(Ok));
    let (mut archive, root) = encode_entries(entries, config);

    let mut file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = archive.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    let root = root.await?;
    let output_path = output.to_path_buf();
    tokio::task::spawn_blocking(move || patch_header(&output_path, &root, written))
        .await
        .context("header patch task failed")??;

    tracing::info!(root = %root, bytes = written, path = %output.display(), "archive written");
    println!("{root}");
    Ok(())
}

/// Rewrite the placeholder root at the start of a written archive.
fn patch_header(path: &Path, root: &cidfan_core::Cid, written: u64) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to reopen {}", path.display()))?;
    let mut head = vec![0u8; written.min(HEADER_PATCH_WINDOW) as usize];
    file.read_exact(&mut head)?;
    rewrite_root(&mut head, root)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&head)?;
    file.sync_all()?;
    Ok(())
}

fn handle_pins_command(path: &Path, wrap: bool) -> Result<()> {
    let body = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let candidates = extract_pin_candidates([body], wrap);
    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}

async fn handle_backends_command(config_path: &Path, check: bool) -> Result<()> {
    let config = load_config(config_path)?;
    if config.backends.is_empty() {
        println!("No backends configured.");
        return Ok(());
    }

    if check {
        println!("{:<32} {:<14} STATUS", "ID", "KIND");
    } else {
        println!("{:<32} KIND", "ID");
    }
    let mut unhealthy = 0usize;
    for backend_config in &config.backends {
        let backend = Backend::from_config(
            backend_config,
            config.encoder,
            config.fs_access(),
            reqwest::Client::new(),
        )
        .await
        .context("failed to build backend")?;
        let id = cidfan_uploader::Uploader::id(&backend);
        if !check {
            println!("{:<32} {}", id, backend.kind());
            continue;
        }
        let status = match cidfan_uploader::Uploader::health_check(&backend).await {
            Ok(()) => "ok".to_string(),
            Err(err) => {
                unhealthy += 1;
                tracing::warn!(backend = id, error = %err, "health check failed");
                format!("error: {err}")
            }
        };
        println!("{:<32} {:<14} {}", id, backend.kind(), status);
    }
    if unhealthy > 0 {
        bail!("{unhealthy} backend(s) failed the health check");
    }
    Ok(())
}
