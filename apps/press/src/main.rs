use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use press::config::Config;
use press::fetch::HttpImageFetcher;
use press::jobs::JobRequest;
use press::pool::RenderPool;
use press::{CancelFlag, Engine, JsonRenderer, MetricsProvider};

#[derive(Parser)]
#[command(name = "press")]
#[command(version, about = "Lay out book job files into page display lists", long_about = None)]
struct Cli {
    /// Job files (JSON)
    #[arg(value_name = "JOB", required = true)]
    jobs: Vec<PathBuf>,

    /// Concurrent jobs (overrides PRESS_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output directory (overrides PRESS_OUTPUT_DIR)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Indent the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting press v{}", env!("CARGO_PKG_VERSION"));

    let workers = cli.workers.unwrap_or(config.workers).max(1);
    let output_dir = cli.output_dir.unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let renderer = if cli.pretty {
        JsonRenderer::pretty()
    } else {
        JsonRenderer::new()
    };
    let engine = Engine::new(Arc::new(MetricsProvider::builtin()), Arc::new(renderer))
        .with_decorative(&config.decorative_font);
    let fetcher = HttpImageFetcher::new(config.image_timeout)?;
    let pool = RenderPool::new(
        Arc::new(engine),
        Arc::new(fetcher),
        workers,
        config.image_timeout,
    )
    .with_default_font(&config.body_font);
    info!(workers, output_dir = %output_dir.display(), "Render pool ready");

    // Ctrl-C cancels every job still laying out.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling jobs");
                cancel.cancel();
            }
        });
    }

    let handles: Vec<_> = cli
        .jobs
        .into_iter()
        .map(|path| {
            let pool = pool.clone();
            let cancel = cancel.clone();
            let output_dir = output_dir.clone();
            tokio::spawn(async move {
                let result = run_job(&pool, &path, &output_dir, cancel).await;
                (path, result)
            })
        })
        .collect();

    let mut failed = 0usize;
    for handle in handles {
        let (path, result) = handle.await.context("Job task panicked")?;
        match result {
            Ok(out) => info!(job = %path.display(), output = %out.display(), "Job written"),
            Err(e) => {
                failed += 1;
                error!(job = %path.display(), "Job failed: {e:#}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}

async fn run_job(
    pool: &RenderPool,
    path: &Path,
    output_dir: &Path,
    cancel: CancelFlag,
) -> Result<PathBuf> {
    let request = JobRequest::load(path)?;
    let output = pool
        .render(request, cancel)
        .await
        .with_context(|| format!("Failed to render {}", path.display()))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("job");
    let target = output_dir.join(format!("{stem}.pages.json"));
    tokio::fs::write(&target, &output.bytes)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(target)
}
