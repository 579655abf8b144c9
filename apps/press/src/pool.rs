//! Bounded render pool.
//!
//! At most `workers` jobs run at once, one job per worker. A job holds its
//! permit from image resolution until its bytes are ready. Layout itself is
//! CPU-bound and runs on the blocking thread pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::Engine;
use crate::errors::{PressError, PressResult};
use crate::fetch::{resolve_images, ImageFetcher};
use crate::jobs::JobRequest;
use crate::layout::CancelFlag;

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub job_id: Uuid,
    pub bytes: Bytes,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct RenderPool {
    engine: Arc<Engine>,
    fetcher: Arc<dyn ImageFetcher>,
    permits: Arc<Semaphore>,
    workers: usize,
    image_timeout: Duration,
    default_font: String,
}

impl RenderPool {
    pub fn new(
        engine: Arc<Engine>,
        fetcher: Arc<dyn ImageFetcher>,
        workers: usize,
        image_timeout: Duration,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            engine,
            fetcher,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            image_timeout,
            default_font: crate::engine::DEFAULT_SERIF.to_string(),
        }
    }

    /// Body family for book jobs that do not name one.
    pub fn with_default_font(mut self, family: impl Into<String>) -> Self {
        self.default_font = family.into();
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs one job to completion. Waits for a free worker first.
    pub async fn render(&self, request: JobRequest, cancel: CancelFlag) -> PressResult<RenderOutput> {
        let job_id = Uuid::new_v4();
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PressError::Backend(format!("render pool closed: {e}")))?;
        let started = Instant::now();
        info!(%job_id, title = request.title(), "Render job started");

        let engine = self.engine.clone();
        let task = match request {
            JobRequest::Book(book) => {
                let document = book.document();
                let geometry = book.geometry()?;
                let font = book.font(&self.default_font);
                let style = book.style();
                tokio::task::spawn_blocking(move || {
                    engine.render_book(&document, &geometry, &font, &style, &cancel)
                })
            }
            JobRequest::Childrens(mut kids) => {
                resolve_images(&mut kids.pages, self.fetcher.as_ref(), self.image_timeout).await;
                tokio::task::spawn_blocking(move || {
                    engine.render_childrens_book(&kids.title, &kids.author_name, &kids.pages, &cancel)
                })
            }
        };

        let result = task
            .await
            .map_err(|e| PressError::Backend(format!("render task failed: {e}")))?;

        match result {
            Ok(bytes) => {
                let elapsed = started.elapsed();
                info!(
                    %job_id,
                    bytes = bytes.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Render job finished"
                );
                Ok(RenderOutput {
                    job_id,
                    bytes,
                    elapsed,
                })
            }
            Err(e) => {
                error!(%job_id, code = e.code(), error = %e, "Render job failed");
                Err(e)
            }
        }
    }
}
