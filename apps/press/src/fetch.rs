//! Image resolution for children's books.
//!
//! Before layout, every page that names an `image_url` gets its slot filled:
//! `Ready` with the pixel size, or `Failed` with a reason. A failed or slow
//! fetch never fails the job; the planner lays that page out text-only.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::errors::{PressError, PressResult};
use crate::models::{ChildPageSpec, ImageAsset, ImageSlot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub url: String,
    pub width_px: u32,
    pub height_px: u32,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> PressResult<FetchedImage>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP fetcher
// ────────────────────────────────────────────────────────────────────────────

/// Downloads over HTTP(S) and reads the pixel size from the image header.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> PressResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PressError::Backend(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str) -> PressResult<FetchedImage> {
        let failed = |reason: String| PressError::ImageFetchFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        let (width_px, height_px) = image_dimensions(&bytes).map_err(failed)?;
        debug!(url, width_px, height_px, bytes = bytes.len(), "Image fetched");

        Ok(FetchedImage {
            url: url.to_string(),
            width_px,
            height_px,
        })
    }
}

/// Pixel size from the encoded header, without decoding the image.
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

/// Fills the image slot of every spec that names a URL. Slots that are
/// already `Ready` are left alone. Each fetch is bounded by `timeout`.
pub async fn resolve_images(
    specs: &mut [ChildPageSpec],
    fetcher: &dyn ImageFetcher,
    timeout: Duration,
) {
    for (page, spec) in specs.iter_mut().enumerate() {
        if matches!(spec.image, ImageSlot::Ready(_)) {
            continue;
        }
        let Some(url) = spec
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
        else {
            spec.image = ImageSlot::NotRequested;
            continue;
        };

        spec.image = match tokio::time::timeout(timeout, fetcher.fetch_image(&url)).await {
            Ok(Ok(image)) => ImageSlot::Ready(ImageAsset {
                url,
                width_px: image.width_px,
                height_px: image.height_px,
            }),
            Ok(Err(e)) => {
                warn!(page, url = %url, error = %e, "Image fetch failed");
                let reason = match e {
                    PressError::ImageFetchFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                ImageSlot::Failed { url, reason }
            }
            Err(_) => {
                warn!(page, url = %url, timeout_secs = timeout.as_secs_f32(), "Image fetch timed out");
                ImageSlot::Failed {
                    url,
                    reason: format!("timed out after {:.1}s", timeout.as_secs_f32()),
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeFetcher {
        sizes: HashMap<String, (u32, u32)>,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch_image(&self, url: &str) -> PressResult<FetchedImage> {
            match self.sizes.get(url) {
                Some(&(w, h)) => Ok(FetchedImage {
                    url: url.to_string(),
                    width_px: w,
                    height_px: h,
                }),
                None => Err(PressError::ImageFetchFailed {
                    url: url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                }),
            }
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl ImageFetcher for SlowFetcher {
        async fn fetch_image(&self, url: &str) -> PressResult<FetchedImage> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(FetchedImage {
                url: url.to_string(),
                width_px: 1,
                height_px: 1,
            })
        }
    }

    fn make_spec(url: Option<&str>) -> ChildPageSpec {
        let mut spec = ChildPageSpec::text_only("text");
        spec.image_url = url.map(str::to_string);
        spec
    }

    #[tokio::test]
    async fn test_resolve_fills_ready_and_failed_slots() {
        let fetcher = FakeFetcher {
            sizes: HashMap::from([("http://img/a.png".to_string(), (800, 600))]),
        };
        let mut specs = vec![
            make_spec(Some("http://img/a.png")),
            make_spec(Some("http://img/missing.png")),
            make_spec(None),
            make_spec(Some("  ")),
        ];
        resolve_images(&mut specs, &fetcher, Duration::from_secs(10)).await;

        assert_eq!(
            specs[0].image,
            ImageSlot::Ready(ImageAsset {
                url: "http://img/a.png".into(),
                width_px: 800,
                height_px: 600,
            })
        );
        assert_eq!(
            specs[1].image,
            ImageSlot::Failed {
                url: "http://img/missing.png".into(),
                reason: "HTTP 404 Not Found".into(),
            }
        );
        assert_eq!(specs[2].image, ImageSlot::NotRequested);
        assert_eq!(specs[3].image, ImageSlot::NotRequested);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let mut specs = vec![make_spec(Some("http://img/slow.png"))];
        resolve_images(&mut specs, &SlowFetcher, Duration::from_secs(10)).await;
        match &specs[0].image {
            ImageSlot::Failed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ready_slots_are_not_refetched() {
        let fetcher = FakeFetcher {
            sizes: HashMap::new(),
        };
        let mut specs = vec![ChildPageSpec::text_only("inline").with_image(10, 20)];
        resolve_images(&mut specs, &fetcher, Duration::from_secs(1)).await;
        assert!(matches!(specs[0].image, ImageSlot::Ready(_)));
    }

    #[test]
    fn test_image_dimensions_reads_png_header() {
        let mut encoded = Vec::new();
        image::RgbImage::new(3, 2)
            .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(image_dimensions(&encoded).unwrap(), (3, 2));
        assert!(image_dimensions(b"not an image").is_err());
    }
}
