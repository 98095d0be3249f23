use axum::body::Bytes;
use futures::stream::{self, Stream};
use reqwest::{Client, Response, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches finished images and keeps a local copy of each.
///
/// Every download is bounded by a byte cap and a whole-request timeout, and
/// bodies are moved chunk by chunk instead of being buffered.
pub struct ImageStore {
    http: Client,
    dir: PathBuf,
    max_bytes: u64,
}

/// An image response whose headers have arrived but whose body is still
/// on the wire.
pub struct ImageDownload {
    url: Url,
    content_type: Option<String>,
    response: Response,
    received: u64,
    max_bytes: u64,
}

impl ImageStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<Self, ImageStoreError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            dir: dir.into(),
            max_bytes,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start downloading an image. Fails early when the URL is not http(s),
    /// the CDN answers with an error, or the announced length is over the cap.
    pub async fn open(&self, image_url: &str) -> Result<ImageDownload, ImageStoreError> {
        let url = Url::parse(image_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| ImageStoreError::InvalidUrl(image_url.to_string()))?;

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageStoreError::Upstream(status.as_u16()));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(ImageStoreError::TooLarge(self.max_bytes));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ImageDownload {
            url,
            content_type,
            response,
            received: 0,
            max_bytes: self.max_bytes,
        })
    }

    /// Download an image into the store directory. A partial file is removed
    /// when the transfer fails.
    pub async fn save(&self, image_url: &str) -> Result<PathBuf, ImageStoreError> {
        let mut download = self.open(image_url).await?;
        let first = download.chunk().await?;
        let filename = download.filename(first.as_deref().unwrap_or_default());

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&filename);
        let mut file = tokio::fs::File::create(&path).await?;

        if let Err(e) = copy_body(&mut file, first, &mut download).await {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %rm, "Could not remove partial image");
            }
            return Err(e);
        }

        Ok(path)
    }
}

impl ImageDownload {
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// File name for this image. `head` is the start of the body, used to
    /// sniff the format when the content type does not name one.
    pub fn filename(&self, head: &[u8]) -> String {
        image_filename(&self.url, extension_for(self.content_type.as_deref(), head))
    }

    /// Next body chunk, or `None` at the end. Errors once the cap is crossed.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ImageStoreError> {
        let chunk = self.response.chunk().await?;
        if let Some(bytes) = &chunk {
            self.received += bytes.len() as u64;
            if self.received > self.max_bytes {
                return Err(ImageStoreError::TooLarge(self.max_bytes));
            }
        }
        Ok(chunk)
    }

    /// The remaining body as a stream, for relaying to a client.
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = Result<Bytes, ImageStoreError>> + Send + 'static {
        stream::try_unfold(self, |mut download| async move {
            let next = download.chunk().await?;
            Ok::<_, ImageStoreError>(next.map(|bytes| (bytes, download)))
        })
    }
}

async fn copy_body(
    file: &mut tokio::fs::File,
    first: Option<Bytes>,
    download: &mut ImageDownload,
) -> Result<(), ImageStoreError> {
    let mut next = first;
    while let Some(bytes) = next {
        file.write_all(&bytes).await?;
        next = download.chunk().await?;
    }
    file.flush().await?;
    Ok(())
}

/// Extension for a downloaded image, from its content type or, when the
/// header is absent or generic, from the bytes themselves.
fn extension_for(content_type: Option<&str>, bytes: &[u8]) -> &'static str {
    match content_type {
        Some(ct) if ct.contains("image/jpeg") => "jpg",
        Some(ct) if ct.contains("image/gif") => "gif",
        Some(ct) if ct.contains("image/webp") => "webp",
        Some(ct) if ct.contains("image/png") => "png",
        _ => match image::guess_format(bytes) {
            Ok(image::ImageFormat::Jpeg) => "jpg",
            Ok(image::ImageFormat::Gif) => "gif",
            Ok(image::ImageFormat::WebP) => "webp",
            _ => "png",
        },
    }
}

/// File name from the last URL path segment, with an image extension.
fn image_filename(url: &Url, extension: &str) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match last.rsplit_once('.') {
        Some((stem, ext)) if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            format!("{stem}.{ext}")
        }
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{extension}"),
        _ => format!("{last}.{extension}"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch image: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch image: upstream returned {0}")]
    Upstream(u16),

    #[error("Image exceeds the {0} byte limit")]
    TooLarge(u64),

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}
