//! Streaming PDF fetch with payload validation.
//!
//! The body is inspected before anything touches the destination: a response
//! that does not open with the PDF magic bytes is sniffed for challenge
//! markers and rejected. Valid bodies stream into a `.part` sibling that is
//! renamed into place only after the size check passes, so an interrupted or
//! rejected download never leaves a file a rerun would mistake for a
//! finished one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::DownloadError;
use super::constants::{PARTIAL_SUFFIX, PDF_MAGIC, SNIFF_LIMIT_BYTES};
use crate::discovery::ChallengeClassifier;

const PDF_ACCEPT: &str = "application/pdf,application/octet-stream;q=0.9,*/*;q=0.8";

/// Fetches one PDF to disk.
#[derive(Debug, Clone)]
pub struct PdfClient {
    classifier: Arc<dyn ChallengeClassifier>,
    min_pdf_bytes: u64,
}

impl PdfClient {
    /// Creates a client rejecting bodies shorter than `min_pdf_bytes`.
    #[must_use]
    pub fn new(classifier: Arc<dyn ChallengeClassifier>, min_pdf_bytes: u64) -> Self {
        Self {
            classifier,
            min_pdf_bytes,
        }
    }

    /// Smallest accepted body size.
    #[must_use]
    pub fn min_pdf_bytes(&self) -> u64 {
        self.min_pdf_bytes
    }

    /// Downloads `url` into `dest`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] for a non-http(s) URL
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] on transport failure
    /// - [`DownloadError::Challenge`] when the response is an anti-bot page
    /// - [`DownloadError::HttpStatus`] for other non-success statuses
    /// - [`DownloadError::NotPdf`] when the body is not a PDF or is too small
    /// - [`DownloadError::Io`] when the file cannot be written
    #[instrument(skip(self, client, dest), fields(dest = %dest.display()))]
    pub async fn download_to(
        &self,
        client: &Client,
        url: &str,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = client
            .get(parsed)
            .header(ACCEPT, PDF_ACCEPT)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let mut stream = response.bytes_stream();
            let body = read_prefix(&mut stream, Vec::new(), SNIFF_LIMIT_BYTES).await;
            if self
                .classifier
                .is_challenge(status.as_u16(), &String::from_utf8_lossy(&body))
            {
                return Err(DownloadError::challenge(url, status.as_u16()));
            }
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        let mut stream = response.bytes_stream();
        let head = read_prefix(&mut stream, Vec::new(), PDF_MAGIC.len()).await;
        if !head.starts_with(PDF_MAGIC) {
            let sniffed = read_prefix(&mut stream, head, SNIFF_LIMIT_BYTES).await;
            if self
                .classifier
                .is_challenge(status.as_u16(), &String::from_utf8_lossy(&sniffed))
            {
                return Err(DownloadError::challenge(url, status.as_u16()));
            }
            return Err(DownloadError::not_pdf(
                url,
                content_type,
                "body does not start with %PDF",
            ));
        }

        let part = partial_path(dest);
        let written = match stream_to_file(&part, head, stream, url).await {
            Ok(written) => written,
            Err(e) => {
                debug!(path = %part.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if written < self.min_pdf_bytes {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(DownloadError::not_pdf(
                url,
                content_type,
                format!(
                    "body is {written} bytes, expected at least {}",
                    self.min_pdf_bytes
                ),
            ));
        }

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(DownloadError::io(dest, e));
        }

        info!(bytes = written, "download complete");
        Ok(written)
    }
}

/// `<dest>.part`, next to the destination.
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!("{name}.{PARTIAL_SUFFIX}"))
}

/// Extends `buffer` from `stream` until it holds at least `limit` bytes or
/// the stream ends. Transport errors end the read early.
async fn read_prefix<S, B>(stream: &mut S, mut buffer: Vec<u8>, limit: usize) -> Vec<u8>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    while buffer.len() < limit {
        match stream.next().await {
            Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
            Some(Err(e)) => {
                debug!(error = %e, "stopped reading body prefix");
                break;
            }
            None => break,
        }
    }
    buffer
}

/// Writes `head` then the rest of `stream` to `path`, returning bytes written.
async fn stream_to_file<S, B>(
    path: &Path,
    head: Vec<u8>,
    mut stream: S,
    url: &str,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(&head)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut bytes_written = head.len() as u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::discovery::SignatureClassifier;
    use crate::model::ErrorKind;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn pdf_body(len: usize) -> Vec<u8> {
        let mut body = b"%PDF-1.7\n".to_vec();
        body.resize(len, b'x');
        body
    }

    fn pdf_client() -> PdfClient {
        PdfClient::new(Arc::new(SignatureClassifier::default()), 1000)
    }

    #[test]
    fn test_partial_path_is_sibling() {
        let part = partial_path(Path::new("out/cell/a.pdf"));
        assert_eq!(part, Path::new("out/cell/a.pdf.part"));
    }

    #[tokio::test]
    async fn test_download_valid_pdf() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/cell/pdf/a.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(pdf_body(4096), "application/pdf"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.pdf");
        let url = format!("{}/cell/pdf/a.pdf", server.uri());
        let written = pdf_client()
            .download_to(&Client::new(), &url, &dest)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&dest).unwrap(), pdf_body(4096));
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_rejects_small_pdf_and_cleans_up() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body(200)))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("small.pdf");
        let err = pdf_client()
            .download_to(&Client::new(), &format!("{}/x.pdf", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::NotPdf { .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_html_body_is_not_pdf() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>Sign in to read</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = pdf_client()
            .download_to(
                &Client::new(),
                &format!("{}/x.pdf", server.uri()),
                &dir.path().join("x.pdf"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermanentFetchError);
        assert!(err.to_string().contains("text/html"));
    }

    #[tokio::test]
    async fn test_download_challenge_page_detected() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("<html><title>Just a moment...</title></html>"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = pdf_client()
            .download_to(
                &Client::new(),
                &format!("{}/x.pdf", server.uri()),
                &dir.path().join("x.pdf"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChallengeDetected);
    }

    #[tokio::test]
    async fn test_download_keeps_retry_after() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = pdf_client()
            .download_to(
                &Client::new(),
                &format!("{}/x.pdf", server.uri()),
                &dir.path().join("x.pdf"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::HttpStatus { status: 429, retry_after: Some(ref v), .. } if v == "3"
        ));
    }

    #[tokio::test]
    async fn test_download_invalid_url() {
        let dir = TempDir::new().unwrap();
        let err = pdf_client()
            .download_to(&Client::new(), "ftp://example.com/a.pdf", &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }
}
