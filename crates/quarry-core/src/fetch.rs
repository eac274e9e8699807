use std::io::Read;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("{url} did not provide a usable tarball filename")]
    MissingFilename { url: String },
}

/// An open HTTP transfer: headers have been read, the body has not been
/// consumed. The caller decides whether to drain it (and on which thread).
pub struct Transfer {
    pub filename: String,
    pub total: Option<u64>,
    pub body: Box<dyn Read + Send + 'static>,
}

/// Performs the GET and captures the tarball filename from the
/// Content-Disposition header, falling back to the URL basename. The body is
/// handed back unread so the copy can run on a background thread.
pub fn open_transfer(url: &str) -> Result<Transfer, FetchError> {
    let response = ureq::get(url).call().map_err(|source| FetchError::Request {
        url: url.to_string(),
        source: Box::new(source),
    })?;

    let filename = response
        .headers()
        .get("Content-Disposition")
        .and_then(|value| value.to_str().ok())
        .and_then(content_disposition_filename)
        .or_else(|| url_basename(url))
        .ok_or_else(|| FetchError::MissingFilename {
            url: url.to_string(),
        })?;

    let total = response
        .headers()
        .get("Content-Length")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|length| *length > 0);

    Ok(Transfer {
        filename,
        total,
        body: Box::new(response.into_body().into_reader()),
    })
}

/// Extracts the `filename=` parameter from a Content-Disposition value such
/// as `attachment; filename=pkg-0cc8d8c.tar.gz`.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        let Some(raw) = part.strip_prefix("filename=") else {
            continue;
        };
        let name = raw.trim().trim_matches('"').trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    None
}

pub fn url_basename(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let (_, last) = trimmed.rsplit_once('/')?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}

/// GitHub tarball names look like `owner-repo-0cc8d8c.tar.gz`; the revision
/// is the last dash-separated segment of the stem.
pub fn infer_revision(filename: &str) -> Option<String> {
    let stem = filename.split('.').next().unwrap_or(filename);
    let revision = stem.rsplit('-').next()?;
    if revision.is_empty() {
        None
    } else {
        Some(revision.to_string())
    }
}
