//! Purpose: Drive the note service's cookie/CSRF-protected import API.
//! Exports: `NoteImporter`, `UpstreamClient`, `csrf::extract_csrf_token`, `DEFAULT_BASE_URL`.
//! Role: The only networked module; translates upstream failures into `Error`.
//! Invariants: Targets the HTML-scraped-token upstream contract (project-page
//! Invariants: GET for the token, JSON import POST); other contract versions
//! Invariants: mean another `NoteImporter` implementation, never a merge.
//! Invariants: Tokens are acquired per call and never cached.
#![allow(clippy::result_large_err)]

pub mod csrf;

use url::Url;

use crate::core::error::{Error, ErrorKind};
use crate::core::page::ImportBatch;
use csrf::extract_csrf_token;

/// Base URL of the real note service; overridable for tests.
pub const DEFAULT_BASE_URL: &str = "https://scrapbox.io";

/// Session cookie name the upstream uses for logged-in browsers.
const SESSION_COOKIE: &str = "connect.sid";

/// Longest upstream body slice echoed back in error messages.
const BODY_EXCERPT_BYTES: usize = 512;

/// The upstream capability the request handler depends on: acquire a CSRF
/// token, then import a page batch with it.
pub trait NoteImporter: Send + Sync {
    fn fetch_csrf_token(&self) -> Result<String, Error>;
    fn import_pages(&self, batch: &ImportBatch, csrf_token: &str) -> Result<(), Error>;
}

pub struct UpstreamClient {
    agent: ureq::Agent,
    base_url: Url,
    project: String,
    session_id: String,
}

impl UpstreamClient {
    pub fn new(
        base_url: impl Into<String>,
        project: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: normalize_base_url(base_url.into())?,
            project: project.into(),
            session_id: session_id.into(),
        })
    }

    fn session_cookie(&self) -> String {
        format!("{SESSION_COOKIE}={}", self.session_id)
    }
}

impl NoteImporter for UpstreamClient {
    /// One cookie-authenticated GET to the project page, then the extraction
    /// chain over its body and set-cookie headers.
    fn fetch_csrf_token(&self) -> Result<String, Error> {
        let url = build_url(&self.base_url, &[&self.project])?;
        let response = self
            .agent
            .request("GET", url.as_str())
            .set("Cookie", &self.session_cookie())
            .call();
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(Error::new(ErrorKind::Upstream)
                    .with_message(format!(
                        "Failed to fetch CSRF token: {status}: {}",
                        body_excerpt(&body)
                    ))
                    .with_status(status));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("Failed to fetch CSRF token: request failed")
                    .with_source(err));
            }
        };

        let set_cookie_headers: Vec<String> = response
            .all("set-cookie")
            .into_iter()
            .map(str::to_string)
            .collect();
        let body = response.into_string().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("Failed to fetch CSRF token: unreadable response body")
                .with_source(err)
        })?;

        extract_csrf_token(&body, &set_cookie_headers).ok_or_else(|| {
            Error::new(ErrorKind::Upstream)
                .with_message("CSRF token not found in upstream response")
        })
    }

    /// JSON POST to the project-scoped import endpoint. The token, when
    /// non-empty, rides along as `X-CSRF-TOKEN`.
    fn import_pages(&self, batch: &ImportBatch, csrf_token: &str) -> Result<(), Error> {
        let url = build_url(
            &self.base_url,
            &["api", "page-data", "import", &format!("{}.json", self.project)],
        )?;
        let payload = serde_json::to_string(batch).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode import payload")
                .with_source(err)
        })?;
        let mut request = self
            .agent
            .request("POST", url.as_str())
            .set("Cookie", &self.session_cookie())
            .set("Content-Type", "application/json");
        if !csrf_token.is_empty() {
            request = request.set("X-CSRF-TOKEN", csrf_token);
        }

        match request.send_string(&payload) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(Error::new(ErrorKind::Upstream)
                    .with_message(format!(
                        "Import API error {status}: {}",
                        body_excerpt(&body)
                    ))
                    .with_status(status))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("import request failed")
                .with_source(err)),
        }
    }
}

fn normalize_base_url(raw: String) -> Result<Url, Error> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid upstream base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("upstream base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("upstream base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("upstream base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn body_excerpt(body: &str) -> &str {
    if body.len() <= BODY_EXCERPT_BYTES {
        return body;
    }
    let mut end = BODY_EXCERPT_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BASE_URL, UpstreamClient, body_excerpt, build_url, normalize_base_url};

    #[test]
    fn normalize_base_url_strips_path_and_query() {
        let url = normalize_base_url("http://localhost:8080".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn normalize_base_url_rejects_non_http_schemes() {
        let err = normalize_base_url("ftp://example.com".to_string()).expect_err("err");
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Usage);
    }

    #[test]
    fn normalize_base_url_rejects_paths() {
        let err = normalize_base_url("http://example.com/notes".to_string()).expect_err("err");
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Usage);
    }

    #[test]
    fn default_base_url_is_normalizable() {
        normalize_base_url(DEFAULT_BASE_URL.to_string()).expect("default url");
    }

    #[test]
    fn build_url_encodes_import_path() {
        let base = normalize_base_url("https://notes.example".to_string()).expect("url");
        let url = build_url(&base, &["api", "page-data", "import", "my-project.json"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://notes.example/api/page-data/import/my-project.json"
        );
    }

    #[test]
    fn session_cookie_uses_the_upstream_cookie_name() {
        let client =
            UpstreamClient::new("https://notes.example", "proj", "sid-value").expect("client");
        assert_eq!(client.session_cookie(), "connect.sid=sid-value");
    }

    #[test]
    fn body_excerpt_truncates_on_char_boundaries() {
        let body = "メ".repeat(400);
        let excerpt = body_excerpt(&body);
        assert!(excerpt.len() <= 512);
        assert!(body.starts_with(excerpt));
        assert_eq!(body_excerpt("short"), "short");
    }
}
