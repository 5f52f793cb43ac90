//! Client for the survey service's REST API.
//!
//! Fetches a survey with `GET /surveys/{id}` and its responses page by page
//! with `GET /surveys/{id}/responses?page=N&limit=M`.

use super::{parse_response_page, parse_survey, ResponsePage, SourceError};
use crate::models::{ResponseRecord, Survey};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the survey service.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:5000/api/v1`.
    pub base_url: String,
    /// Bearer token for the survey owner's session.
    pub token: Option<String>,
    pub page_size: u32,
    pub timeout_seconds: u64,
    pub show_progress: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api/v1".to_string(),
            token: None,
            page_size: 100,
            timeout_seconds: 30,
            show_progress: true,
        }
    }
}

/// The survey service client.
pub struct SurveyApiClient {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl SurveyApiClient {
    /// Create a client for the configured service.
    pub fn new(config: ApiConfig) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn survey_url(&self, survey_id: &str) -> String {
        self.endpoint(&format!("/surveys/{}", survey_id))
    }

    fn responses_url(&self, survey_id: &str, page: u32) -> String {
        self.endpoint(&format!(
            "/surveys/{}/responses?page={}&limit={}",
            survey_id, page, self.config.page_size
        ))
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        debug!("GET {}", url);

        let mut request = self.http_client.get(url);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body)
                .or_else(|| status.canonical_reason().map(String::from))
                .unwrap_or_else(|| "request failed".to_string());
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    /// Fetch a survey definition.
    pub async fn fetch_survey(&self, survey_id: &str) -> Result<Survey, SourceError> {
        let url = self.survey_url(survey_id);
        let body = self.get_text(&url).await?;
        parse_survey(&body, &url)
    }

    /// Fetch one page of responses (pages start at 1).
    pub async fn fetch_responses_page(
        &self,
        survey_id: &str,
        page: u32,
    ) -> Result<ResponsePage, SourceError> {
        let url = self.responses_url(survey_id, page);
        let body = self.get_text(&url).await?;
        parse_response_page(&body, &url)
    }

    /// Fetch the survey and every page of its responses.
    ///
    /// The survey and the first page are requested concurrently; the rest of
    /// the pages follow one by one until `total_pages` is reached or a page
    /// comes back empty.
    pub async fn fetch_all(
        &self,
        survey_id: &str,
    ) -> Result<(Survey, Vec<ResponseRecord>), SourceError> {
        info!("Fetching survey {} from {}", survey_id, self.config.base_url);

        let (survey, first_page) = tokio::try_join!(
            self.fetch_survey(survey_id),
            self.fetch_responses_page(survey_id, 1)
        )?;

        if let Some(ref p) = first_page.pagination {
            debug!(
                "Service reports {} responses over {} page(s) of {}",
                p.total_items, p.total_pages, p.items_per_page
            );
        }

        let total_pages = first_page
            .pagination
            .as_ref()
            .map(|p| p.total_pages.max(1))
            .unwrap_or(1);

        let progress = self.progress_bar(u64::from(total_pages));
        let mut responses = first_page.responses;
        progress.inc(1);

        let mut pages_read = 1;
        let mut page = 2;
        while page <= total_pages {
            let next = self.fetch_responses_page(survey_id, page).await?;
            progress.inc(1);
            if let Some(ref p) = next.pagination {
                if p.current_page != 0 && p.current_page != page {
                    warn!("Asked for page {} but the service returned page {}", page, p.current_page);
                }
            }
            if next.responses.is_empty() {
                debug!("Page {} came back empty, stopping", page);
                break;
            }
            responses.extend(next.responses);
            pages_read = page;
            page += 1;
        }

        progress.finish_and_clear();
        info!(
            "Fetched {} responses over {} page(s)",
            responses.len(),
            pages_read
        );

        Ok((survey, responses))
    }

    fn progress_bar(&self, pages: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(pages);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] page {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// The `message` field of an error body, if it has one.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SURVEY_BODY: &str = r#"{"success": true, "data": {"survey": {"id": "s1", "title": "Pulse", "questions": [{"id": "q1", "type": "rating", "question": "Rate us"}]}}}"#;

    fn page_body(ids: &[&str], page: u32, total_pages: u32) -> String {
        let records: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "answers": {"q1": 5}, "completed_at": "2025-06-01T10:00:00Z"}))
            .collect();

        json!({
            "success": true,
            "data": {
                "responses": records,
                "pagination": {"current_page": page, "total_pages": total_pages, "total_items": 0, "items_per_page": 2}
            }
        })
        .to_string()
    }

    /// Serve canned pages on a local port; returns the base URL and the
    /// response pages requested so far.
    async fn serve_pages(pages: Vec<Vec<&'static str>>, total_pages: u32) -> (String, Arc<Mutex<Vec<u32>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requested);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let pages = pages.clone();
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&buf);
                    let path = request.split_whitespace().nth(1).unwrap_or("").to_string();
                    let body = match path.split("page=").nth(1) {
                        Some(query) => {
                            let page: u32 = query
                                .split('&')
                                .next()
                                .and_then(|p| p.parse().ok())
                                .unwrap_or(1);
                            log.lock().unwrap().push(page);
                            let ids = pages
                                .get(page.saturating_sub(1) as usize)
                                .cloned()
                                .unwrap_or_default();
                            page_body(&ids, page, total_pages)
                        }
                        None => SURVEY_BODY.to_string(),
                    };

                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (format!("http://{}/api/v1", addr), requested)
    }

    fn client(base_url: &str) -> SurveyApiClient {
        SurveyApiClient::new(ApiConfig {
            base_url: base_url.to_string(),
            token: Some("secret".to_string()),
            page_size: 25,
            timeout_seconds: 5,
            show_progress: false,
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let api = client("http://localhost:5000/api/v1/");

        assert_eq!(api.survey_url("abc"), "http://localhost:5000/api/v1/surveys/abc");
        assert_eq!(
            api.responses_url("abc", 2),
            "http://localhost:5000/api/v1/surveys/abc/responses?page=2&limit=25"
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"success": false, "message": "Survey not found"}"#),
            Some("Survey not found".to_string())
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[tokio::test]
    async fn test_fetch_all_concatenates_pages() {
        let (base_url, requested) =
            serve_pages(vec![vec!["r1", "r2"], vec!["r3", "r4"], vec!["r5"]], 3).await;

        let (survey, responses) = client(&base_url).fetch_all("s1").await.unwrap();

        assert_eq!(survey.id, "s1");
        let ids: Vec<&str> = responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3", "r4", "r5"]);

        let mut pages = requested.lock().unwrap().clone();
        pages.sort();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_at_empty_page() {
        let (base_url, requested) =
            serve_pages(vec![vec!["r1", "r2"], vec![], vec!["r5"]], 5).await;

        let (_, responses) = client(&base_url).fetch_all("s1").await.unwrap();

        let ids: Vec<&str> = responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);

        let mut pages = requested.lock().unwrap().clone();
        pages.sort();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_unreachable_service() {
        let api = client("http://127.0.0.1:1/api/v1");
        let result = tokio_test::block_on(api.fetch_survey("abc"));
        assert!(result.is_err());
    }
}
