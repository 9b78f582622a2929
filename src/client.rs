//! Heatmap data source: the HTTP endpoint and its single failure kind

use crate::heatmap::{HeatmapResponse, HEATMAP_TYPE};
use std::time::Duration;

/// Any failure to obtain a heatmap. Callers treat all variants alike; the
/// split only exists for the log line.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {code} {status_text}")]
    Status { code: u16, status_text: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Anything that can produce heatmap data for an airline and cycle offset.
/// Called from worker threads.
pub trait HeatmapSource: Send + Sync + 'static {
    fn fetch(&self, airline_id: i64, cycle_delta: i64) -> Result<HeatmapResponse, FetchError>;
}

pub struct HttpHeatmapSource {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpHeatmapSource {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Self {
            agent: builder.build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/airlines/{id}/heatmap-data`, without the query string
    pub fn endpoint(&self, airline_id: i64) -> String {
        format!("{}/airlines/{}/heatmap-data", self.base_url, airline_id)
    }
}

impl HeatmapSource for HttpHeatmapSource {
    fn fetch(&self, airline_id: i64, cycle_delta: i64) -> Result<HeatmapResponse, FetchError> {
        let url = self.endpoint(airline_id);
        log::debug!("GET {} heatmapType={} cycleDelta={}", url, HEATMAP_TYPE, cycle_delta);

        let response = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .query("heatmapType", HEATMAP_TYPE)
            .query("cycleDelta", &cycle_delta.to_string())
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => FetchError::Status {
                    code,
                    status_text: resp.status_text().to_string(),
                },
                ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
            })?;

        response
            .into_json::<HeatmapResponse>()
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    /// Serve exactly one HTTP response on an ephemeral port. Returns the base
    /// URL and a receiver yielding the request line.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
            }
            let _ = tx.send(request_line.trim_end().to_string());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        });

        (format!("http://{}", addr), rx)
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let source = HttpHeatmapSource::new("http://example.test/", None);
        assert_eq!(
            source.endpoint(42),
            "http://example.test/airlines/42/heatmap-data"
        );
    }

    #[test]
    fn test_fetch_success_sends_query() {
        let (base, rx) = serve_once(
            "200 OK",
            r#"{"points":[{"lat":10.0,"lng":20.0,"weight":3.0}],"maxIntensity":9.0,"minDeltaCount":-12}"#,
        );
        let source = HttpHeatmapSource::new(&base, Some(Duration::from_secs(5)));
        let resp = source.fetch(7, -3).unwrap();
        assert_eq!(resp.points.len(), 1);
        assert_eq!(resp.min_delta_count, -12);

        let request_line = rx.recv().unwrap();
        assert!(request_line.starts_with("GET /airlines/7/heatmap-data?"));
        assert!(request_line.contains("heatmapType=loyalist"));
        assert!(request_line.contains("cycleDelta=-3"));
    }

    #[test]
    fn test_fetch_server_error_is_status_failure() {
        let (base, _rx) = serve_once("500 Internal Server Error", "{}");
        let source = HttpHeatmapSource::new(&base, Some(Duration::from_secs(5)));
        match source.fetch(7, 0) {
            Err(FetchError::Status { code, status_text }) => {
                assert_eq!(code, 500);
                assert_eq!(status_text, "Internal Server Error");
            }
            other => panic!("expected status failure, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_malformed_body_is_decode_failure() {
        let (base, _rx) = serve_once("200 OK", r#"{"points": "nope"}"#);
        let source = HttpHeatmapSource::new(&base, Some(Duration::from_secs(5)));
        assert!(matches!(source.fetch(1, 0), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_fetch_connection_refused_is_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpHeatmapSource::new(&format!("http://{}", addr), Some(Duration::from_secs(5)));
        assert!(matches!(source.fetch(1, 0), Err(FetchError::Transport(_))));
    }
}
