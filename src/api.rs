// API client module: a small blocking HTTP client for the game API.
// Every call is one synchronous request carrying the bearer token; the
// process waits for the response (bounded by the configured timeout).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::credentials::Credential;
use crate::error::{ClientError, Result};

const BODY_SNIPPET_CHARS: usize = 200;

/// Blocking client for the hash list endpoints. Holds the reqwest client,
/// the parsed base URL and the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Credential,
}

/// One entry of the hash list listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashListSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
struct RawSummary {
    hash_list_id: Value,
    hash_list_name: String,
}

/// Where a downloaded hash list was written and how many entries it had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub entries: usize,
}

/// Scoring result of one submission. When the server answered with an
/// `error` field the counters are zero and `error` carries the message.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub hash_list_id: String,
    pub username: String,
    pub found_count: u64,
    pub added_score: f64,
    pub total_score: f64,
    pub new_items: usize,
    pub error: Option<String>,
}

impl SubmissionReport {
    pub fn rejected(hash_list_id: &str, message: impl Into<String>) -> Self {
        Self {
            hash_list_id: hash_list_id.to_string(),
            username: "unknown".to_string(),
            found_count: 0,
            added_score: 0.0,
            total_score: 0.0,
            new_items: 0,
            error: Some(message.into()),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Deserialize)]
struct RawSubmission {
    #[serde(default)]
    hash_list_id: Value,
    username: Value,
    found_count: Value,
    added_score: f64,
    total_score: f64,
    new_items: Vec<Value>,
}

/// Rejects blank ids and ids that would escape the working directory once
/// used as `<id>.left` / `<id>.submitted`. Accepted ids are returned as given.
pub fn check_id(id: &str) -> Result<&str> {
    let invalid = |reason| Err(ClientError::InvalidId(id.to_string(), reason));
    if id.trim().is_empty() {
        return invalid("must not be empty");
    }
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return invalid("must not contain path separators");
    }
    Ok(id)
}

impl ApiClient {
    pub fn new(config: &ClientConfig, token: Credential) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base URL {:?}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base URL {:?} cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("jabbercracky-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(ApiClient {
            client,
            base_url,
            token,
        })
    }

    /// Helper to build the Authorization header map.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token.as_str()))
            .map_err(|_| ClientError::Config("token contains characters not allowed in a header".into()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json(&self, url: Url) -> Result<Value> {
        debug!(%url, "GET");
        let res = self.client.get(url).headers(self.auth_headers()?).send()?;
        let (status, body) = read_body(res)?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("body is not JSON ({}): {}", e, snippet(&body))))
    }

    /// GET /api/game/hashlist, sorted ascending by id. Entries that do not
    /// carry an integer id and a string name are skipped.
    pub fn list_hash_lists(&self) -> Result<Vec<HashListSummary>> {
        let url = self.endpoint(&["api", "game", "hashlist"])?;
        let value = self.get_json(url)?;
        parse_hash_lists(&value)
    }

    /// GET /api/game/hashlist/{id} and write its `hash_list` entries to
    /// `<dest_dir>/<id>.left`, one per line. An existing file is replaced.
    pub fn download_hash_list(&self, id: &str, dest_dir: &Path) -> Result<DownloadOutcome> {
        let id = check_id(id)?;
        let url = self.endpoint(&["api", "game", "hashlist", id])?;
        let value = self.get_json(url)?;

        let entries = value
            .get("hash_list")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::InvalidResponse("missing `hash_list` array".into()))?;

        let path = dest_dir.join(format!("{}.left", id));
        write_entries(&path, entries)?;
        debug!(path = %path.display(), entries = entries.len(), "hash list saved");

        Ok(DownloadOutcome {
            path,
            entries: entries.len(),
        })
    }

    /// POST the results file to /api/game/submit/{id} as the multipart
    /// field `file`. The bytes are sent unmodified.
    pub fn submit(&self, id: &str, file_path: &Path) -> Result<SubmissionReport> {
        let id = check_id(id)?;
        let url = self.endpoint(&["api", "game", "submit", id])?;

        let bytes = fs::read(file_path).map_err(|e| ClientError::io(file_path, e))?;
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("results.txt")
            .to_string();
        debug!(%url, file = %file_path.display(), bytes = bytes.len(), "POST");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/plain")?;
        let form = multipart::Form::new().part("file", part);

        let res = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()?;
        let (status, body) = read_body(res)?;
        parse_submission(id, status, &body)
    }
}

fn read_body(res: Response) -> Result<(StatusCode, String)> {
    let status = res.status();
    let body = res.text()?;
    Ok((status, body))
}

fn http_error(status: StatusCode, body: &str) -> ClientError {
    ClientError::InvalidResponse(format!("HTTP {}: {}", status, snippet(body)))
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > BODY_SNIPPET_CHARS {
        let head: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

fn parse_hash_lists(value: &Value) -> Result<Vec<HashListSummary>> {
    let items = value
        .get("hash_lists")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::InvalidResponse("missing `hash_lists` array".into()))?;

    let mut lists: Vec<HashListSummary> = items
        .iter()
        .filter_map(|item| RawSummary::deserialize(item).ok())
        .filter_map(|raw| {
            Some(HashListSummary {
                id: whole_id(&raw.hash_list_id)?,
                name: raw.hash_list_name,
            })
        })
        .collect();
    lists.sort_by_key(|l| l.id);
    Ok(lists)
}

fn write_entries(path: &Path, entries: &[Value]) -> Result<()> {
    let file = File::create(path).map_err(|e| ClientError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        writeln!(out, "{}", plain_text(entry)).map_err(|e| ClientError::io(path, e))?;
    }
    out.flush().map_err(|e| ClientError::io(path, e))
}

/// Strings as-is, anything else in compact JSON.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_submission(id: &str, status: StatusCode, body: &str) -> Result<SubmissionReport> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !status.is_success() => return Err(http_error(status, body)),
        Err(e) => {
            return Err(ClientError::InvalidResponse(format!(
                "submit response is not JSON ({}): {}",
                e,
                snippet(body)
            )))
        }
    };

    // A server-side rejection is a normal outcome, whatever the status code.
    if let Some(message) = value.get("error") {
        let message = plain_text(message);
        warn!(hash_list = id, %status, error = %message, "submission rejected by server");
        return Ok(SubmissionReport::rejected(id, message));
    }
    if !status.is_success() {
        return Err(http_error(status, body));
    }

    let raw = RawSubmission::deserialize(&value)
        .map_err(|e| ClientError::InvalidResponse(format!("submit response: {}", e)))?;

    let hash_list_id = match raw.hash_list_id {
        Value::Null => id.to_string(),
        other => plain_text(&other),
    };

    Ok(SubmissionReport {
        hash_list_id,
        username: plain_text(&raw.username),
        found_count: whole_count("found_count", &raw.found_count)?,
        added_score: raw.added_score,
        total_score: raw.total_score,
        new_items: raw.new_items.len(),
        error: None,
    })
}

/// Integer ids, or floats with no fractional part (`5.0`).
fn whole_id(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then(|| f as i64)
}

/// Accepts integers and integral floats; a fractional count is an error.
fn whole_count(field: &str, value: &Value) -> Result<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(ClientError::InvalidResponse(format!(
            "`{}` is not a whole non-negative number: {}",
            field, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(base_url: &str) -> ApiClient {
        let config = ClientConfig::default().with_base_url(base_url);
        ApiClient::new(&config, Credential::new("test-token").unwrap()).unwrap()
    }

    #[test]
    fn test_list_sorted_ascending_by_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/game/hashlist")
                .header("authorization", "Bearer test-token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "hash_lists": [
                        {"hash_list_id": 5, "hash_list_name": "b"},
                        {"hash_list_id": 2, "hash_list_name": "a"}
                    ]
                }));
        });

        let lists = client_for(&server.base_url()).list_hash_lists().unwrap();

        mock.assert();
        assert_eq!(
            lists,
            vec![
                HashListSummary { id: 2, name: "a".into() },
                HashListSummary { id: 5, name: "b".into() },
            ]
        );
    }

    #[test]
    fn test_list_skips_malformed_entries() {
        let value = json!({
            "hash_lists": [
                {"hash_list_id": 9, "hash_list_name": "nine"},
                {"hash_list_id": "x", "hash_list_name": "bad id"},
                {"hash_list_name": "no id"},
                "not an object",
                {"hash_list_id": 1, "hash_list_name": "one", "extra": true},
                {"hash_list_id": 5.0, "hash_list_name": "float id"},
                {"hash_list_id": 2.5, "hash_list_name": "fractional id"}
            ]
        });
        let lists = parse_hash_lists(&value).unwrap();
        let ids: Vec<i64> = lists.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 5, 9]);
        assert_eq!(lists[1].name, "float id");
    }

    #[test]
    fn test_list_without_array_is_invalid() {
        assert!(matches!(
            parse_hash_lists(&json!({"hash_lists": "nope"})),
            Err(ClientError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_hash_lists(&json!({"lists": []})),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_list_http_error_is_invalid_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/game/hashlist");
            then.status(500).body("upstream exploded");
        });

        let err = client_for(&server.base_url()).list_hash_lists().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("500"), "{}", msg);
        assert!(msg.contains("upstream exploded"), "{}", msg);
    }

    #[test]
    fn test_download_writes_one_entry_per_line() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/game/hashlist/42")
                .header("authorization", "Bearer test-token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"hash_list": ["5f4dcc3b5aa765d61d8327deb882cf99", "e10adc3949ba59abbe56e057f20f883e", 7]}));
        });

        let dir = tempfile::tempdir().unwrap();
        let outcome = client_for(&server.base_url())
            .download_hash_list("42", dir.path())
            .unwrap();

        mock.assert();
        assert_eq!(outcome.entries, 3);
        assert_eq!(outcome.path, dir.path().join("42.left"));
        let content = fs::read_to_string(&outcome.path).unwrap();
        assert_eq!(
            content,
            "5f4dcc3b5aa765d61d8327deb882cf99\ne10adc3949ba59abbe56e057f20f883e\n7\n"
        );
    }

    #[test]
    fn test_download_without_array_writes_nothing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/game/hashlist/3");
            then.status(200).json_body(json!({"message": "no such list"}));
        });

        let dir = tempfile::tempdir().unwrap();
        let err = client_for(&server.base_url())
            .download_hash_list("3", dir.path())
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
        assert!(!dir.path().join("3.left").exists());
    }

    #[test]
    fn test_empty_id_rejected_before_request() {
        let client = client_for("http://127.0.0.1:9");
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            client.download_hash_list("  ", dir.path()),
            Err(ClientError::InvalidId(..))
        ));
        assert!(matches!(
            client.submit("", &dir.path().join("x")),
            Err(ClientError::InvalidId(..))
        ));
    }

    #[test]
    fn test_id_with_path_separator_never_touches_disk() {
        let client = client_for("http://127.0.0.1:9");
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("work");
        fs::create_dir(&nested).unwrap();

        for id in ["../x", "a/b", "a\\b", "..", "."] {
            assert!(
                matches!(client.download_hash_list(id, &nested), Err(ClientError::InvalidId(..))),
                "{:?} accepted",
                id
            );
        }
        assert!(!dir.path().join("x.left").exists());
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn test_id_is_used_as_given() {
        assert_eq!(check_id(" 7").unwrap(), " 7");
        assert_eq!(check_id("list-7").unwrap(), "list-7");
    }

    #[test]
    fn test_submit_success_report() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/game/submit/12")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!({
                "hash_list_id": 12,
                "username": "alice",
                "found_count": 4,
                "added_score": 12.5,
                "total_score": 100.25,
                "new_items": ["a", "b"],
                "new_items_count": 99
            }));
        });

        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("cracked.txt");
        fs::write(&results, "a\nb\n").unwrap();

        let report = client_for(&server.base_url()).submit("12", &results).unwrap();

        mock.assert();
        assert_eq!(
            report,
            SubmissionReport {
                hash_list_id: "12".into(),
                username: "alice".into(),
                found_count: 4,
                added_score: 12.5,
                total_score: 100.25,
                new_items: 2,
                error: None,
            }
        );
    }

    #[test]
    fn test_submit_error_field_is_not_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/game/submit/12");
            then.status(400).json_body(json!({"error": "bad file"}));
        });

        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("cracked.txt");
        fs::write(&results, "a\n").unwrap();

        let report = client_for(&server.base_url()).submit("12", &results).unwrap();
        assert!(report.is_rejected());
        assert_eq!(report.error.as_deref(), Some("bad file"));
        assert_eq!(report.username, "unknown");
        assert_eq!(report.found_count, 0);
        assert_eq!(report.added_score, 0.0);
        assert_eq!(report.total_score, 0.0);
        assert_eq!(report.new_items, 0);
    }

    #[test]
    fn test_submit_missing_file_is_file_error() {
        let client = client_for("http://127.0.0.1:9");
        let dir = tempfile::tempdir().unwrap();
        let err = client.submit("1", &dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, ClientError::FileIo { .. }));
    }

    #[test]
    fn test_fractional_found_count_is_not_truncated() {
        let body = r#"{"hash_list_id":1,"username":"u","found_count":2.5,"added_score":1,"total_score":1,"new_items":[]}"#;
        let err = parse_submission("1", StatusCode::OK, body).unwrap_err();
        assert!(err.to_string().contains("found_count"));

        let body = r#"{"hash_list_id":1,"username":"u","found_count":3.0,"added_score":0.5,"total_score":7,"new_items":[1]}"#;
        let report = parse_submission("1", StatusCode::OK, body).unwrap();
        assert_eq!(report.found_count, 3);
        assert_eq!(report.total_score, 7.0);
    }

    #[test]
    fn test_submit_non_json_error_status() {
        let err = parse_submission("1", StatusCode::BAD_GATEWAY, "<html>gateway</html>").unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_submit_missing_fields_is_invalid() {
        let err = parse_submission("1", StatusCode::OK, r#"{"username":"u"}"#).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[test]
    fn test_downloaded_lines_reach_submit_body_unmodified() {
        let server = MockServer::start();
        let entries = [
            "$2y$10$abcdefghijklmnopqrstuv",
            "deadbeef:salt with spaces",
            "  padded  ",
        ];
        server.mock(|when, then| {
            when.method(GET).path("/api/game/hashlist/8");
            then.status(200).json_body(json!({ "hash_list": entries }));
        });

        let dir = tempfile::tempdir().unwrap();
        let outcome = client_for(&server.base_url())
            .download_hash_list("8", dir.path())
            .unwrap();
        let written = fs::read_to_string(&outcome.path).unwrap();
        assert_eq!(written, format!("{}\n", entries.join("\n")));

        let submit_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/game/submit/8")
                .header("authorization", "Bearer test-token")
                .body_includes("name=\"file\"")
                .body_includes("filename=\"8.left\"")
                .body_includes(entries[0])
                .body_includes(entries[1])
                .body_includes(entries[2])
                .body_includes(written.as_str());
            then.status(200).json_body(json!({"error": "ignored"}));
        });

        client_for(&server.base_url())
            .submit("8", &outcome.path)
            .unwrap();

        submit_mock.assert();
    }
}
