use crate::models::{validate_note_fields, FieldError, Note, NoteList, NoteTag};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// Transport failure, no response.
    Network,
    /// Non-2xx with a server-provided message.
    Server,
    /// 400/422 carrying field-level messages.
    Validation,
    /// 404.
    NotFound,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    pub field_errors: Vec<FieldError>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
            field_errors: vec![],
        }
    }

    fn server(message: String) -> Self {
        Self {
            kind: ApiErrorKind::Server,
            message,
            field_errors: vec![],
        }
    }

    fn not_found(message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound,
            message,
            field_errors: vec![],
        }
    }

    pub(crate) fn validation(message: String, field_errors: Vec<FieldError>) -> Self {
        Self {
            kind: ApiErrorKind::Validation,
            message,
            field_errors,
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Maps a non-2xx response to the error taxonomy. Pure so the mapping
/// is testable without a live server.
pub(crate) fn classify_response(status: u16, body: &str) -> ApiError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("Request failed ({status})")
            } else {
                trimmed.to_string()
            }
        });

    match status {
        404 => ApiError::not_found(message),
        400 | 422 => ApiError::validation(message, parse_field_errors(parsed.as_ref())),
        _ => ApiError::server(message),
    }
}

/// The server reports validation details either as an object of
/// field -> message(s) or as a bare array of messages. Accept both.
fn parse_field_errors(body: Option<&serde_json::Value>) -> Vec<FieldError> {
    let Some(errors) = body.and_then(|v| v.get("errors")) else {
        return vec![];
    };

    let mut out = Vec::new();

    if let Some(map) = errors.as_object() {
        for (field, value) in map {
            match value {
                serde_json::Value::String(msg) => out.push(FieldError::new(field, msg.clone())),
                serde_json::Value::Array(msgs) => {
                    for msg in msgs.iter().filter_map(|m| m.as_str()) {
                        out.push(FieldError::new(field, msg));
                    }
                }
                _ => {}
            }
        }
    } else if let Some(list) = errors.as_array() {
        for msg in list.iter().filter_map(|m| m.as_str()) {
            out.push(FieldError::new("", msg));
        }
    }

    out
}

/// Query pairs for GET /notes. Absent search/tag are omitted entirely
/// rather than sent empty, so the request shape matches the cache key.
pub(crate) fn list_notes_query(
    page: u32,
    per_page: u32,
    search: Option<&str>,
    tag: Option<NoteTag>,
) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("page", page.to_string()), ("perPage", per_page.to_string())];
    if let Some(s) = search {
        if !s.trim().is_empty() {
            pairs.push(("search", s.to_string()));
        }
    }
    if let Some(t) = tag {
        pairs.push(("tag", t.to_string()));
    }
    pairs
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CreateNoteRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub tag: NoteTag,
}

impl CreateNoteRequest {
    /// Pre-validation the gateway runs before building any request.
    pub fn precheck(&self) -> ApiResult<()> {
        let content = self.content.as_deref().unwrap_or_default();
        let errors = validate_note_fields(&self.title, content);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation("Invalid note".to_string(), errors))
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub api_url: String,
    pub token: Option<String>,
}

const DEFAULT_API_URL: &str = "https://notehub-public.goit.study/api";

impl EnvConfig {
    /// Process-wide configuration, read once from `window.ENV`.
    /// A missing token is fine; the service allows anonymous reads.
    pub fn new() -> Self {
        let mut cfg = Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
        };

        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"API_URL".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            cfg.api_url = url_str;
                        }
                    }
                    if let Ok(token) = js_sys::Reflect::get(&env, &"NOTEHUB_TOKEN".into()) {
                        cfg.token = token.as_string().filter(|t| !t.trim().is_empty());
                    }
                }
            }
        }

        cfg
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn from_env() -> Self {
        let cfg = EnvConfig::new();
        Self {
            base_url: cfg.api_url,
            token: cfg.token,
        }
    }

    fn with_auth_headers(
        mut req: reqwest::RequestBuilder,
        token: Option<&String>,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&impl serde::Serialize>,
    ) -> ApiResult<T> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.request(method, url);
        req = Self::with_auth_headers(req, self.token.as_ref());

        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            res.json()
                .await
                .map_err(|e| ApiError::server(format!("Invalid response body: {e}")))
        } else {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            Err(classify_response(status, &body))
        }
    }

    pub async fn list_notes(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
        tag: Option<NoteTag>,
    ) -> ApiResult<NoteList> {
        let query = list_notes_query(page, per_page, search, tag);
        self.request(reqwest::Method::GET, "/notes", &query, None::<&()>)
            .await
    }

    pub async fn get_note_by_id(&self, id: &str) -> ApiResult<Note> {
        self.request(
            reqwest::Method::GET,
            &format!("/notes/{}", urlencoding::encode(id)),
            &[],
            None::<&()>,
        )
        .await
    }

    pub async fn create_note(&self, payload: &CreateNoteRequest) -> ApiResult<Note> {
        payload.precheck()?;
        self.request(reqwest::Method::POST, "/notes", &[], Some(payload))
            .await
    }

    pub async fn delete_note(&self, id: &str) -> ApiResult<Note> {
        self.request(
            reqwest::Method::DELETE,
            &format!("/notes/{}", urlencoding::encode(id)),
            &[],
            None::<&()>,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let e = classify_response(404, r#"{"message": "Note not found"}"#);
        assert_eq!(e.kind, ApiErrorKind::NotFound);
        assert_eq!(e.message, "Note not found");
    }

    #[test]
    fn test_classify_validation_with_field_map() {
        let e = classify_response(
            400,
            r#"{"message": "Invalid note", "errors": {"title": ["Minimum 3 characters"]}}"#,
        );
        assert_eq!(e.kind, ApiErrorKind::Validation);
        assert_eq!(e.field_errors.len(), 1);
        assert_eq!(e.field_errors[0].field, "title");
        assert_eq!(e.field_errors[0].message, "Minimum 3 characters");
    }

    #[test]
    fn test_classify_validation_with_message_list() {
        let e = classify_response(422, r#"{"message": "Invalid", "errors": ["title too short"]}"#);
        assert_eq!(e.kind, ApiErrorKind::Validation);
        assert_eq!(e.field_errors.len(), 1);
        assert_eq!(e.field_errors[0].message, "title too short");
    }

    #[test]
    fn test_classify_server_error_plain_body() {
        let e = classify_response(500, "upstream exploded");
        assert_eq!(e.kind, ApiErrorKind::Server);
        assert_eq!(e.message, "upstream exploded");
    }

    #[test]
    fn test_classify_server_error_empty_body() {
        let e = classify_response(503, "");
        assert_eq!(e.kind, ApiErrorKind::Server);
        assert_eq!(e.message, "Request failed (503)");
    }

    #[test]
    fn test_list_query_omits_absent_params() {
        let q = list_notes_query(1, 12, None, None);
        assert_eq!(
            q,
            vec![("page", "1".to_string()), ("perPage", "12".to_string())]
        );
    }

    #[test]
    fn test_list_query_omits_blank_search() {
        let q = list_notes_query(2, 12, Some("   "), Some(NoteTag::Work));
        assert_eq!(
            q,
            vec![
                ("page", "2".to_string()),
                ("perPage", "12".to_string()),
                ("tag", "Work".to_string()),
            ]
        );
    }

    #[test]
    fn test_list_query_full() {
        let q = list_notes_query(3, 12, Some("groceries"), Some(NoteTag::Shopping));
        assert!(q.contains(&("search", "groceries".to_string())));
        assert!(q.contains(&("tag", "Shopping".to_string())));
    }

    #[test]
    fn test_create_precheck_rejects_short_title_before_any_request() {
        let req = CreateNoteRequest {
            title: "Hi".to_string(),
            content: None,
            tag: NoteTag::Todo,
        };
        let err = req.precheck().expect_err("two-char title should fail");
        assert_eq!(err.kind, ApiErrorKind::Validation);
        assert_eq!(err.field_errors[0].message, "Minimum 3 characters");
    }

    #[test]
    fn test_create_precheck_accepts_valid_payload() {
        let req = CreateNoteRequest {
            title: "Hi there".to_string(),
            content: Some("body".to_string()),
            tag: NoteTag::Meeting,
        };
        assert!(req.precheck().is_ok());
    }

    #[test]
    fn test_create_request_omits_absent_content() {
        let req = CreateNoteRequest {
            title: "Hi there".to_string(),
            content: None,
            tag: NoteTag::Todo,
        };
        let v = serde_json::to_value(&req).expect("should serialize");
        assert!(v.get("content").is_none());
        assert_eq!(v["tag"], "Todo");
    }

    #[test]
    fn test_api_client_new_has_no_token() {
        let client = ApiClient::new(DEFAULT_API_URL.to_string());
        assert_eq!(client.base_url, DEFAULT_API_URL);
        assert!(client.token.is_none());
    }
}
