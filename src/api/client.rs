//! Authenticated HTTP client.
//!
//! Cheap to clone and shared across pages. Holds the token pair behind a
//! lock; every request attaches the bearer token, and a 401 triggers one
//! refresh attempt followed by a retry of the original request. A failed
//! refresh drops the session, which the app treats as "back to login".

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::grid::PageQuery;

use super::error::ApiError;
use super::models::{
    ChangeGroup, ConfigRaw, Credentials, DeviceResults, Envelope, GroupResults, GroupUpdate,
    NewGroup, NewUser, PatchRaw, RefreshRequest, TokenPair, UserRaw,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    session: RwLock<Option<TokenPair>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                base_url: base_url.into(),
                http,
                timeout,
                session: RwLock::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn has_session(&self) -> bool {
        self.session().is_some()
    }

    pub fn logout(&self) {
        self.set_session(None);
    }

    fn session(&self) -> Option<TokenPair> {
        // A poisoned lock means a panic elsewhere; treat it as logged out.
        self.inner.session.read().map_or(None, |guard| guard.clone())
    }

    fn set_session(&self, session: Option<TokenPair>) {
        if let Ok(mut guard) = self.inner.session.write() {
            *guard = session;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url.trim_end_matches('/'), path)
    }

    // === Auth ===

    pub async fn login(&self, username: String, password: String) -> Result<(), ApiError> {
        debug!(username, "logging in");
        let response = self
            .inner
            .http
            .post(self.url("/api/auth/login"))
            .json(&Credentials { username, password })
            .send()
            .await
            .map_err(|err| self.map_send_err(err))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ApiError::status(status, error_message(response).await));
        }

        let pair: TokenPair = response.json().await?;
        self.set_session(Some(pair));
        Ok(())
    }

    async fn refresh(&self) -> Result<(), ApiError> {
        let Some(session) = self.session() else {
            return Err(ApiError::Unauthorized);
        };
        debug!("refreshing access token");
        let response = self
            .inner
            .http
            .post(self.url("/api/auth/refresh"))
            .json(&RefreshRequest {
                refresh_token: session.refresh_token,
            })
            .send()
            .await
            .map_err(|err| self.map_send_err(err))?;

        if response.status().is_success() {
            let pair: TokenPair = response.json().await?;
            self.set_session(Some(pair));
            Ok(())
        } else {
            warn!("token refresh rejected, dropping session");
            self.set_session(None);
            Err(ApiError::Unauthorized)
        }
    }

    // === Plumbing ===

    fn map_send_err(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.inner.timeout)
        } else {
            ApiError::Network(err)
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let mut refreshed = false;
        loop {
            let mut request = self.inner.http.request(method.clone(), self.url(path));
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(session) = self.session() {
                request = request.bearer_auth(&session.token);
            }

            debug!(%method, path, "sending request");
            let response = request.send().await.map_err(|err| self.map_send_err(err))?;

            if response.status() == StatusCode::UNAUTHORIZED && !refreshed {
                refreshed = true;
                self.refresh().await?;
                continue;
            }
            if !response.status().is_success() {
                let status = response.status().as_u16();
                return Err(ApiError::status(status, error_message(response).await));
            }
            return Ok(response);
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path, query, None).await?;
        Ok(response.json().await?)
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(), ApiError> {
        self.request(method, path, &[], body.as_ref()).await?;
        Ok(())
    }

    // === Endpoints ===

    pub async fn groups(&self, query: &PageQuery) -> Result<Envelope<GroupResults>, ApiError> {
        self.get_json("/api/groups", &page_params(query)).await
    }

    pub async fn create_group(&self, group: &NewGroup) -> Result<(), ApiError> {
        self.send_json(Method::POST, "/api/groups", Some(serde_json::to_value(group)?))
            .await
    }

    pub async fn update_group(&self, group_id: &str, update: &GroupUpdate) -> Result<(), ApiError> {
        self.send_json(
            Method::PUT,
            &format!("/api/groups/{group_id}"),
            Some(serde_json::to_value(update)?),
        )
        .await
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<(), ApiError> {
        self.send_json(Method::DELETE, &format!("/api/groups/{group_id}"), None)
            .await
    }

    pub async fn devices(&self, query: &PageQuery) -> Result<Envelope<DeviceResults>, ApiError> {
        self.get_json("/api/devices", &page_params(query)).await
    }

    pub async fn change_device_group(
        &self,
        device_id: &str,
        group_id: String,
    ) -> Result<(), ApiError> {
        self.send_json(
            Method::POST,
            &format!("/api/devices/{device_id}/group"),
            Some(serde_json::to_value(ChangeGroup { group_id })?),
        )
        .await
    }

    pub async fn configs(&self, query: &PageQuery) -> Result<Envelope<Vec<ConfigRaw>>, ApiError> {
        self.get_json("/api/configs", &page_params(query)).await
    }

    pub async fn set_default_config(&self, config_id: &str) -> Result<(), ApiError> {
        self.send_json(Method::POST, &format!("/api/configs/{config_id}/default"), None)
            .await
    }

    pub async fn patches(&self, query: &PageQuery) -> Result<Envelope<Vec<PatchRaw>>, ApiError> {
        self.get_json("/api/patches", &page_params(query)).await
    }

    pub async fn set_default_patch(&self, patch_id: &str) -> Result<(), ApiError> {
        self.send_json(Method::POST, &format!("/api/patches/{patch_id}/default"), None)
            .await
    }

    /// The users endpoint is not paginated; the page filters locally.
    pub async fn users(&self) -> Result<Vec<UserRaw>, ApiError> {
        self.get_json("/api/users", &[]).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<(), ApiError> {
        self.send_json(Method::POST, "/api/users", Some(serde_json::to_value(user)?))
            .await
    }
}

/// Wire pagination params: the backend counts pages from 1 while the UI
/// counts from 0, and an empty search is omitted entirely.
fn page_params(query: &PageQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", (query.page_index + 1).to_string()),
        ("page_size", query.page_size.to_string()),
    ];
    if !query.search.is_empty() {
        params.push(("searchText", query.search.clone()));
    }
    params
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull a human-readable message out of an error response, falling back
/// to the raw body.
async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_are_one_based_on_the_wire() {
        let query = PageQuery {
            search: String::new(),
            page_index: 0,
            page_size: 9,
        };
        let params = page_params(&query);
        assert_eq!(
            params,
            vec![("page", "1".to_string()), ("page_size", "9".to_string())]
        );
    }

    #[test]
    fn empty_search_is_omitted() {
        let query = PageQuery {
            search: "pump".to_string(),
            page_index: 2,
            page_size: 25,
        };
        let params = page_params(&query);
        assert_eq!(params[0], ("page", "3".to_string()));
        assert!(params.contains(&("searchText", "pump".to_string())));
    }

    #[test]
    fn client_starts_without_session() {
        let client = ApiClient::new("http://localhost:8000", DEFAULT_TIMEOUT).unwrap();
        assert!(!client.has_session());
        client.logout();
        assert!(!client.has_session());
    }

    use std::sync::Mutex;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serves one canned response per connection, in order, and records
    /// each raw request (head and body) for assertions.
    async fn canned_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut raw = Vec::new();
                let mut chunk = [0u8; 4096];
                let head_end = loop {
                    if let Some(i) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        break i + 4;
                    }
                    let Ok(n) = stream.read(&mut chunk).await else {
                        return;
                    };
                    if n == 0 {
                        return;
                    }
                    raw.extend_from_slice(&chunk[..n]);
                };
                let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
                let body_len = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                while raw.len() < head_end + body_len {
                    let Ok(n) = stream.read(&mut chunk).await else {
                        return;
                    };
                    if n == 0 {
                        break;
                    }
                    raw.extend_from_slice(&chunk[..n]);
                }
                log.lock().unwrap().push(String::from_utf8_lossy(&raw).to_string());
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        (base_url, seen)
    }

    fn token_body(token: &str, refresh: &str) -> String {
        format!(r#"{{"token": "{token}", "refreshToken": "{refresh}"}}"#)
    }

    #[tokio::test]
    async fn a_401_refreshes_once_and_retries_with_the_new_token() {
        let (base_url, seen) = canned_server(vec![
            http_response("200 OK", &token_body("t1", "r1")),
            http_response("401 Unauthorized", "{}"),
            http_response("200 OK", &token_body("t2", "r2")),
            http_response("200 OK", "[]"),
        ])
        .await;

        let client = ApiClient::new(base_url, DEFAULT_TIMEOUT).unwrap();
        client
            .login("admin".to_string(), "secret".to_string())
            .await
            .unwrap();

        let users = client.users().await.unwrap();
        assert!(users.is_empty());
        assert!(client.has_session());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen[1].contains("Bearer t1"));
        assert!(seen[2].starts_with("POST /api/auth/refresh"));
        assert!(seen[2].contains("r1"));
        assert!(seen[3].contains("Bearer t2"));
    }

    #[tokio::test]
    async fn rejected_refresh_drops_the_session_and_surfaces_unauthorized() {
        let (base_url, seen) = canned_server(vec![
            http_response("200 OK", &token_body("t1", "r1")),
            http_response("401 Unauthorized", "{}"),
            http_response("401 Unauthorized", r#"{"message": "refresh token expired"}"#),
        ])
        .await;

        let client = ApiClient::new(base_url, DEFAULT_TIMEOUT).unwrap();
        client
            .login("admin".to_string(), "secret".to_string())
            .await
            .unwrap();
        assert!(client.has_session());

        let err = client.users().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!client.has_session());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3, "the original request is not retried");
    }
}
