use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
}

/// Full session record: metadata plus the ordered transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetail {
    pub id: String,
    pub title: String,
    pub chats: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{operation} failed with status {status}")]
    RequestFailed {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("{operation}: request could not be completed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: malformed response body")]
    BadPayload {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RenameRequest<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    message: &'a str,
}

/// Session and message operations the chat screen is built on. Split out
/// from [`ApiClient`] so the workflows can run against a scripted fake.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create_session(&self) -> Result<Session, ApiError>;
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;
    async fn get_session(&self, id: &str) -> Result<SessionDetail, ApiError>;
    async fn delete_session(&self, id: &str) -> Result<(), ApiError>;
    async fn rename_session(&self, id: &str, title: &str) -> Result<Session, ApiError>;
    async fn send_message(&self, id: &str, message: &str) -> Result<SessionDetail, ApiError>;
}

/// Thin wrapper over the backend's HTTP surface. One request per call,
/// one expected status code, no retries.
pub struct ApiClient {
    client: Client,
    base_url: String,
    cookie: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, cookie: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(cookie) = &self.cookie {
            req = req.header(header::COOKIE, cookie.as_str());
        }
        req
    }

    async fn expect_status(
        operation: &'static str,
        expected: StatusCode,
        req: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = req
            .send()
            .await
            .map_err(|source| ApiError::Transport { operation, source })?;
        let status = response.status();
        if status != expected {
            warn!(operation, %status, "backend rejected request");
            return Err(ApiError::RequestFailed { operation, status });
        }
        debug!(operation, %status, "backend call ok");
        Ok(response)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|source| ApiError::BadPayload { operation, source })
    }

    /// Logs in and returns the user plus the raw `name=value` cookies the
    /// server set, so the caller can persist them for later invocations.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(AuthUser, Vec<String>), ApiError> {
        let op = "login";
        let req = self
            .request(Method::POST, "/users/login")
            .json(&LoginRequest { email, password });
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::to_string)
            .collect();
        let user = Self::parse(op, response).await?;
        Ok((user, cookies))
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ApiError> {
        let op = "signup";
        let req = self
            .request(Method::POST, "/users/signup")
            .json(&SignupRequest {
                name,
                email,
                password,
            });
        let response = Self::expect_status(op, StatusCode::CREATED, req).await?;
        Self::parse(op, response).await
    }

    pub async fn auth_status(&self) -> Result<AuthUser, ApiError> {
        let op = "auth-status";
        let req = self.request(Method::GET, "/users/auth-status");
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        Self::parse(op, response).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let op = "logout";
        let req = self.request(Method::GET, "/users/logout");
        Self::expect_status(op, StatusCode::OK, req).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn create_session(&self) -> Result<Session, ApiError> {
        let op = "create session";
        let req = self.request(Method::POST, "/sessions/");
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        Self::parse(op, response).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let op = "list sessions";
        let req = self.request(Method::GET, "/sessions/user");
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        Self::parse(op, response).await
    }

    async fn get_session(&self, id: &str) -> Result<SessionDetail, ApiError> {
        let op = "get session";
        let req = self.request(Method::GET, &format!("/sessions/{id}"));
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        Self::parse(op, response).await
    }

    async fn delete_session(&self, id: &str) -> Result<(), ApiError> {
        let op = "delete session";
        let req = self.request(Method::DELETE, &format!("/sessions/{id}"));
        Self::expect_status(op, StatusCode::OK, req).await?;
        Ok(())
    }

    async fn rename_session(&self, id: &str, title: &str) -> Result<Session, ApiError> {
        let op = "rename session";
        let req = self
            .request(Method::PATCH, &format!("/sessions/{id}"))
            .json(&RenameRequest { title });
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        Self::parse(op, response).await
    }

    async fn send_message(&self, id: &str, message: &str) -> Result<SessionDetail, ApiError> {
        let op = "send message";
        let req = self
            .request(Method::POST, &format!("/sessions/{id}/messages"))
            .json(&SendMessageRequest { message });
        let response = Self::expect_status(op, StatusCode::OK, req).await?;
        Self::parse(op, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_uses_lowercase_wire_form() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"assistant\"").unwrap(),
            Role::Assistant
        );
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
    }

    #[test]
    fn session_detail_parses_canonical_shape() {
        let raw = r#"{
            "id": "S1",
            "title": "New Chat",
            "chats": [
                {"role": "user", "content": "Hello"},
                {"role": "assistant", "content": "Hi there"}
            ]
        }"#;
        let detail: SessionDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.id, "S1");
        assert_eq!(detail.title, "New Chat");
        assert_eq!(detail.chats.len(), 2);
        assert_eq!(detail.chats[0].role, Role::User);
        assert_eq!(detail.chats[1].content, "Hi there");
    }

    #[test]
    fn request_failed_names_the_operation() {
        let err = ApiError::RequestFailed {
            operation: "send message",
            status: StatusCode::BAD_GATEWAY,
        };
        let text = err.to_string();
        assert!(text.contains("send message"));
        assert!(text.contains("502"));
    }
}
