//! Session and message workflows over the backend gateway.
//!
//! These run inside spawned tasks; the app applies their results back onto
//! its stores when they complete.

use tracing::debug;

use crate::api::{ApiError, ChatBackend, ChatMessage, Session};

/// Title the backend assigns to a freshly created session.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 50;

/// Derive a session title from message content: the first 50 characters,
/// with an ellipsis marker when truncated. Counted in characters, not bytes.
pub fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Result of a completed submit workflow.
#[derive(Debug)]
pub struct SendOutcome {
    pub session_id: String,
    /// Full transcript returned by the server; replaces the message store.
    pub chats: Vec<ChatMessage>,
    /// Present when the workflow had to create the session first.
    pub created: Option<Session>,
    /// Present when the session was renamed as part of this submit.
    pub renamed_title: Option<String>,
}

/// Send `text`, creating a session first when none is active.
///
/// A brand-new session is always renamed after the first exchange; an
/// existing one only while its title is still the server default, so a
/// user-chosen title is never overwritten.
pub async fn submit_message(
    backend: &dyn ChatBackend,
    active: Option<&str>,
    text: &str,
) -> Result<SendOutcome, ApiError> {
    match active {
        None => {
            let session = backend.create_session().await?;
            let detail = backend.send_message(&session.id, text).await?;
            let renamed = match detail.chats.first() {
                Some(first) => {
                    let title = derive_title(&first.content);
                    backend.rename_session(&session.id, &title).await?;
                    Some(title)
                }
                None => None,
            };
            Ok(SendOutcome {
                session_id: session.id.clone(),
                chats: detail.chats,
                created: Some(session),
                renamed_title: renamed,
            })
        }
        Some(id) => {
            let detail = backend.send_message(id, text).await?;
            let renamed = match detail.chats.first() {
                Some(first) => {
                    let candidate = derive_title(&first.content);
                    if backend.get_session(id).await?.title == PLACEHOLDER_TITLE {
                        backend.rename_session(id, &candidate).await?;
                        Some(candidate)
                    } else {
                        None
                    }
                }
                None => None,
            };
            Ok(SendOutcome {
                session_id: id.to_string(),
                chats: detail.chats,
                created: None,
                renamed_title: renamed,
            })
        }
    }
}

/// Fetch the transcript for a session.
pub async fn load_transcript(
    backend: &dyn ChatBackend,
    id: &str,
) -> Result<Vec<ChatMessage>, ApiError> {
    let detail = backend.get_session(id).await?;
    debug!(session = %detail.id, messages = detail.chats.len(), "transcript loaded");
    Ok(detail.chats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Role, SessionDetail};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create,
        Send { id: String, message: String },
        Get { id: String },
        Rename { id: String, title: String },
    }

    struct ScriptedBackend {
        calls: Mutex<Vec<Call>>,
        stored_title: String,
        reply: Vec<ChatMessage>,
        fail_send: bool,
    }

    impl ScriptedBackend {
        fn new(stored_title: &str, reply: Vec<ChatMessage>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                stored_title: stored_title.to_string(),
                reply,
                fail_send: false,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn create_session(&self) -> Result<Session, ApiError> {
            self.record(Call::Create);
            Ok(Session {
                id: "S1".into(),
                title: PLACEHOLDER_TITLE.into(),
            })
        }

        async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
            Ok(Vec::new())
        }

        async fn get_session(&self, id: &str) -> Result<SessionDetail, ApiError> {
            self.record(Call::Get { id: id.into() });
            Ok(SessionDetail {
                id: id.into(),
                title: self.stored_title.clone(),
                chats: self.reply.clone(),
            })
        }

        async fn delete_session(&self, _id: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn rename_session(&self, id: &str, title: &str) -> Result<Session, ApiError> {
            self.record(Call::Rename {
                id: id.into(),
                title: title.into(),
            });
            Ok(Session {
                id: id.into(),
                title: title.into(),
            })
        }

        async fn send_message(&self, id: &str, message: &str) -> Result<SessionDetail, ApiError> {
            self.record(Call::Send {
                id: id.into(),
                message: message.into(),
            });
            if self.fail_send {
                return Err(ApiError::RequestFailed {
                    operation: "send message",
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            Ok(SessionDetail {
                id: id.into(),
                title: self.stored_title.clone(),
                chats: self.reply.clone(),
            })
        }
    }

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    #[test]
    fn short_content_becomes_the_title_unchanged() {
        assert_eq!(derive_title("Hello"), "Hello");
    }

    #[test]
    fn exactly_fifty_chars_is_not_truncated() {
        let content = "a".repeat(50);
        assert_eq!(derive_title(&content), content);
    }

    #[test]
    fn long_content_is_cut_at_fifty_chars_with_ellipsis() {
        let content = "b".repeat(60);
        let title = derive_title(&content);
        assert_eq!(title, format!("{}...", "b".repeat(50)));
        assert_eq!(title.chars().count(), 53);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "ä".repeat(51);
        let title = derive_title(&content);
        assert_eq!(title, format!("{}...", "ä".repeat(50)));
    }

    #[tokio::test]
    async fn first_send_creates_session_then_renames_unconditionally() {
        let reply = vec![msg(Role::User, "Hello"), msg(Role::Assistant, "Hi there")];
        let backend = ScriptedBackend::new(PLACEHOLDER_TITLE, reply.clone());

        let outcome = submit_message(&backend, None, "Hello").await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                Call::Create,
                Call::Send {
                    id: "S1".into(),
                    message: "Hello".into()
                },
                Call::Rename {
                    id: "S1".into(),
                    title: "Hello".into()
                },
            ]
        );
        assert_eq!(outcome.session_id, "S1");
        assert_eq!(outcome.chats, reply);
        assert!(outcome.created.is_some());
        assert_eq!(outcome.renamed_title.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn placeholder_title_is_replaced_by_truncated_first_message() {
        let long = "x".repeat(60);
        let reply = vec![msg(Role::User, &long), msg(Role::Assistant, "ok")];
        let backend = ScriptedBackend::new(PLACEHOLDER_TITLE, reply);

        let outcome = submit_message(&backend, Some("S2"), &long).await.unwrap();

        let expected_title = format!("{}...", "x".repeat(50));
        assert_eq!(
            backend.calls(),
            vec![
                Call::Send {
                    id: "S2".into(),
                    message: long.clone()
                },
                Call::Get { id: "S2".into() },
                Call::Rename {
                    id: "S2".into(),
                    title: expected_title.clone()
                },
            ]
        );
        assert_eq!(outcome.renamed_title, Some(expected_title));
    }

    #[tokio::test]
    async fn user_chosen_title_is_left_alone() {
        let reply = vec![msg(Role::User, "hi"), msg(Role::Assistant, "hello")];
        let backend = ScriptedBackend::new("My Trip", reply);

        let outcome = submit_message(&backend, Some("S3"), "hi").await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                Call::Send {
                    id: "S3".into(),
                    message: "hi".into()
                },
                Call::Get { id: "S3".into() },
            ]
        );
        assert!(outcome.renamed_title.is_none());
    }

    #[tokio::test]
    async fn empty_transcript_skips_the_rename() {
        let backend = ScriptedBackend::new(PLACEHOLDER_TITLE, Vec::new());

        let outcome = submit_message(&backend, None, "Hello").await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                Call::Create,
                Call::Send {
                    id: "S1".into(),
                    message: "Hello".into()
                },
            ]
        );
        assert!(outcome.renamed_title.is_none());
        assert!(outcome.chats.is_empty());
    }

    #[tokio::test]
    async fn send_failure_propagates() {
        let mut backend = ScriptedBackend::new(PLACEHOLDER_TITLE, Vec::new());
        backend.fail_send = true;

        let result = submit_message(&backend, Some("S4"), "hi").await;

        assert!(matches!(
            result,
            Err(ApiError::RequestFailed {
                operation: "send message",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn load_transcript_returns_the_server_transcript() {
        let reply = vec![msg(Role::Assistant, "stored")];
        let backend = ScriptedBackend::new("My Trip", reply.clone());

        let chats = load_transcript(&backend, "S5").await.unwrap();

        assert_eq!(chats, reply);
        assert_eq!(backend.calls(), vec![Call::Get { id: "S5".into() }]);
    }
}
