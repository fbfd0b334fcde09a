use std::sync::Arc;

use futures_util::future::FutureExt;
use ratatui::widgets::ListState;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

use crate::api::{ApiError, AuthUser, ChatBackend, ChatMessage, Role, Session};
use crate::chat::{self, SendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Transient status line message, expires after a few ticks.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    pub ttl: u8,
}

// Ticks arrive every 300ms, so this is roughly 3.5 seconds on screen.
const NOTICE_TTL: u8 = 12;

/// In-flight submit. The optimistic entry is remembered so it can be
/// rolled back if the workflow fails.
struct SendTask {
    handle: JoinHandle<Result<SendOutcome, ApiError>>,
    /// Active session at submit time; `None` means the new-session branch.
    target: Option<String>,
    optimistic: ChatMessage,
}

struct LoadTask {
    handle: JoinHandle<Result<Vec<ChatMessage>, ApiError>>,
    token: u64,
}

struct DeleteTask {
    handle: JoinHandle<Result<(), ApiError>>,
    session_id: String,
}

pub struct App {
    pub should_quit: bool,
    pub focus: FocusPane,
    pub input_mode: InputMode,
    pub user: AuthUser,

    // Session store (sidebar)
    pub sessions: Vec<Session>,
    pub session_state: ListState,
    pub sidebar_collapsed: bool,
    pub sessions_loading: bool,

    // Message store for the active session
    pub chat_messages: Vec<ChatMessage>,
    pub active_session_id: Option<String>,

    // Input box
    pub input: String,
    pub input_cursor: usize,

    // Transient UI state
    pub notice: Option<Notice>,
    pub confirm_delete: Option<String>,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub animation_frame: u8,

    // In-flight work
    send_task: Option<SendTask>,
    load_task: Option<LoadTask>,
    create_task: Option<JoinHandle<Result<Session, ApiError>>>,
    sessions_task: Option<JoinHandle<Result<Vec<Session>, ApiError>>>,
    delete_tasks: Vec<DeleteTask>,
    /// Monotonic token: a transcript fetch is only applied while it is
    /// still the newest selection.
    load_token: u64,

    backend: Arc<dyn ChatBackend>,
}

impl App {
    pub fn new(backend: Arc<dyn ChatBackend>, user: AuthUser) -> Self {
        Self {
            should_quit: false,
            focus: FocusPane::Sidebar,
            input_mode: InputMode::Normal,
            user,

            sessions: Vec::new(),
            session_state: ListState::default(),
            sidebar_collapsed: false,
            sessions_loading: false,

            chat_messages: Vec::new(),
            active_session_id: None,

            input: String::new(),
            input_cursor: 0,

            notice: None,
            confirm_delete: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,

            send_task: None,
            load_task: None,
            create_task: None,
            sessions_task: None,
            delete_tasks: Vec::new(),
            load_token: 0,

            backend,
        }
    }

    pub fn sending(&self) -> bool {
        self.send_task.is_some()
    }

    pub fn loading_transcript(&self) -> bool {
        self.load_task.is_some()
    }

    pub fn notify_info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind: NoticeKind::Info,
            ttl: NOTICE_TTL,
        });
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind: NoticeKind::Error,
            ttl: NOTICE_TTL,
        });
    }

    /// Advance animation and expire notices. Driven by the 300ms tick.
    pub fn tick(&mut self) {
        if self.sending() || self.loading_transcript() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(notice) = &mut self.notice {
            notice.ttl = notice.ttl.saturating_sub(1);
            if notice.ttl == 0 {
                self.notice = None;
            }
        }
    }

    // Sidebar navigation

    pub fn selected_session(&self) -> Option<&Session> {
        self.session_state
            .selected()
            .and_then(|i| self.sessions.get(i))
    }

    pub fn sidebar_nav_down(&mut self) {
        let len = self.sessions.len();
        if len > 0 {
            let i = self.session_state.selected().unwrap_or(0);
            self.session_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_nav_up(&mut self) {
        let i = self.session_state.selected().unwrap_or(0);
        self.session_state.select(Some(i.saturating_sub(1)));
    }

    pub fn sidebar_nav_first(&mut self) {
        if !self.sessions.is_empty() {
            self.session_state.select(Some(0));
        }
    }

    pub fn sidebar_nav_last(&mut self) {
        let len = self.sessions.len();
        if len > 0 {
            self.session_state.select(Some(len - 1));
        }
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
    }

    // Session lifecycle

    pub fn start_session_list_load(&mut self) {
        if self.sessions_task.is_some() {
            return;
        }
        self.sessions_loading = true;
        let backend = Arc::clone(&self.backend);
        self.sessions_task = Some(tokio::spawn(async move { backend.list_sessions().await }));
    }

    /// Make the highlighted sidebar entry the active session and fetch
    /// its transcript.
    pub fn activate_selected(&mut self) {
        if let Some(session) = self.selected_session().cloned() {
            self.set_active(session.id);
        }
    }

    fn set_active(&mut self, id: String) {
        self.active_session_id = Some(id.clone());
        self.load_token += 1;
        let token = self.load_token;
        let backend = Arc::clone(&self.backend);
        self.load_task = Some(LoadTask {
            token,
            handle: tokio::spawn(async move { chat::load_transcript(backend.as_ref(), &id).await }),
        });
    }

    pub fn create_session(&mut self) {
        if self.create_task.is_some() {
            return;
        }
        let backend = Arc::clone(&self.backend);
        self.create_task = Some(tokio::spawn(async move { backend.create_session().await }));
    }

    /// Ask for confirmation before deleting the highlighted session. The
    /// selection itself is left untouched.
    pub fn request_delete_selected(&mut self) {
        if let Some(session) = self.selected_session() {
            self.confirm_delete = Some(session.id.clone());
        }
    }

    pub fn cancel_pending_delete(&mut self) {
        self.confirm_delete = None;
    }

    /// Optimistic removal: the entry goes away now and stays gone no
    /// matter what the backend says about the delete call.
    pub fn confirm_pending_delete(&mut self) {
        let Some(id) = self.confirm_delete.take() else {
            return;
        };
        if let Some(idx) = self.sessions.iter().position(|s| s.id == id) {
            self.sessions.remove(idx);
            let len = self.sessions.len();
            if len == 0 {
                self.session_state.select(None);
            } else if let Some(selected) = self.session_state.selected() {
                if selected >= len {
                    self.session_state.select(Some(len - 1));
                }
            }
        }
        if self.active_session_id.as_deref() == Some(id.as_str()) {
            self.active_session_id = None;
            self.chat_messages.clear();
            self.chat_scroll = 0;
        }
        info!(session = %id, "deleting session");
        let backend = Arc::clone(&self.backend);
        let task_id = id.clone();
        self.delete_tasks.push(DeleteTask {
            session_id: id,
            handle: tokio::spawn(async move { backend.delete_session(&task_id).await }),
        });
    }

    // Message submission

    /// Validate and send the input box contents. Appends the user message
    /// optimistically and clears the input before the network call runs.
    pub fn submit_input(&mut self) {
        if self.send_task.is_some() {
            return;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            self.notify_error("Message is empty");
            return;
        }
        self.input.clear();
        self.input_cursor = 0;

        let optimistic = ChatMessage {
            role: Role::User,
            content: text.clone(),
        };
        self.chat_messages.push(optimistic.clone());
        self.scroll_to_bottom();

        let target = self.active_session_id.clone();
        let backend = Arc::clone(&self.backend);
        let flow_target = target.clone();
        let handle = tokio::spawn(async move {
            chat::submit_message(backend.as_ref(), flow_target.as_deref(), &text).await
        });
        self.send_task = Some(SendTask {
            handle,
            target,
            optimistic,
        });
    }

    // Task completion

    /// Poll in-flight work without blocking; called every loop iteration.
    pub fn poll_tasks(&mut self) {
        let send_done = self
            .send_task
            .as_mut()
            .and_then(|t| (&mut t.handle).now_or_never());
        if let Some(joined) = send_done {
            let task = self.send_task.take().expect("send task present");
            self.apply_send_result(task.target, task.optimistic, flatten(joined));
        }

        let load_done = self
            .load_task
            .as_mut()
            .and_then(|t| (&mut t.handle).now_or_never());
        if let Some(joined) = load_done {
            let task = self.load_task.take().expect("load task present");
            if task.token == self.load_token {
                self.apply_load_result(flatten(joined));
            } else {
                debug!("discarding transcript for a superseded selection");
            }
        }

        let create_done = self.create_task.as_mut().and_then(|t| t.now_or_never());
        if let Some(joined) = create_done {
            self.create_task = None;
            self.apply_create_result(flatten(joined));
        }

        let sessions_done = self.sessions_task.as_mut().and_then(|t| t.now_or_never());
        if let Some(joined) = sessions_done {
            self.sessions_task = None;
            self.sessions_loading = false;
            self.apply_sessions_result(flatten(joined));
        }

        let mut still_running = Vec::new();
        for mut task in std::mem::take(&mut self.delete_tasks) {
            match (&mut task.handle).now_or_never() {
                Some(joined) => {
                    if let Err(err) = flatten(joined) {
                        error!(session = %task.session_id, error = %err, "delete session failed");
                        self.notify_error("Failed to delete session on server");
                    }
                }
                None => still_running.push(task),
            }
        }
        self.delete_tasks = still_running;
    }

    fn apply_send_result(
        &mut self,
        target: Option<String>,
        optimistic: ChatMessage,
        result: Result<SendOutcome, String>,
    ) {
        match result {
            Ok(outcome) => {
                if let Some(title) = &outcome.renamed_title {
                    if let Some(entry) =
                        self.sessions.iter_mut().find(|s| s.id == outcome.session_id)
                    {
                        entry.title = title.clone();
                    }
                }
                match outcome.created {
                    Some(mut session) => {
                        if let Some(title) = &outcome.renamed_title {
                            session.title = title.clone();
                        }
                        self.sessions.insert(0, session);
                        if self.active_session_id.is_none() {
                            self.session_state.select(Some(0));
                            self.active_session_id = Some(outcome.session_id);
                            self.chat_messages = outcome.chats;
                            self.scroll_to_bottom();
                        } else if let Some(selected) = self.session_state.selected() {
                            // The user moved on mid-send; keep their
                            // highlight on the same entry.
                            self.session_state.select(Some(selected + 1));
                        }
                    }
                    None => {
                        // A late completion after a session switch must not
                        // clobber another session's transcript.
                        if self.active_session_id.as_deref() == Some(outcome.session_id.as_str()) {
                            self.chat_messages = outcome.chats;
                            self.scroll_to_bottom();
                        }
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "send workflow failed");
                if self.active_session_id == target
                    && self.chat_messages.last() == Some(&optimistic)
                {
                    self.chat_messages.pop();
                }
                self.notify_error("Failed to send message");
            }
        }
    }

    fn apply_load_result(&mut self, result: Result<Vec<ChatMessage>, String>) {
        match result {
            Ok(chats) => {
                self.chat_messages = chats;
                self.scroll_to_bottom();
            }
            Err(err) => {
                error!(error = %err, "loading session transcript failed");
                self.notify_error("Failed to load session");
            }
        }
    }

    fn apply_create_result(&mut self, result: Result<Session, String>) {
        match result {
            Ok(session) => {
                let id = session.id.clone();
                self.sessions.insert(0, session);
                self.session_state.select(Some(0));
                self.chat_messages.clear();
                self.chat_scroll = 0;
                self.set_active(id);
                self.notify_info("Started a new chat");
            }
            Err(err) => {
                error!(error = %err, "create session failed");
                self.notify_error("Failed to create session");
            }
        }
    }

    fn apply_sessions_result(&mut self, result: Result<Vec<Session>, String>) {
        match result {
            Ok(sessions) => {
                self.sessions = sessions;
                if self.session_state.selected().is_none() && !self.sessions.is_empty() {
                    self.session_state.select(Some(0));
                }
            }
            Err(err) => {
                error!(error = %err, "loading session list failed");
                self.notify_error("Failed to load sessions");
            }
        }
    }

    // Transcript scrolling

    /// Approximate rendered height of the transcript, mirroring how the
    /// message view wraps lines.
    fn transcript_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            60
        };
        let mut total: u16 = 0;
        for msg in &self.chat_messages {
            total += 1; // role line
            for line in msg.content.lines() {
                let chars = line.chars().count();
                total += if chars == 0 {
                    1
                } else {
                    (chars / wrap_width + 1) as u16
                };
            }
            total += 1; // blank line between messages
        }
        if self.sending() {
            total += 2; // "Assistant" + "Thinking..."
        }
        total
    }

    pub fn scroll_to_bottom(&mut self) {
        let height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_scroll = self.transcript_lines().saturating_sub(height);
    }

    pub fn scroll_down(&mut self) {
        let max = self
            .transcript_lines()
            .saturating_sub(self.chat_height.max(1));
        if self.chat_scroll < max {
            self.chat_scroll += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Called during render once the chat area dimensions are known.
    pub fn clamp_chat_scroll(&mut self) {
        let max = self
            .transcript_lines()
            .saturating_sub(self.chat_height.max(1));
        if self.chat_scroll > max {
            self.chat_scroll = max;
        }
    }

    #[cfg(test)]
    fn busy(&self) -> bool {
        self.send_task.is_some()
            || self.load_task.is_some()
            || self.create_task.is_some()
            || self.sessions_task.is_some()
            || !self.delete_tasks.is_empty()
    }
}

fn flatten<T>(joined: Result<Result<T, ApiError>, JoinError>) -> Result<T, String> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) => Err(format!("background task failed: {err}")),
    }
}
