//! Terminal chat client
//!
//! Reads user turns from stdin and prints the assistant's reply as it
//! streams. Commands: `/attach <path>`, `/stop`, `/quit`. Ctrl-C stops the
//! running turn, or exits when idle.

use chat_session::attachments::load_file;
use chat_session::store::Part;
use chat_session::transport::Transport;
use chat_session::{
    tools, Attachment, ChatSession, HttpTransport, LoggingTransport, Role, SessionConfig,
    SessionSnapshot, SessionUpdate,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Session = ChatSession<LoggingTransport>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_session=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = SessionConfig::from_env();
    let http: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
    let session = Arc::new(ChatSession::new(LoggingTransport::new(http)));
    tracing::info!(session_id = %session.id(), endpoint = %config.endpoint, "Session started");

    let renderer = tokio::spawn(render(Arc::clone(&session)));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Vec<Attachment> = Vec::new();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                if session.is_loading() {
                    report(session.stop());
                    continue;
                }
                break;
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) => break,
            ("/stop", _) => {
                report(session.stop());
            }
            ("/attach", path) if !path.is_empty() => {
                match load_file(path, config.max_attachment_bytes).await {
                    Ok(attachment) => {
                        println!("[attached {} ({})]", attachment.filename, attachment.media_type);
                        pending.push(attachment);
                    }
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            ("", _) => {}
            _ => {
                if report(session.submit(line, &pending)).is_some() {
                    pending.clear();
                }
            }
        }
    }

    renderer.abort();
    Ok(())
}

fn report<T>(result: Result<T, chat_session::SessionError>) -> Option<T> {
    result.map_err(|e| eprintln!("error: {e}")).ok()
}

/// Print assistant output incrementally as the session changes
async fn render(session: Arc<Session>) {
    let mut updates = session.subscribe();
    let mut view = Transcript::default();
    loop {
        match updates.recv().await {
            Ok(SessionUpdate::MessagesChanged { .. }) | Err(RecvError::Lagged(_)) => {
                view.print(&session.snapshot());
            }
            Ok(SessionUpdate::StatusChanged { status }) => {
                view.print(&session.snapshot());
                if !status.is_loading() {
                    view.end_turn(&session.snapshot());
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// What has been printed so far for the latest assistant message
#[derive(Default)]
struct Transcript {
    message_id: Option<String>,
    text_printed: usize,
    tool_lines: HashMap<String, String>,
}

impl Transcript {
    fn print(&mut self, snapshot: &SessionSnapshot) {
        let Some(message) = snapshot.last_message().filter(|m| m.role == Role::Assistant) else {
            return;
        };
        if self.message_id.as_deref() != Some(message.id.as_str()) {
            self.message_id = Some(message.id.clone());
            self.text_printed = 0;
            self.tool_lines.clear();
        }

        let mut out = std::io::stdout().lock();
        for part in &message.parts {
            if let Part::ToolCall(call) = part {
                let line = tools::summarize(call);
                if self.tool_lines.get(&call.call_id) != Some(&line) {
                    let _ = writeln!(out, "\n[{line}]");
                    self.tool_lines.insert(call.call_id.clone(), line);
                }
            }
        }

        let text = message.text();
        if let Some(fresh) = text.get(self.text_printed..) {
            let _ = write!(out, "{fresh}");
            self.text_printed = text.len();
        }
        let _ = out.flush();
    }

    fn end_turn(&mut self, snapshot: &SessionSnapshot) {
        if let Some(error) = &snapshot.last_error {
            eprintln!("\n[turn failed: {error}]");
        }
        let current = self.message_id.take();
        if let Some(message) = snapshot
            .last_message()
            .filter(|m| current.as_deref() == Some(m.id.as_str()))
        {
            println!("\n[{}]", message.status.as_str());
        }
    }
}
