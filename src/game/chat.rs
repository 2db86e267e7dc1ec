//! Chat and event message construction

use uuid::Uuid;

use crate::ws::protocol::{ChatKind, ChatMessage};

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_CHAT_CHARS: usize = 200;
pub const DEFAULT_NAME: &str = "Player";
/// Display name used for server-originated messages
pub const SYSTEM_SENDER: &str = "Server";

/// Strip control characters, trim and cap a requested display name
pub fn sanitize_name(requested: &str) -> String {
    let cleaned: String = requested
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_end().to_string();

    if cleaned.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        cleaned
    }
}

/// Control characters stripped, trimmed and capped; `None` when nothing is
/// left to send
pub fn sanitize_text(text: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_CHAT_CHARS).collect())
}

pub fn player_message(
    sender: Uuid,
    name: &str,
    text: String,
    kind: ChatKind,
    now: u64,
) -> ChatMessage {
    ChatMessage {
        player_id: Some(sender),
        player_name: name.to_string(),
        message: text,
        timestamp: now,
        kind,
    }
}

pub fn system_message(text: String, now: u64) -> ChatMessage {
    server_message(text, ChatKind::System, now)
}

pub fn kill_message(attacker: &str, target: &str, self_kill: bool, now: u64) -> ChatMessage {
    let text = if self_kill {
        format!("{} blew themselves up", target)
    } else {
        format!("{} fragged {}", attacker, target)
    };
    server_message(text, ChatKind::Kill, now)
}

fn server_message(text: String, kind: ChatKind, now: u64) -> ChatMessage {
    ChatMessage {
        player_id: None,
        player_name: SYSTEM_SENDER.to_string(),
        message: text,
        timestamp: now,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Doomguy  "), "Doomguy");
        assert_eq!(sanitize_name(""), DEFAULT_NAME);
        assert_eq!(sanitize_name(" \n\t "), DEFAULT_NAME);
        assert_eq!(sanitize_name("bad\u{7}name"), "badname");
        assert_eq!(sanitize_name(&"x".repeat(50)).chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("   "), None);
        assert_eq!(sanitize_text(" gg "), Some("gg".to_string()));
        assert_eq!(
            sanitize_text(&"y".repeat(500)).map(|t| t.chars().count()),
            Some(MAX_CHAT_CHARS)
        );
    }

    #[test]
    fn test_kill_message() {
        let msg = kill_message("alice", "bob", false, 5);
        assert_eq!(msg.kind, ChatKind::Kill);
        assert_eq!(msg.player_id, None);
        assert_eq!(msg.message, "alice fragged bob");

        let msg = kill_message("bob", "bob", true, 5);
        assert_eq!(msg.message, "bob blew themselves up");

        // same display name is still a frag
        let msg = kill_message("Player", "Player", false, 5);
        assert_eq!(msg.message, "Player fragged Player");
    }

    #[test]
    fn test_control_only_text_is_dropped() {
        assert_eq!(sanitize_text("\u{7}\u{1b}"), None);
        assert_eq!(sanitize_text(" \u{7} \n"), None);
        assert_eq!(sanitize_text("\u{7} hi"), Some("hi".to_string()));
    }
}
