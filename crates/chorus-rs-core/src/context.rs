//! System context composition and history windowing.

use chorus_rs_config::ContextWindow;
use chorus_rs_protocol::Message;

/// Join the bot prompt, an optional venue hint, and the time annotation.
pub fn compose_system_context(prompt: &str, venue_hint: Option<&str>, annotation: &str) -> String {
    let mut context = String::with_capacity(
        prompt.len() + venue_hint.map_or(0, str::len) + annotation.len(),
    );
    context.push_str(prompt);
    if let Some(hint) = venue_hint {
        context.push_str(hint);
    }
    context.push_str(annotation);
    context
}

/// The slice of history sent with a generation.
pub fn apply_window(messages: &[Message], window: ContextWindow) -> &[Message] {
    match window {
        ContextWindow::Full => messages,
        ContextWindow::Recent(n) => &messages[messages.len().saturating_sub(n)..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn system_context_keeps_part_order() {
        assert_eq!(
            compose_system_context("You are Ada.", Some(" Be brief."), "\nCurrent Time: now"),
            "You are Ada. Be brief.\nCurrent Time: now"
        );
        assert_eq!(
            compose_system_context("You are Ada.", None, "\nCurrent Time: now"),
            "You are Ada.\nCurrent Time: now"
        );
    }

    #[test]
    fn recent_window_keeps_the_tail() {
        let messages: Vec<_> = (0..6)
            .map(|idx| Message::user(format!("m{idx}"), None, None))
            .collect();
        assert_eq!(apply_window(&messages, ContextWindow::Full).len(), 6);
        let recent = apply_window(&messages, ContextWindow::Recent(5));
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "m1");
        assert_eq!(apply_window(&messages[..2], ContextWindow::Recent(5)).len(), 2);
    }
}
