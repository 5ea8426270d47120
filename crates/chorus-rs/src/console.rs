//! Terminal-backed chat platform.
//!
//! Every running bot sees every stdin line. Lines take the form
//! `[author@venue:] text`; a venue of `dm` makes it a direct message.
//! Replies are printed to stdout, and streamed edits print only the text
//! added since the last print.

use async_trait::async_trait;
use chorus_rs_protocol::{
    BotIdentity, ChatPlatform, InboundMessage, MessageHandle, PlatformConnection,
    PlatformConnector, PlatformError, PlatformEvent, Venue,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Author used for lines without an `author@venue:` prefix.
pub const DEFAULT_AUTHOR: &str = "operator";
/// Venue used for lines without an `author@venue:` prefix.
pub const DEFAULT_VENUE: &str = "console";
const DIRECT_VENUE: &str = "dm";
const EVENT_BUFFER: usize = 64;
/// Sent messages whose text is remembered for suffix printing.
const PRINTED_LIMIT: usize = 32;

/// Output sink shared by every console platform.
pub type ConsoleOutput = Arc<Mutex<Box<dyn Write + Send>>>;

/// Parse one input line into an inbound message. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<InboundMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let addressed = line.split_once(':').and_then(|(head, text)| {
        let (author, venue) = head.split_once('@')?;
        let valid = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
        (valid(author) && valid(venue)).then(|| (author, venue, text.trim()))
    });
    let (author, venue, text) = addressed.unwrap_or((DEFAULT_AUTHOR, DEFAULT_VENUE, line));
    if text.is_empty() {
        return None;
    }

    let venue = if venue == DIRECT_VENUE {
        Venue::direct(format!("dm-{author}"))
    } else {
        Venue::channel(venue, venue)
    };
    Some(InboundMessage {
        author_id: format!("console:{author}"),
        author_name: author.to_string(),
        venue,
        content: text.to_string(),
    })
}

/// Connects bots to the terminal.
pub struct ConsoleConnector {
    events: broadcast::Sender<PlatformEvent>,
    output: ConsoleOutput,
}

impl ConsoleConnector {
    /// Connector printing to stdout.
    pub fn stdout() -> Self {
        Self::with_output(Arc::new(Mutex::new(Box::new(io::stdout()))))
    }

    pub fn with_output(output: ConsoleOutput) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { events, output }
    }

    /// Deliver one input line to every connected bot. Returns how many
    /// bots received it.
    pub fn deliver_line(&self, line: &str) -> usize {
        let Some(message) = parse_line(line) else {
            return 0;
        };
        debug!(
            "console line (author={}, venue={})",
            message.author_name, message.venue.id
        );
        self.events.send(PlatformEvent::Message(message)).unwrap_or(0)
    }

    /// Read stdin on a background thread, delivering every line.
    ///
    /// The returned receiver resolves once stdin closes.
    pub fn attach_stdin(self: &Arc<Self>) -> io::Result<oneshot::Receiver<()>> {
        let (closed_tx, closed_rx) = oneshot::channel();
        let connector = self.clone();
        thread::Builder::new()
            .name("chorus-stdin".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if connector.deliver_line(&line) == 0 && !line.trim().is_empty() {
                                warn!("console line dropped, no bot connected");
                            }
                        }
                        Err(err) => {
                            warn!("stdin read failed (err={err})");
                            break;
                        }
                    }
                }
                info!("stdin closed");
                let _ = closed_tx.send(());
            })?;
        Ok(closed_rx)
    }
}

#[async_trait]
impl PlatformConnector for ConsoleConnector {
    async fn connect(&self, bot: &BotIdentity) -> Result<PlatformConnection, PlatformError> {
        let mut feed = self.events.subscribe();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let name = bot.name.clone();
        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("console feed lagged (bot={name}, skipped={skipped})");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        info!("console connected (bot={})", bot.name);
        Ok(PlatformConnection {
            platform: Arc::new(ConsolePlatform::new(&bot.name, self.output.clone())),
            events: rx,
        })
    }
}

/// One bot's view of the terminal.
pub struct ConsolePlatform {
    bot_name: String,
    output: ConsoleOutput,
    next_id: AtomicUsize,
    printed: Mutex<HashMap<String, String>>,
}

impl ConsolePlatform {
    pub fn new(bot_name: &str, output: ConsoleOutput) -> Self {
        Self {
            bot_name: bot_name.to_string(),
            output,
            next_id: AtomicUsize::new(1),
            printed: Mutex::new(HashMap::new()),
        }
    }

    fn write_line(&self, line: &str) -> Result<(), PlatformError> {
        let mut output = self.output.lock();
        writeln!(output, "{line}")
            .and_then(|_| output.flush())
            .map_err(|err| PlatformError::Delivery(err.to_string()))
    }
}

#[async_trait]
impl ChatPlatform for ConsolePlatform {
    fn self_id(&self) -> String {
        format!("console-bot:{}", self.bot_name)
    }

    async fn send(&self, venue: &Venue, text: &str) -> Result<MessageHandle, PlatformError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message_id = format!("{}-{id}", self.bot_name);
        self.write_line(&format!(
            "[{} #{id} @ {}] {text}",
            self.bot_name,
            venue.display_name()
        ))?;
        {
            let mut printed = self.printed.lock();
            printed.insert(message_id.clone(), text.to_string());
            if id > PRINTED_LIMIT {
                printed.remove(&format!("{}-{}", self.bot_name, id - PRINTED_LIMIT));
            }
        }
        Ok(MessageHandle {
            venue_id: venue.id.clone(),
            message_id,
        })
    }

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), PlatformError> {
        let previous = self.printed.lock().get(&handle.message_id).cloned();
        // Older messages are no longer tracked and get reprinted in full.
        let Some(previous) = previous else {
            return self.write_line(&format!("[{} edited] {text}", handle.message_id));
        };
        let line = match text.strip_prefix(previous.as_str()) {
            Some("") => None,
            Some(suffix) => Some(format!("[{} +] {suffix}", handle.message_id)),
            None => Some(format!("[{} edited] {text}", handle.message_id)),
        };
        if let Some(line) = line {
            self.write_line(&line)?;
        }
        if let Some(entry) = self.printed.lock().get_mut(&handle.message_id) {
            *entry = text.to_string();
        }
        Ok(())
    }

    async fn set_typing(&self, venue: &Venue, active: bool) -> Result<(), PlatformError> {
        debug!(
            "typing (bot={}, venue={}, active={active})",
            self.bot_name, venue.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_rs_protocol::VenueKind;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).to_string()
        }
    }

    fn output_into(buffer: &SharedBuffer) -> ConsoleOutput {
        Arc::new(Mutex::new(Box::new(buffer.clone())))
    }

    #[test]
    fn addressed_lines_carry_author_and_venue() {
        let message = parse_line("alice@general: hello there").expect("message");
        assert_eq!(message.author_name, "alice");
        assert_eq!(message.author_id, "console:alice");
        assert_eq!(message.venue, Venue::channel("general", "general"));
        assert_eq!(message.content, "hello there");
    }

    #[test]
    fn plain_lines_use_defaults() {
        let message = parse_line("what time is it: now?").expect("message");
        assert_eq!(message.author_name, DEFAULT_AUTHOR);
        assert_eq!(message.venue.id, DEFAULT_VENUE);
        assert_eq!(message.content, "what time is it: now?");
        assert!(parse_line("   ").is_none());
        assert!(parse_line("bob@general:   ").is_none());
    }

    #[test]
    fn dm_venue_is_direct() {
        let message = parse_line("bob@dm: psst").expect("message");
        assert_eq!(message.venue.kind, VenueKind::DirectMessage);
        assert_eq!(message.venue.display_name(), "A Direct Message");
    }

    #[tokio::test]
    async fn edits_print_only_the_new_suffix() {
        let buffer = SharedBuffer::default();
        let platform = ConsolePlatform::new("Ada", output_into(&buffer));
        let venue = Venue::channel("general", "general");

        let handle = platform.send(&venue, "Hel").await.expect("send");
        platform.edit(&handle, "Hello").await.expect("edit");
        platform.edit(&handle, "Hello").await.expect("edit");
        platform.edit(&handle, "Bye").await.expect("edit");

        assert_eq!(
            buffer.text(),
            "[Ada #1 @ general] Hel\n[Ada-1 +] lo\n[Ada-1 edited] Bye\n"
        );
    }

    #[tokio::test]
    async fn only_recent_messages_are_tracked() {
        let buffer = SharedBuffer::default();
        let platform = ConsolePlatform::new("Ada", output_into(&buffer));
        let venue = Venue::channel("general", "general");

        let first = platform.send(&venue, "one").await.expect("send");
        for _ in 0..PRINTED_LIMIT {
            platform.send(&venue, "more").await.expect("send");
        }
        assert_eq!(platform.printed.lock().len(), PRINTED_LIMIT);

        platform.edit(&first, "one two").await.expect("edit");
        assert!(buffer.text().ends_with("[Ada-1 edited] one two\n"));
        assert_eq!(platform.printed.lock().len(), PRINTED_LIMIT);
    }

    #[tokio::test]
    async fn lines_reach_every_connected_bot() {
        let connector = ConsoleConnector::with_output(output_into(&SharedBuffer::default()));
        let mut ada = connector
            .connect(&BotIdentity::new("Ada", true))
            .await
            .expect("connect");
        let mut bob = connector
            .connect(&BotIdentity::new("Bob", true))
            .await
            .expect("connect");

        assert_eq!(connector.deliver_line("carol@general: hi all"), 2);
        for connection in [&mut ada, &mut bob] {
            let Some(PlatformEvent::Message(message)) = connection.events.recv().await else {
                panic!("expected a message");
            };
            assert_eq!(message.content, "hi all");
        }
        assert_eq!(ada.platform.self_id(), "console-bot:Ada");
    }
}
