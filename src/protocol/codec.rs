//! Tolerant message parsing and strict serialization.
//!
//! The wire shape is a single `message` element with optional `from`/`to`
//! attributes and a literal text body:
//!
//! ```text
//! <message from='chatbot' to='user'>hello</message>
//! ```
//!
//! Parsing must cope with whatever a streaming model emits: a complete
//! document, a bare fragment, or a prefix cut off mid-stream. It therefore
//! runs a tiered recovery and always returns a [`Message`]; when every tier
//! fails the result is [`Message::placeholder`], which means "keep
//! buffering", never an error.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::message::Message;

/// Parse arbitrary text into a [`Message`]. Never fails.
///
/// Tiers, first success wins:
/// 1. the whole input is one well-formed `message` document;
/// 2. the input is a fragment lacking a single root: wrap it in a `chat`
///    container and take the first `message` child;
/// 3. the input is a truncated stream whose opening tag is complete but
///    whose closing tag has not arrived yet: append the missing
///    `</message>` before closing the container, then parse as in (2);
/// 4. placeholder.
pub fn parse(input: &str) -> Message {
    if let Some(message) = scan(input, true) {
        return message;
    }
    if let Some(message) = scan(&format!("<chat>{input}</chat>"), false) {
        return message;
    }
    if let Some(message) = scan(&format!("<chat>{input}</message></chat>"), false) {
        return message;
    }
    Message::placeholder()
}

/// Serialize a message as one `message` element.
///
/// Attributes are omitted when the corresponding participant is absent.
/// Every markup-significant character in attribute values and the text
/// body is escaped: the body is untrusted command output or generated
/// text and must never be able to break document structure.
pub fn serialize(message: &Message) -> String {
    let mut out = String::from("<message");
    if let Some(sender) = &message.sender {
        out.push_str(" from=\"");
        out.push_str(&escape(sender.as_str()));
        out.push('"');
    }
    if let Some(receiver) = &message.receiver {
        out.push_str(" to=\"");
        out.push_str(&escape(receiver.as_str()));
        out.push('"');
    }
    match &message.content {
        Some(content) => {
            out.push('>');
            out.push_str(&escape(content.as_str()));
            out.push_str("</message>");
        }
        None => out.push_str("/>"),
    }
    out
}

/// Scan a document for its first `message` element and extract the triple.
///
/// With `require_message_root` the document itself must be that element;
/// any leading content other than whitespace disqualifies it. Returns
/// `None` on any reader error, or when no complete `message` element is
/// found before end of input (an opened-but-unclosed element does not
/// count: the caller's later tiers handle truncation).
fn scan(doc: &str, require_message_root: bool) -> Option<Message> {
    let mut reader = Reader::from_str(doc);
    let mut sender: Option<String> = None;
    let mut receiver: Option<String> = None;
    let mut content: Option<String> = None;
    let mut inside = false;
    // Depth of nested elements below the message element itself.
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Err(_) => return None,
            Ok(Event::Eof) => return None,
            Ok(Event::Start(start)) => {
                if inside {
                    depth += 1;
                } else if start.local_name().as_ref() == b"message" {
                    let (from, to) = read_addressing(&start)?;
                    sender = from;
                    receiver = to;
                    inside = true;
                } else if require_message_root {
                    return None;
                }
            }
            Ok(Event::Empty(start)) => {
                if !inside && start.local_name().as_ref() == b"message" {
                    let (from, to) = read_addressing(&start)?;
                    return Some(Message::new(from, to, None));
                }
                if !inside && require_message_root {
                    return None;
                }
            }
            Ok(Event::End(_)) => {
                if inside {
                    if depth == 0 {
                        return Some(Message::new(sender, receiver, content));
                    }
                    depth -= 1;
                }
            }
            Ok(Event::Text(text)) => {
                if inside {
                    let chunk = text.unescape().ok()?;
                    content.get_or_insert_with(String::new).push_str(&chunk);
                } else if require_message_root
                    && !text.iter().all(|byte| byte.is_ascii_whitespace())
                {
                    return None;
                }
            }
            // Declarations, comments, processing instructions: skipped.
            Ok(_) => {}
        }
    }
}

/// Pull the `from`/`to` attributes off a message start tag.
pub(crate) fn read_addressing(start: &BytesStart<'_>) -> Option<(Option<String>, Option<String>)> {
    let mut from = None;
    let mut to = None;
    for attribute in start.attributes() {
        let attribute = attribute.ok()?;
        match attribute.key.as_ref() {
            b"from" => from = Some(attribute.unescape_value().ok()?.into_owned()),
            b"to" => to = Some(attribute.unescape_value().ok()?.into_owned()),
            _ => {}
        }
    }
    Some((from, to))
}
