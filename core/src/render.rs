//! Display rules for message bodies
//!
//! Free members see a truncated body. Truncation counts words outside of
//! markup and closes any tag left open at the cut, so the output stays
//! balanced. Line breaks are turned into `<br />` after truncation.

use regex::Regex;
use std::sync::LazyLock;

use crate::message::Message;
use crate::profile::UserProfile;

/// Appended to truncated text
pub const TRUNCATION_MARKER: &str = " ...";

/// Elements that never have a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "br", "col", "link", "base", "img", "param", "area", "hr", "input",
];

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<.*?>|((?:\w[-\w]*|&.*?;)+)").expect("valid word pattern")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^<(/)?(\S+?)(?:(\s*/)|\s.*?)?>$").expect("valid tag pattern")
});

/// Renders message bodies according to the viewer's membership
#[derive(Debug, Clone, Copy)]
pub struct MessageRenderer {
    word_limit: usize,
}

impl MessageRenderer {
    pub fn new(word_limit: usize) -> Self {
        Self { word_limit }
    }

    pub fn word_limit(&self) -> usize {
        self.word_limit
    }

    /// Render `message` for a viewer.
    ///
    /// A missing profile or subscription counts as the free tier.
    pub fn render(
        &self,
        message: &Message,
        prefer_translated: bool,
        viewer: Option<&UserProfile>,
    ) -> String {
        let text = match message.body_translated.as_deref() {
            Some(translated) if prefer_translated && !translated.is_empty() => translated,
            _ => message.body.as_str(),
        };

        let paying = viewer.map(UserProfile::is_paying).unwrap_or(false);
        if paying {
            linebreaks_br(text)
        } else {
            linebreaks_br(&truncate_html_words(text, self.word_limit))
        }
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TRUNCATE_WORDS)
    }
}

/// Truncate `text` after `limit` words, keeping markup balanced.
///
/// Text with `limit` words or fewer is returned unchanged.
pub fn truncate_html_words(text: &str, limit: usize) -> String {
    if limit == 0 {
        return String::new();
    }

    let mut words = 0;
    let mut cut_at = None;
    // Innermost open element first
    let mut open_tags: Vec<String> = Vec::new();

    for token in TOKEN_RE.captures_iter(text) {
        let Some(whole) = token.get(0) else { continue };

        if token.get(1).is_some() {
            words += 1;
            if words == limit {
                cut_at = Some(whole.end());
            } else if words > limit {
                break;
            }
            continue;
        }

        if cut_at.is_some() {
            continue;
        }

        let Some(tag) = TAG_RE.captures(whole.as_str()) else { continue };
        let name = tag.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let closing = tag.get(1).is_some();
        let self_closing = tag.get(3).is_some();

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            continue;
        }
        if closing {
            if let Some(pos) = open_tags.iter().position(|open| *open == name) {
                open_tags.drain(..=pos);
            }
        } else {
            open_tags.insert(0, name);
        }
    }

    let cut_at = match cut_at {
        Some(pos) if words > limit => pos,
        _ => return text.to_string(),
    };

    let mut out = String::with_capacity(cut_at + TRUNCATION_MARKER.len());
    out.push_str(&text[..cut_at]);
    out.push_str(TRUNCATION_MARKER);
    for tag in &open_tags {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
    out
}

/// Convert line breaks into `<br />`
pub fn linebreaks_br(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "<br />")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ThreadId, User};
    use crate::profile::SubscriptionTier;

    fn words(n: usize) -> String {
        (1..=n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn message_with(body: &str) -> Message {
        let alice = User::new("alice");
        let bob = User::new("bob");
        Message::new(bob.clone(), alice, bob, "Hello", body, ThreadId::new())
    }

    fn viewer(tier: Option<SubscriptionTier>) -> UserProfile {
        UserProfile {
            preferred_language: None,
            subscription: tier,
        }
    }

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate_html_words("one two three", 3), "one two three");
        assert_eq!(truncate_html_words("<p>one two</p>", 5), "<p>one two</p>");
    }

    #[test]
    fn test_truncate_plain_words() {
        assert_eq!(truncate_html_words("one two three four", 2), "one two ...");
    }

    #[test]
    fn test_truncate_closes_open_tags() {
        let html = "<p>one <b>two three</b> four</p>";
        assert_eq!(truncate_html_words(html, 2), "<p>one <b>two ...</b></p>");
    }

    #[test]
    fn test_truncate_ignores_void_and_closed_tags() {
        let html = "<p>one<br>two</p><i>three</i> <img src=\"x.png\"/> four five";
        assert_eq!(
            truncate_html_words(html, 4),
            "<p>one<br>two</p><i>three</i> <img src=\"x.png\"/> four ..."
        );
    }

    #[test]
    fn test_entities_count_as_words() {
        assert_eq!(truncate_html_words("fish &amp; chips today", 2), "fish &amp; ...");
    }

    #[test]
    fn test_linebreaks() {
        assert_eq!(linebreaks_br("a\r\nb\rc\nd"), "a<br />b<br />c<br />d");
    }

    #[test]
    fn test_free_viewer_gets_truncated_body() {
        let renderer = MessageRenderer::new(100);
        let message = message_with(&words(500));

        let rendered = renderer.render(&message, false, Some(&viewer(Some(SubscriptionTier::Free))));
        assert_eq!(rendered, format!("{}{}", words(100), TRUNCATION_MARKER));

        // No subscription or no profile at all is the free tier too
        assert_eq!(renderer.render(&message, false, Some(&viewer(None))), rendered);
        assert_eq!(renderer.render(&message, false, None), rendered);
    }

    #[test]
    fn test_paid_viewer_gets_full_body() {
        let renderer = MessageRenderer::new(100);
        let body = words(500);
        let message = message_with(&body);

        let rendered = renderer.render(&message, false, Some(&viewer(Some(SubscriptionTier::Paid))));
        assert_eq!(rendered, body);
    }

    #[test]
    fn test_translated_body_preference() {
        let renderer = MessageRenderer::default();
        let mut message = message_with("Good morning\nfriend");
        let paid = viewer(Some(SubscriptionTier::Paid));

        // Nothing translated yet: falls back to the original
        assert_eq!(renderer.render(&message, true, Some(&paid)), "Good morning<br />friend");

        message.body_translated = Some("Guten Morgen\nFreund".to_string());
        assert_eq!(renderer.render(&message, true, Some(&paid)), "Guten Morgen<br />Freund");
        assert_eq!(renderer.render(&message, false, Some(&paid)), "Good morning<br />friend");
    }
}
