//! Reply helpers: subject prefixing and body quoting

use regex::Regex;
use std::sync::LazyLock;

use crate::message::User;

/// Prefix added to reply subjects
pub const REPLY_PREFIX: &str = "Re: ";

static REPLY_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?i:re)\s*:").expect("valid reply prefix pattern"));

/// Subject for a reply to `subject`.
///
/// Subjects that already carry a reply prefix are returned unchanged, so long
/// reply chains stay at a single "Re: ".
pub fn quote_subject(subject: &str) -> String {
    if REPLY_PREFIX_RE.is_match(subject) {
        subject.to_string()
    } else {
        format!("{}{}", REPLY_PREFIX, subject)
    }
}

/// Quoted rendering of `body` for a reply, attributed to `sender`
pub fn format_quote(sender: &User, body: &str) -> String {
    let mut quoted = format!("\n\n{} wrote:\n", sender.username);
    for line in body.lines() {
        if line.is_empty() {
            quoted.push_str(">\n");
        } else {
            quoted.push_str("> ");
            quoted.push_str(line);
            quoted.push('\n');
        }
    }
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_subject_is_idempotent() {
        let once = quote_subject("Lunch?");
        assert_eq!(once, "Re: Lunch?");
        assert_eq!(quote_subject(&once), "Re: Lunch?");
        assert_eq!(quote_subject("RE: Lunch?"), "RE: Lunch?");
        assert_eq!(quote_subject("Remember me"), "Re: Remember me");
    }

    #[test]
    fn test_format_quote() {
        let alice = User::new("alice");
        let quoted = format_quote(&alice, "Are you coming?\n\nBring snacks.");
        assert_eq!(
            quoted,
            "\n\nalice wrote:\n> Are you coming?\n>\n> Bring snacks.\n"
        );
    }
}
