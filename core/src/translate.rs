//! Machine translation of message bodies

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{PostboxError, PostboxResult};
use crate::message::Message;
use crate::profile::UserProfile;

/// A translation provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> PostboxResult<String>;
}

/// Outcome of a translation fill attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// The body was translated and stored
    Translated,
    /// Preconditions were not met, nothing was attempted
    Skipped,
    /// The provider failed or timed out; fields left unset
    Failed,
}

/// Fill `body_translated` for the reader described by `profile`.
///
/// Only runs when the message states a source language, has no translation
/// yet, and the reader prefers a different language. Provider errors never
/// propagate: the message is simply left untranslated.
pub async fn fill_translation(
    message: &mut Message,
    profile: Option<&UserProfile>,
    translator: &dyn Translator,
    timeout: Duration,
) -> TranslationOutcome {
    let Some(source) = message.language.as_deref() else {
        return TranslationOutcome::Skipped;
    };
    if message.has_translation() {
        return TranslationOutcome::Skipped;
    }
    let Some(target) = profile.and_then(|p| p.preferred_language.as_deref()) else {
        tracing::debug!("Recipient {} has no preferred language", message.recipient);
        return TranslationOutcome::Skipped;
    };
    if target.eq_ignore_ascii_case(source) {
        return TranslationOutcome::Skipped;
    }

    let target = target.to_string();
    let result = tokio::time::timeout(timeout, translator.translate(&message.body, &target))
        .await
        .unwrap_or_else(|_| {
            Err(PostboxError::timeout(format!(
                "translation to {} after {:?}",
                target, timeout
            )))
        });

    match result {
        Ok(translated) => {
            message.body_translated = Some(translated);
            message.language_translated = Some(target);
            TranslationOutcome::Translated
        }
        Err(e) => {
            tracing::warn!("Failed to translate message {}: {}", message.id, e);
            TranslationOutcome::Failed
        }
    }
}
