use std::path::Path;

use tokio::fs;

use crate::core::moderation::{ModerationError, SpamModel, WordFilter};

/// Load the banned word list. A missing file yields an empty filter.
pub async fn load_word_filter(path: impl AsRef<Path>) -> Result<WordFilter, ModerationError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Banned word list not found, word filter is empty");
        return Ok(WordFilter::new(Vec::<String>::new()));
    }

    let text = fs::read_to_string(path)
        .await
        .map_err(|e| ModerationError::LoadError {
            what: path.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok(WordFilter::from_lines(&text))
}

/// Load the pre-trained spam model. A missing file yields `None`.
pub async fn load_spam_model(path: impl AsRef<Path>) -> Result<Option<SpamModel>, ModerationError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Spam model not found, spam filter is disabled");
        return Ok(None);
    }

    let text = fs::read_to_string(path)
        .await
        .map_err(|e| ModerationError::LoadError {
            what: path.display().to_string(),
            reason: e.to_string(),
        })?;

    SpamModel::from_json(&text).map(Some)
}
