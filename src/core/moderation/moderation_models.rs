// Moderation domain models.
//
// These are pure domain types with no Discord dependencies.
// The plugin layer turns a verdict into delete/log actions.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Invalid spam model: {0}")]
    InvalidModel(String),

    #[error("Failed to load {what}: {reason}")]
    LoadError { what: String, reason: String },
}

/// Why a message was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    Spam,
    Swearing,
    Invite,
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterReason::Spam => write!(f, "spam"),
            FilterReason::Swearing => write!(f, "swearing"),
            FilterReason::Invite => write!(f, "invite link"),
        }
    }
}

/// Which filters a guild has switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterToggles {
    pub spam: bool,
    pub words: bool,
    pub invites: bool,
}

impl FilterToggles {
    pub fn any(&self) -> bool {
        self.spam || self.words || self.invites
    }
}

/// On-disk layout of the pre-trained bigram model.
#[derive(Debug, Deserialize)]
struct RawSpamModel {
    data: Vec<Vec<f64>>,
    threshold: Vec<f64>,
    positions: HashMap<String, usize>,
}

/// Pre-trained bigram matrix used by the gibberish detector.
///
/// `data[i][j]` is the score of the pair (char i, char j), and a pair counts
/// as unusual when its score is below `threshold[i]`.
#[derive(Debug, Clone)]
pub struct SpamModel {
    pub data: Vec<Vec<f64>>,
    pub threshold: Vec<f64>,
    pub positions: HashMap<char, usize>,
}

impl SpamModel {
    /// Build a model, checking that the matrix, thresholds and positions agree.
    pub fn new(
        data: Vec<Vec<f64>>,
        threshold: Vec<f64>,
        positions: HashMap<char, usize>,
    ) -> Result<Self, ModerationError> {
        let size = data.len();

        if size == 0 {
            return Err(ModerationError::InvalidModel("empty matrix".to_string()));
        }
        if let Some(row) = data.iter().position(|row| row.len() != size) {
            return Err(ModerationError::InvalidModel(format!(
                "row {} does not have {} columns",
                row, size
            )));
        }
        if threshold.len() != size {
            return Err(ModerationError::InvalidModel(format!(
                "expected {} thresholds, got {}",
                size,
                threshold.len()
            )));
        }
        if let Some((c, pos)) = positions.iter().find(|(_, pos)| **pos >= size) {
            return Err(ModerationError::InvalidModel(format!(
                "position {} of {:?} is out of range",
                pos, c
            )));
        }

        Ok(Self {
            data,
            threshold,
            positions,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ModerationError> {
        let raw: RawSpamModel = serde_json::from_str(json)
            .map_err(|e| ModerationError::InvalidModel(e.to_string()))?;

        let mut positions = HashMap::with_capacity(raw.positions.len());
        for (key, pos) in raw.positions {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    positions.insert(c, pos);
                }
                _ => {
                    return Err(ModerationError::InvalidModel(format!(
                        "position key {:?} is not a single character",
                        key
                    )))
                }
            }
        }

        Self::new(raw.data, raw.threshold, positions)
    }
}
