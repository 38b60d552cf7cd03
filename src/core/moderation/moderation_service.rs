// Content filters - core business logic for message moderation.
//
// This service handles:
// - Banned words (substring scan with leetspeak permutations)
// - Gibberish detection (bigram scores against a pre-trained matrix)
// - Discord invite links
//
// NO Discord dependencies here - just pure domain logic.

use super::moderation_models::{FilterReason, FilterToggles, SpamModel};
use regex::Regex;

/// Characters the gibberish detector looks at. Everything else is dropped.
const ACCEPTED_CHARS: &str = "abcdefghijklmnopqrstuvwxyz ";

/// Messages shorter than this (after removing links) are never spam.
const MIN_SPAM_LENGTH: usize = 10;

/// Character substitutions added to the banned word list, also combined.
const PERMUTATIONS: [(char, char); 4] = [('a', '4'), ('s', '$'), ('o', '0'), ('a', '@')];

const INVITE_PATTERN: &str = r"(http(s)?://)?discord.gg/\w+";

// ============================================================================
// WORD FILTER
// ============================================================================

pub struct WordFilter {
    words: Vec<String>,
}

impl WordFilter {
    /// Build the filter from the raw list, adding the substitution variants.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() && !list.contains(&word) {
                list.push(word);
            }
        }

        // Variants are permuted again, so "boss" also yields "b0$$".
        let before = list.len();
        let mut index = 0;
        while index < list.len() {
            for (from, to) in PERMUTATIONS {
                let changed = list[index].replace(from, &to.to_string());
                if changed != list[index] && !list.contains(&changed) {
                    list.push(changed);
                }
            }
            index += 1;
        }

        tracing::info!(
            "Processed word list: added {} entries ({} total)",
            list.len() - before,
            list.len()
        );

        Self { words: list }
    }

    /// Parse a newline-separated word list.
    pub fn from_lines(text: &str) -> Self {
        Self::new(text.lines())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns true if the text contains a banned word.
    pub fn check_swearing(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.words.iter().any(|word| text.contains(word.as_str()))
    }
}

// ============================================================================
// GIBBERISH DETECTOR
// ============================================================================

pub struct GibberishDetector {
    model: SpamModel,
}

impl GibberishDetector {
    pub fn new(model: SpamModel) -> Self {
        Self { model }
    }

    /// Keep only the characters the model was trained on.
    pub fn normalize(line: &str) -> String {
        line.chars().filter(|c| ACCEPTED_CHARS.contains(*c)).collect()
    }

    fn bigrams(line: &str) -> Vec<(char, char)> {
        let normalized: Vec<char> = Self::normalize(line).chars().collect();
        normalized.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }

    /// Returns true when enough character pairs score below their threshold.
    pub fn detect_gib(&self, message: &str) -> bool {
        if message.is_empty() {
            return false;
        }

        let th = message.chars().count() as f64 / 2.4;
        let positions = &self.model.positions;

        let unusual = Self::bigrams(message)
            .into_iter()
            .filter_map(|(a, b)| Some((*positions.get(&a)?, *positions.get(&b)?)))
            .filter(|(a, b)| self.model.data[*a][*b] < self.model.threshold[*a])
            .count();

        unusual as f64 >= th
    }

    /// Full spam check: links are ignored and short messages always pass.
    pub fn check_spam(&self, message: &str) -> bool {
        let without_links = message
            .split(' ')
            .filter(|word| !word.starts_with("https://") && !word.starts_with("http://"))
            .collect::<Vec<_>>()
            .join(" ");

        if without_links.chars().count() < MIN_SPAM_LENGTH {
            return false;
        }

        self.detect_gib(&without_links)
    }
}

// ============================================================================
// INVITE FILTER
// ============================================================================

pub struct InviteFilter {
    regex: Regex,
}

impl InviteFilter {
    pub fn new() -> Self {
        Self {
            // The pattern is a constant, so this can only fail on a typo above
            regex: Regex::new(INVITE_PATTERN).expect("invite pattern must compile"),
        }
    }

    /// First invite link in the text, if any.
    pub fn check_invite<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

impl Default for InviteFilter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// All message filters behind one call.
pub struct ModerationService {
    words: WordFilter,
    /// `None` when no model could be loaded; spam checks then always pass
    gibberish: Option<GibberishDetector>,
    invites: InviteFilter,
}

impl ModerationService {
    pub fn new(words: WordFilter, model: Option<SpamModel>) -> Self {
        if model.is_none() {
            tracing::warn!("No spam model loaded, the spam filter is disabled");
        }

        Self {
            words,
            gibberish: model.map(GibberishDetector::new),
            invites: InviteFilter::new(),
        }
    }

    pub fn check_swearing(&self, text: &str) -> bool {
        self.words.check_swearing(text)
    }

    pub fn check_spam(&self, text: &str) -> bool {
        self.gibberish
            .as_ref()
            .map(|detector| detector.check_spam(text))
            .unwrap_or(false)
    }

    pub fn check_invite<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.invites.check_invite(text)
    }

    /// Run the enabled filters in order (spam, swearing, invite). First hit wins.
    ///
    /// Invite links posted by people with admin rights are allowed.
    pub fn check_message(
        &self,
        content: &str,
        toggles: FilterToggles,
        author_is_admin: bool,
    ) -> Option<FilterReason> {
        if toggles.spam && self.check_spam(content) {
            return Some(FilterReason::Spam);
        }
        if toggles.words && self.check_swearing(content) {
            return Some(FilterReason::Swearing);
        }
        if toggles.invites && !author_is_admin && self.check_invite(content).is_some() {
            return Some(FilterReason::Invite);
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// A small model where any pair made only of q, x and z is unusual.
    pub(crate) fn test_model() -> SpamModel {
        let chars: Vec<char> = ACCEPTED_CHARS.chars().collect();
        let positions: HashMap<char, usize> =
            chars.iter().enumerate().map(|(i, c)| (*c, i)).collect();

        let odd = |c: char| "qxz".contains(c);
        let data = chars
            .iter()
            .map(|a| {
                chars
                    .iter()
                    .map(|b| if odd(*a) && odd(*b) { 0.0 } else { 1.0 })
                    .collect()
            })
            .collect();

        SpamModel::new(data, vec![0.5; chars.len()], positions).unwrap()
    }

    #[test]
    fn test_word_filter_permutations() {
        let filter = WordFilter::from_lines("bad\n\n  Boss \nbad\n");

        // bad, boss + b4d, b@d, bo$$, b0ss, b0$$
        assert_eq!(filter.len(), 7);
        assert!(filter.check_swearing("this is BAD"));
        assert!(filter.check_swearing("so b4d"));
        assert!(filter.check_swearing("the b0ss"));
        assert!(filter.check_swearing("like a b0$$"));
        assert!(!filter.check_swearing("all good here"));
    }

    #[test]
    fn test_empty_word_filter() {
        let filter = WordFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(!filter.check_swearing("anything"));
    }

    #[test]
    fn test_normalize_keeps_lowercase_and_spaces() {
        assert_eq!(GibberishDetector::normalize("Hi there, 42!"), "i there ");
    }

    #[test]
    fn test_detect_gib() {
        let detector = GibberishDetector::new(test_model());

        assert!(!detector.detect_gib(""));
        assert!(detector.detect_gib("qxzqxzqxzqxz"));
        assert!(!detector.detect_gib("hello there my friend"));
        // Uppercase is dropped by normalize, so nothing is scored
        assert!(!detector.detect_gib("QXZQXZQXZQXZ"));
    }

    #[test]
    fn test_check_spam_ignores_links_and_short_text() {
        let detector = GibberishDetector::new(test_model());

        assert!(!detector.check_spam("qxzqxz"));
        assert!(!detector.check_spam("https://qxzqxzqxzqxzqxz ok"));
        assert!(detector.check_spam("look qxzqxzqxzqxzqxzqxz"));
    }

    #[test]
    fn test_invite_filter() {
        let filter = InviteFilter::new();

        assert_eq!(
            filter.check_invite("join https://discord.gg/abc123 now"),
            Some("https://discord.gg/abc123")
        );
        assert_eq!(filter.check_invite("discord.gg/xyz"), Some("discord.gg/xyz"));
        assert_eq!(filter.check_invite("discord.com is a website"), None);
    }

    #[test]
    fn test_check_message_order_and_toggles() {
        let service =
            ModerationService::new(WordFilter::from_lines("bad"), Some(test_model()));
        let all = FilterToggles {
            spam: true,
            words: true,
            invites: true,
        };

        assert_eq!(
            service.check_message("bad qxzqxzqxzqxzqxz", all, false),
            Some(FilterReason::Spam)
        );
        assert_eq!(
            service.check_message("that was bad", all, false),
            Some(FilterReason::Swearing)
        );
        assert_eq!(
            service.check_message("discord.gg/abc", all, false),
            Some(FilterReason::Invite)
        );
        assert_eq!(service.check_message("discord.gg/abc", all, true), None);
        assert_eq!(
            service.check_message("that was bad", FilterToggles::default(), false),
            None
        );
    }

    #[test]
    fn test_spam_check_without_model() {
        let service = ModerationService::new(WordFilter::from_lines(""), None);
        assert!(!service.check_spam("qxzqxzqxzqxzqxzqxz"));
    }
}
