// Vote service - simple per-guild polls.
//
// Started with `vote start "Title" one|two|three`, people vote with the
// 1-based option number, and ending a vote returns the tallies.

use dashmap::DashMap;
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum VoteError {
    #[error("A vote is already in progress.")]
    AlreadyInProgress,

    #[error("There is no vote in progress.")]
    NotInProgress,

    #[error("Invalid vote format, use \"Title\" option1|option2|...")]
    InvalidFormat,

    #[error("That option does not exist.")]
    InvalidOption,

    #[error("You have already voted.")]
    AlreadyVoted,
}

#[derive(Debug, Clone)]
pub struct Vote {
    pub title: String,
    pub author: String,
    pub options: Vec<String>,
    pub counts: Vec<u32>,
    voters: HashSet<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteResults {
    pub title: String,
    /// (option, votes) in the original option order
    pub results: Vec<(String, u32)>,
}

impl VoteResults {
    pub fn render(&self) -> String {
        let lines: Vec<String> = self
            .results
            .iter()
            .map(|(option, count)| format!("{} - `{} votes`", option, count))
            .collect();
        format!("Vote ended:\n__{}__\n\n{}", self.title, lines.join("\n"))
    }
}

/// Parse `"Title" one|two|three`.
pub fn parse_vote(raw: &str) -> Result<(String, Vec<String>), VoteError> {
    let mut parts = raw.splitn(3, '"');
    let _before = parts.next();
    let title = parts.next().ok_or(VoteError::InvalidFormat)?.trim();
    let rest = parts.next().ok_or(VoteError::InvalidFormat)?;

    let options: Vec<String> = rest
        .split('|')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if title.is_empty() || options.is_empty() {
        return Err(VoteError::InvalidFormat);
    }
    Ok((title.to_string(), options))
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct VoteService {
    votes: DashMap<u64, Vote>,
}

impl VoteService {
    pub fn new() -> Self {
        Self {
            votes: DashMap::new(),
        }
    }

    pub fn start_vote(&self, guild_id: u64, author: &str, raw: &str) -> Result<Vote, VoteError> {
        let (title, options) = parse_vote(raw)?;

        match self.votes.entry(guild_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(VoteError::AlreadyInProgress),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let vote = Vote {
                    title,
                    author: author.to_string(),
                    counts: vec![0; options.len()],
                    options,
                    voters: HashSet::new(),
                };
                entry.insert(vote.clone());
                Ok(vote)
            }
        }
    }

    pub fn in_progress(&self, guild_id: u64) -> bool {
        self.votes.contains_key(&guild_id)
    }

    /// Record a vote for the 1-based option. The option is checked before the voter is recorded.
    pub fn plus_one(&self, guild_id: u64, option: &str, voter: u64) -> Result<(), VoteError> {
        let mut vote = self.votes.get_mut(&guild_id).ok_or(VoteError::NotInProgress)?;

        let index = option
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=vote.options.len()).contains(n))
            .ok_or(VoteError::InvalidOption)?
            - 1;

        if !vote.voters.insert(voter) {
            return Err(VoteError::AlreadyVoted);
        }
        vote.counts[index] += 1;
        Ok(())
    }

    pub fn end_vote(&self, guild_id: u64) -> Result<VoteResults, VoteError> {
        let (_, vote) = self
            .votes
            .remove(&guild_id)
            .ok_or(VoteError::NotInProgress)?;

        Ok(VoteResults {
            title: vote.title,
            results: vote.options.into_iter().zip(vote.counts).collect(),
        })
    }

    pub fn get_vote_amount(&self) -> usize {
        self.votes.len()
    }
}

impl Default for VoteService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vote() {
        let (title, options) = parse_vote("\"Best language\" rust | go|  zig ").unwrap();
        assert_eq!(title, "Best language");
        assert_eq!(options, vec!["rust", "go", "zig"]);

        assert_eq!(parse_vote("no quotes a|b"), Err(VoteError::InvalidFormat));
        assert_eq!(parse_vote("\"Title\""), Err(VoteError::InvalidFormat));
        assert_eq!(parse_vote("\"\" a|b"), Err(VoteError::InvalidFormat));
    }

    #[test]
    fn test_full_vote() {
        let service = VoteService::new();
        service.start_vote(1, "mod", "\"Lunch\" pizza|sushi").unwrap();

        assert_eq!(
            service.start_vote(1, "mod", "\"Again\" a|b").unwrap_err(),
            VoteError::AlreadyInProgress
        );

        service.plus_one(1, "2", 100).unwrap();
        service.plus_one(1, "2", 101).unwrap();
        service.plus_one(1, "1", 102).unwrap();
        assert_eq!(service.plus_one(1, "1", 100), Err(VoteError::AlreadyVoted));
        assert_eq!(service.get_vote_amount(), 1);

        let results = service.end_vote(1).unwrap();
        assert_eq!(
            results.results,
            vec![("pizza".to_string(), 1), ("sushi".to_string(), 2)]
        );
        assert!(results.render().contains("sushi - `2 votes`"));
        assert!(!service.in_progress(1));
    }

    #[test]
    fn test_invalid_option_does_not_use_up_vote() {
        let service = VoteService::new();
        service.start_vote(1, "mod", "\"Q\" yes|no").unwrap();

        assert_eq!(service.plus_one(1, "3", 7), Err(VoteError::InvalidOption));
        assert_eq!(service.plus_one(1, "0", 7), Err(VoteError::InvalidOption));
        assert_eq!(service.plus_one(1, "abc", 7), Err(VoteError::InvalidOption));
        assert!(service.plus_one(1, "1", 7).is_ok());
    }

    #[test]
    fn test_no_vote_running() {
        let service = VoteService::new();
        assert_eq!(service.plus_one(5, "1", 1), Err(VoteError::NotInProgress));
        assert_eq!(service.end_vote(5).unwrap_err(), VoteError::NotInProgress);
    }
}
