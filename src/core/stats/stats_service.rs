// Process-wide usage counters shown by the stats command.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    /// Messages that triggered a command
    Message,
    /// Commands used with bad arguments
    WrongArg,
    /// Messages deleted by mutes
    Suppressed,
    Ping,
    Help,
    Vote,
    /// Prayers said with `_rip`
    Prayer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages: u64,
    pub wrong_args: u64,
    pub suppressed: u64,
    pub pings: u64,
    pub helps: u64,
    pub votes: u64,
    pub prayers: u64,
}

#[derive(Default)]
pub struct BotStats {
    messages: AtomicU64,
    wrong_args: AtomicU64,
    suppressed: AtomicU64,
    pings: AtomicU64,
    helps: AtomicU64,
    votes: AtomicU64,
    prayers: AtomicU64,
}

impl BotStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, stat: Stat) -> &AtomicU64 {
        match stat {
            Stat::Message => &self.messages,
            Stat::WrongArg => &self.wrong_args,
            Stat::Suppressed => &self.suppressed,
            Stat::Ping => &self.pings,
            Stat::Help => &self.helps,
            Stat::Vote => &self.votes,
            Stat::Prayer => &self.prayers,
        }
    }

    pub fn add(&self, stat: Stat) {
        self.counter(stat).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, stat: Stat) -> u64 {
        self.counter(stat).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages: self.get(Stat::Message),
            wrong_args: self.get(Stat::WrongArg),
            suppressed: self.get(Stat::Suppressed),
            pings: self.get(Stat::Ping),
            helps: self.get(Stat::Help),
            votes: self.get(Stat::Vote),
            prayers: self.get(Stat::Prayer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = BotStats::new();
        stats.add(Stat::Message);
        stats.add(Stat::Message);
        stats.add(Stat::Ping);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.pings, 1);
        assert_eq!(snapshot.helps, 0);
    }
}
