//! Poll engine.
//!
//! Polls are owned by the room actor alongside the roster. Votes are kept as
//! a voter to option-index map; tallies are always derived from that map so
//! a re-vote can never double count.

use crate::errors::RcError;
use crate::roster::Roster;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Minimum number of options per poll.
pub const MIN_POLL_OPTIONS: usize = 2;

/// Maximum number of options per poll.
pub const MAX_POLL_OPTIONS: usize = 10;

/// Maximum question length in characters.
pub const MAX_QUESTION_CHARS: usize = 280;

/// Maximum option length in characters.
pub const MAX_OPTION_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct Poll {
    pub poll_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    votes: HashMap<String, usize>,
    seq: u64,
}

impl Poll {
    /// Count votes per option from the vote map.
    #[must_use]
    pub fn tally(&self) -> Tally {
        let mut counts = vec![0u32; self.options.len()];
        for index in self.votes.values() {
            if let Some(count) = counts.get_mut(*index) {
                *count += 1;
            }
        }

        Tally {
            poll_id: self.poll_id.clone(),
            counts: self
                .options
                .iter()
                .zip(counts)
                .map(|(option, votes)| OptionCount {
                    option: option.clone(),
                    votes,
                })
                .collect(),
            total_votes: self.votes.len(),
            active: self.active,
        }
    }

    /// Option index `voter` last chose, if any.
    #[must_use]
    pub fn vote_of(&self, voter: &str) -> Option<usize> {
        self.votes.get(voter).copied()
    }

    #[must_use]
    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            poll_id: self.poll_id.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
            active: self.active,
            created_at: self.created_at,
            created_by: self.created_by.clone(),
            tally: self.tally(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionCount {
    pub option: String,
    pub votes: u32,
}

/// Live counts for one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub poll_id: String,
    pub counts: Vec<OptionCount>,
    pub total_votes: usize,
    pub active: bool,
}

impl Tally {
    /// Votes recorded for the option at `index` (0 when out of range).
    #[must_use]
    pub fn count_for(&self, index: usize) -> u32 {
        self.counts.get(index).map_or(0, |c| c.votes)
    }
}

/// Wire form of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    pub poll_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub tally: Tally,
}

/// All polls of one room.
#[derive(Debug, Default)]
pub struct PollEngine {
    polls: HashMap<String, Poll>,
    next_seq: u64,
}

impl PollEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active poll. Question and options are trimmed first.
    ///
    /// # Errors
    ///
    /// `InvalidPoll` for an empty or overlong question, fewer than
    /// [`MIN_POLL_OPTIONS`] or more than [`MAX_POLL_OPTIONS`] options, or an
    /// empty or overlong option.
    pub fn create_poll(
        &mut self,
        creator: &str,
        question: &str,
        options: &[String],
    ) -> Result<&Poll, RcError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RcError::InvalidPoll("Question must not be empty".to_string()));
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(RcError::InvalidPoll(format!(
                "Question must be at most {MAX_QUESTION_CHARS} characters"
            )));
        }

        let options: Vec<String> = options.iter().map(|o| o.trim().to_string()).collect();
        if options.len() < MIN_POLL_OPTIONS {
            return Err(RcError::InvalidPoll(format!(
                "A poll needs at least {MIN_POLL_OPTIONS} options"
            )));
        }
        if options.len() > MAX_POLL_OPTIONS {
            return Err(RcError::InvalidPoll(format!(
                "A poll allows at most {MAX_POLL_OPTIONS} options"
            )));
        }
        if options.iter().any(String::is_empty) {
            return Err(RcError::InvalidPoll("Options must not be empty".to_string()));
        }
        if options
            .iter()
            .any(|o| o.chars().count() > MAX_OPTION_CHARS)
        {
            return Err(RcError::InvalidPoll(format!(
                "Options must be at most {MAX_OPTION_CHARS} characters"
            )));
        }

        let poll_id = Uuid::new_v4().to_string();
        let seq = self.next_seq;
        self.next_seq += 1;

        let poll = Poll {
            poll_id: poll_id.clone(),
            question: question.to_string(),
            options,
            active: true,
            created_at: Utc::now(),
            created_by: creator.to_string(),
            votes: HashMap::new(),
            seq,
        };

        tracing::debug!(
            target: "rc.polls",
            poll_id = %poll_id,
            options = poll.options.len(),
            "Poll created"
        );

        Ok(self.polls.entry(poll_id).or_insert(poll))
    }

    /// Record `voter`'s choice, replacing any earlier vote.
    ///
    /// # Errors
    ///
    /// `NotAParticipant` if the voter is not in `roster`, then
    /// `PollNotFound`, `PollInactive` or `InvalidOption` as applicable.
    pub fn cast_vote(
        &mut self,
        roster: &Roster,
        poll_id: &str,
        voter: &str,
        option_index: usize,
    ) -> Result<Tally, RcError> {
        if !roster.contains(voter) {
            return Err(RcError::NotAParticipant);
        }

        let poll = self.polls.get_mut(poll_id).ok_or(RcError::PollNotFound)?;
        if !poll.active {
            return Err(RcError::PollInactive);
        }
        if option_index >= poll.options.len() {
            return Err(RcError::InvalidOption {
                index: option_index,
                options: poll.options.len(),
            });
        }

        poll.votes.insert(voter.to_string(), option_index);
        Ok(poll.tally())
    }

    /// Current tally.
    ///
    /// # Errors
    ///
    /// `PollNotFound` if the id is unknown.
    pub fn tally(&self, poll_id: &str) -> Result<Tally, RcError> {
        self.polls
            .get(poll_id)
            .map(Poll::tally)
            .ok_or(RcError::PollNotFound)
    }

    /// Deactivate a poll. Returns `true` if it was active.
    ///
    /// # Errors
    ///
    /// `PollNotFound` if the id is unknown.
    pub fn close_poll(&mut self, poll_id: &str) -> Result<bool, RcError> {
        let poll = self.polls.get_mut(poll_id).ok_or(RcError::PollNotFound)?;
        let was_active = poll.active;
        poll.active = false;
        Ok(was_active)
    }

    #[must_use]
    pub fn get(&self, poll_id: &str) -> Option<&Poll> {
        self.polls.get(poll_id)
    }

    /// Polls in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<&Poll> {
        let mut polls: Vec<&Poll> = self.polls.values().collect();
        polls.sort_by_key(|p| p.seq);
        polls
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.polls.values().filter(|p| p.active).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.polls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }
}
