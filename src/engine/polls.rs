// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::shared::ApartmentKeyed;
use crate::error::{EngineError, EngineResult};
use crate::models::{Apartment, ApartmentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub label: String,
}

/// One-vote-per-apartment poll. `votes` holds an entry for every eligible
/// apartment, `None` until it votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub options: Vec<PollOption>,
    pub votes: ApartmentKeyed<Option<String>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyLine {
    pub option: PollOption,
    pub votes: usize,
}

impl Poll {
    pub fn new(
        id: i64,
        question: &str,
        labels: &[String],
        electorate: &[Apartment],
    ) -> EngineResult<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::invalid("poll question must not be empty"));
        }
        let labels: Vec<&str> = labels
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.len() < 2 {
            return Err(EngineError::invalid("a poll needs at least two options"));
        }
        for (i, l) in labels.iter().enumerate() {
            if labels[..i].iter().any(|p| p.eq_ignore_ascii_case(l)) {
                return Err(EngineError::invalid(format!("duplicate poll option '{}'", l)));
            }
        }
        let options = labels
            .iter()
            .enumerate()
            .map(|(i, l)| PollOption {
                id: (i + 1).to_string(),
                label: l.to_string(),
            })
            .collect();
        let votes = ApartmentKeyed::new(electorate.iter().map(|a| a.id.clone()), None)?;
        Ok(Self {
            id,
            question: question.to_string(),
            options,
            votes,
            is_active: true,
        })
    }

    /// Finds an option by id or, failing that, by case-insensitive label.
    pub fn option(&self, key: &str) -> Option<&PollOption> {
        let key = key.trim();
        self.options
            .iter()
            .find(|o| o.id == key)
            .or_else(|| self.options.iter().find(|o| o.label.eq_ignore_ascii_case(key)))
    }

    /// Records or replaces the apartment's vote. Returns its previous choice.
    pub fn vote(&mut self, apartment: &ApartmentId, choice: &str) -> EngineResult<Option<String>> {
        if !self.is_active {
            return Err(EngineError::invalid(format!("poll {} is closed", self.id)));
        }
        let option_id = self
            .option(choice)
            .map(|o| o.id.clone())
            .ok_or_else(|| EngineError::invalid(format!("poll {} has no option '{}'", self.id, choice)))?;
        let previous = self.votes.set(apartment, Some(option_id))?;
        if previous.is_some() {
            debug!(poll = self.id, %apartment, "vote replaced");
        }
        Ok(previous)
    }

    pub fn vote_of(&self, apartment: &ApartmentId) -> Option<&str> {
        self.votes.get(apartment).and_then(|v| v.as_deref())
    }

    pub fn voter_count(&self) -> usize {
        self.votes.count_where(Option::is_some)
    }

    pub fn tally(&self) -> Vec<TallyLine> {
        self.options
            .iter()
            .map(|o| TallyLine {
                option: o.clone(),
                votes: self
                    .votes
                    .count_where(|v| v.as_deref() == Some(o.id.as_str())),
            })
            .collect()
    }

    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.is_active, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn electorate() -> Vec<Apartment> {
        ["G1", "F1", "F2", "S1", "S2", "T1", "T2"]
            .iter()
            .map(|c| Apartment::new(c, format!("Apartment {}", c)))
            .collect()
    }

    fn poll() -> Poll {
        Poll::new(
            1,
            "Repaint the stairwell?",
            &["Yes".to_string(), "No".to_string()],
            &electorate(),
        )
        .unwrap()
    }

    #[test]
    fn revote_overwrites() {
        let mut p = poll();
        let f1 = ApartmentId::new("F1");
        assert_eq!(p.vote(&f1, "Yes").unwrap(), None);
        assert_eq!(p.vote(&f1, "2").unwrap(), Some("1".to_string()));
        assert_eq!(p.vote_of(&f1), Some("2"));
        assert_eq!(p.voter_count(), 1);
        assert_eq!(p.votes.len(), 7);
        let tally = p.tally();
        assert_eq!(tally[0].votes, 0);
        assert_eq!(tally[1].votes, 1);
    }

    #[test]
    fn unknown_option_and_outsider_rejected() {
        let mut p = poll();
        assert!(matches!(
            p.vote(&"F1".into(), "Maybe"),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            p.vote(&"Z9".into(), "Yes"),
            Err(EngineError::NotAddressed(_))
        ));
        assert_eq!(p.voter_count(), 0);
    }

    #[test]
    fn closed_poll_rejects_votes() {
        let mut p = poll();
        assert!(p.close());
        assert!(!p.close());
        assert!(p.vote(&"G1".into(), "Yes").is_err());
    }

    #[test]
    fn needs_two_distinct_options() {
        let e = electorate();
        assert!(Poll::new(1, "Q", &["Only".to_string()], &e).is_err());
        assert!(Poll::new(1, "Q", &["A".to_string(), "a".to_string()], &e).is_err());
        assert!(Poll::new(1, "  ", &["A".to_string(), "B".to_string()], &e).is_err());
    }
}
