use std::fmt;

use serde::{Deserialize, Serialize};

/// Screening mode. Single admits one resume, Bulk an ordered set of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Single,
    Bulk,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Single => f.write_str("single"),
            Mode::Bulk => f.write_str("bulk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Suitable,
    NotSuitable,
}

impl Verdict {
    /// Scores at or above the threshold are suitable.
    pub fn from_score(score: u8, threshold: u8) -> Self {
        if score >= threshold {
            Verdict::Suitable
        } else {
            Verdict::NotSuitable
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Suitable => f.write_str("Suitable"),
            Verdict::NotSuitable => f.write_str("Not Suitable"),
        }
    }
}

/// Single-mode result for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleScore {
    pub candidate_label: String,
    pub score: u8, // 0..=100
    pub verdict: Verdict,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub candidate_label: String,
    pub score: u8,
}

/// Bulk-mode result. `entries` is always sorted descending by score with
/// ties kept in submission order; `shortlisted` and `rejected` split it at
/// `threshold` without reordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRanking {
    pub entries: Vec<RankedEntry>,
    pub shortlisted: Vec<RankedEntry>, // score >= threshold
    pub rejected: Vec<RankedEntry>,    // score < threshold
    pub threshold: u8,
}

impl BulkRanking {
    pub fn top(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoreResult {
    Single(SingleScore),
    Bulk(BulkRanking),
}

impl ScoreResult {
    pub fn mode(&self) -> Mode {
        match self {
            ScoreResult::Single(_) => Mode::Single,
            ScoreResult::Bulk(_) => Mode::Bulk,
        }
    }

    /// One-line summary posted to the active conversation when a result lands.
    pub fn summary(&self) -> String {
        match self {
            ScoreResult::Single(s) => format!(
                "Analysis complete for {}: score {}/100 ({}).",
                s.candidate_label, s.score, s.verdict
            ),
            ScoreResult::Bulk(b) => {
                let mut text = format!(
                    "Ranked {} resumes: {} shortlisted (score >= {}), {} rejected.",
                    b.entries.len(),
                    b.shortlisted.len(),
                    b.threshold,
                    b.rejected.len()
                );
                if let Some(top) = b.top() {
                    text.push_str(&format!(
                        " Top candidate: {} ({}/100).",
                        top.candidate_label, top.score
                    ));
                }
                text
            }
        }
    }
}
