// Threshold, sort and partition rules. These are fixed contracts applied to
// every oracle response regardless of how the scores were produced.

use crate::models::score::{BulkRanking, RankedEntry, SingleScore, Verdict};

/// Builds the Single-mode result, deriving the verdict from the threshold.
pub fn judge(candidate_label: String, score: u8, narrative: String, threshold: u8) -> SingleScore {
    SingleScore {
        candidate_label,
        score,
        verdict: Verdict::from_score(score, threshold),
        narrative,
    }
}

/// Ranks Bulk entries given in submission order.
///
/// Sort is descending by score and stable, so ties keep submission order.
/// Shortlisted = score >= threshold, rejected = the rest, both descending.
pub fn rank(mut entries: Vec<RankedEntry>, threshold: u8) -> BulkRanking {
    entries.sort_by(|a, b| b.score.cmp(&a.score));

    let split = entries.partition_point(|e| e.score >= threshold);
    let shortlisted = entries[..split].to_vec();
    let rejected = entries[split..].to_vec();

    BulkRanking {
        entries,
        shortlisted,
        rejected,
        threshold,
    }
}
