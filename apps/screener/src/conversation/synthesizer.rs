//! Canned and result-derived replies standing in for a
//! language model.
//!
//! A responder only ever sees a shared borrow of the bound result, so it
//! cannot change session state. Without a `Ready` result it never quotes a
//! score; with one, result-referencing intents are answered from that
//! result's fields and nothing else.

use uuid::Uuid;

use crate::models::score::{BulkRanking, RankedEntry, ScoreResult, SingleScore, Verdict};

/// The responder trait. Swap in a model-backed implementation without
/// touching the session or the store.
pub trait ResponseSynthesizer: Send + Sync {
    fn reply(&self, conversation_id: Uuid, user_text: &str, bound: Option<&ScoreResult>) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Why,
    Experience,
    Contact,
    Shortlist,
    Score,
    Resume,
    Interview,
    Screening,
    Other,
}

const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::Why, &["why", "explain", "reason"]),
    (Intent::Experience, &["experience", "skill", "background"]),
    (Intent::Contact, &["contact", "reach out", "email", "phone"]),
    (Intent::Shortlist, &["shortlist", "rank", "best", "top", "reject"]),
    (Intent::Score, &["score", "result", "verdict", "suitable", "fit"]),
    (Intent::Resume, &["resume", "cv"]),
    (Intent::Interview, &["interview", "question"]),
    (Intent::Screening, &["screen"]),
];

fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();
    INTENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Other)
}

/// Keyword-driven responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedResponder;

impl ResponseSynthesizer for CannedResponder {
    fn reply(&self, conversation_id: Uuid, user_text: &str, bound: Option<&ScoreResult>) -> String {
        let intent = classify(user_text);
        tracing::debug!("Conversation {conversation_id}: intent {intent:?}");

        match bound {
            None => guidance(intent),
            Some(ScoreResult::Single(single)) => single_reply(intent, single),
            Some(ScoreResult::Bulk(bulk)) => bulk_reply(intent, bulk),
        }
    }
}

fn guidance(intent: Intent) -> String {
    match intent {
        Intent::Resume => "Drop the resume here (pdf/docx). Pick a job role and run an analysis and I will walk you through the result.".to_string(),
        Intent::Interview => "For interviews, consider role-specific technical questions, a system-design exercise and behavioral questions. Run an analysis first and I can tailor them to the candidate.".to_string(),
        Intent::Screening => "I can score a candidate on a 0-100 fit scale against the selected job role and flag whether they clear the shortlist threshold. Upload a resume to start.".to_string(),
        Intent::Why | Intent::Experience | Intent::Contact | Intent::Shortlist | Intent::Score => {
            "There is no analysis to refer to yet. Select a job role, add one or more resumes and run the analysis, then ask me again.".to_string()
        }
        Intent::Other => "I can explain screening results, compare shortlisted candidates and suggest interview questions. Try: 'why was this candidate rejected?' or 'who is on the shortlist?'".to_string(),
    }
}

fn threshold_relation(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Suitable => "meets",
        Verdict::NotSuitable => "falls below",
    }
}

fn single_reply(intent: Intent, s: &SingleScore) -> String {
    let label = &s.candidate_label;
    match intent {
        Intent::Why => format!(
            "{label} scored {}/100, which {} the suitability threshold, so the verdict is {}. {} {}",
            s.score,
            threshold_relation(s.verdict),
            s.verdict,
            s.narrative,
            single_next_steps(s)
        ),
        Intent::Experience => format!(
            "From the analysis of {label} ({}/100): {}",
            s.score, s.narrative
        ),
        Intent::Contact => format!(
            "I don't extract contact details; they are in {label}'s resume. The candidate scored {}/100 ({}). {}",
            s.score,
            s.verdict,
            single_next_steps(s)
        ),
        Intent::Interview => match s.verdict {
            Verdict::Suitable => format!(
                "{label} is {} at {}/100. Focus the interview on confirming the strengths in the analysis: {}",
                s.verdict, s.score, s.narrative
            ),
            Verdict::NotSuitable => format!(
                "{label} is {} at {}/100. If you still interview, probe the gaps: {}",
                s.verdict, s.score, s.narrative
            ),
        },
        Intent::Shortlist | Intent::Score | Intent::Resume | Intent::Screening | Intent::Other => {
            format!(
                "Current result: {label} scored {}/100 and is {}. Ask me why, or about experience and next steps.",
                s.score, s.verdict
            )
        }
    }
}

fn single_next_steps(s: &SingleScore) -> String {
    match s.verdict {
        Verdict::Suitable => format!(
            "Suggested next steps: shortlist candidate {}; schedule interview.",
            s.candidate_label
        ),
        Verdict::NotSuitable => format!(
            "Suggested next steps: reject candidate {}; request more information.",
            s.candidate_label
        ),
    }
}

fn list(entries: &[RankedEntry], limit: usize) -> String {
    entries
        .iter()
        .take(limit)
        .map(|e| format!("{} ({})", e.candidate_label, e.score))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bulk_reply(intent: Intent, b: &BulkRanking) -> String {
    let total = b.entries.len();
    let shortlisted = b.shortlisted.len();
    match intent {
        Intent::Why => {
            let mut text = format!(
                "{shortlisted} of {total} candidates scored {} or higher and made the shortlist.",
                b.threshold
            );
            if let Some(top) = b.top() {
                text.push_str(&format!(
                    " {} leads with {}/100.",
                    top.candidate_label, top.score
                ));
            }
            if !b.rejected.is_empty() {
                text.push_str(&format!(
                    " Rejected for falling below {}: {}.",
                    b.threshold,
                    list(&b.rejected, 5)
                ));
            }
            text
        }
        Intent::Experience => format!(
            "Strongest profiles by score: {}. Scores reflect skills and experience against the role requirements.",
            list(&b.entries, 3)
        ),
        Intent::Contact => match b.shortlisted.first() {
            Some(first) => format!(
                "I don't extract contact details; use the resumes. Reach out to the shortlist first: {}. Suggested next steps: shortlist candidate {}; schedule interview.",
                list(&b.shortlisted, 5),
                first.candidate_label
            ),
            None => format!(
                "No candidate reached the threshold of {}. Suggested next step: request more information or widen the search.",
                b.threshold
            ),
        },
        Intent::Shortlist => {
            if b.shortlisted.is_empty() {
                format!(
                    "Nobody made the shortlist (threshold {}). Rejected ({}): {}.",
                    b.threshold,
                    b.rejected.len(),
                    list(&b.rejected, 10)
                )
            } else {
                format!(
                    "Shortlisted ({shortlisted}): {}. Rejected ({}): {}.",
                    list(&b.shortlisted, 10),
                    b.rejected.len(),
                    if b.rejected.is_empty() {
                        "none".to_string()
                    } else {
                        list(&b.rejected, 10)
                    }
                )
            }
        }
        Intent::Interview => match b.top() {
            Some(top) => format!(
                "Start interviews with {} ({}/100), then work down the shortlist: {}.",
                top.candidate_label,
                top.score,
                list(&b.shortlisted, 5)
            ),
            None => "There are no ranked candidates to interview.".to_string(),
        },
        Intent::Score | Intent::Resume | Intent::Screening | Intent::Other => format!(
            "Current ranking: {total} resumes, {shortlisted} shortlisted at threshold {}. Top: {}.",
            b.threshold,
            list(&b.entries, 3)
        ),
    }
}
