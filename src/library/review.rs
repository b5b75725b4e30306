//! Reviews: typed questionnaires, merge rules and the last-review rule

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::work::WorkTransition;
use crate::types::{LibraryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewStatus {
    #[serde(rename = "WORK_REVIEW_IN_PROGRESS")]
    InProgress,
    #[serde(rename = "WORK_REVIEW_SKIPPED")]
    Skipped,
    #[serde(rename = "WORK_REVIEW_DECLINED")]
    Rejected,
    #[serde(rename = "WORK_REVIEW_SUBMITTED")]
    Submitted,
    #[serde(rename = "WORK_REVIEW_ACCEPTED")]
    Accepted,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::InProgress => "WORK_REVIEW_IN_PROGRESS",
            ReviewStatus::Skipped => "WORK_REVIEW_SKIPPED",
            ReviewStatus::Rejected => "WORK_REVIEW_DECLINED",
            ReviewStatus::Submitted => "WORK_REVIEW_SUBMITTED",
            ReviewStatus::Accepted => "WORK_REVIEW_ACCEPTED",
        }
    }

    /// Work transition this status triggers once the review pool concludes
    pub fn work_transition(self) -> Option<WorkTransition> {
        match self {
            ReviewStatus::Submitted => Some(WorkTransition::Confirm),
            ReviewStatus::Rejected | ReviewStatus::Skipped => Some(WorkTransition::Decline),
            ReviewStatus::InProgress | ReviewStatus::Accepted => None,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts wire names and their short forms; anything else is rejected.
impl FromStr for ReviewStatus {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("WORK_REVIEW_").unwrap_or(&upper);
        match short {
            "IN_PROGRESS" => Ok(ReviewStatus::InProgress),
            "SKIPPED" => Ok(ReviewStatus::Skipped),
            "DECLINED" | "REJECTED" => Ok(ReviewStatus::Rejected),
            "SUBMITTED" => Ok(ReviewStatus::Submitted),
            "ACCEPTED" => Ok(ReviewStatus::Accepted),
            _ => Err(LibraryError::BadRequest(format!(
                "unknown review status '{}'",
                s.trim()
            ))),
        }
    }
}

/// Questionnaire key: 1-64 characters of `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionId(String);

impl QuestionId {
    pub const MAX_LEN: usize = 64;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QuestionId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return Err(format!(
                "question id must be 1-{} characters, got {}",
                Self::MAX_LEN,
                value.len()
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("question id '{value}' has invalid characters"));
        }
        Ok(Self(value))
    }
}

impl From<QuestionId> for String {
    fn from(id: QuestionId) -> Self {
        id.0
    }
}

/// Agreement score, 0 (disagree) to 4 (agree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 4;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(format!("score {value} is outside 0..={}", Self::MAX)),
        }
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> Self {
        i64::from(score.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Questionnaire {
    pub questions: BTreeMap<QuestionId, Score>,
}

/// Stored review body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReviewBody {
    pub questionnaire: Option<Questionnaire>,
    #[serde(default)]
    pub review: String,
}

/// Incoming review edit
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewDraft {
    pub work_id: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub body: ReviewBody,
}

impl ReviewDraft {
    pub fn validate(&self) -> Result<()> {
        if self.work_id.trim().is_empty() {
            return Err(LibraryError::BadRequest("work id is empty".into()));
        }
        if self.body.questionnaire.is_none() && self.body.review.is_empty() {
            return Err(LibraryError::BadRequest("review body is empty".into()));
        }
        Ok(())
    }
}

impl ReviewBody {
    /// Merge by presence: a questionnaire replaces the stored one, non-empty
    /// text replaces the stored text, absent fields keep prior values.
    pub fn merge(&mut self, incoming: ReviewBody) {
        if let Some(questionnaire) = incoming.questionnaire {
            self.questionnaire = Some(questionnaire);
        }
        if !incoming.review.is_empty() {
            self.review = incoming.review;
        }
    }
}

/// Document-side review, sharing its id with the [`ReviewLink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkReview {
    pub id: String,
    pub work_id: String,
    pub body: ReviewBody,
    pub status: ReviewStatus,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "created_date")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_date")]
    pub updated_at: DateTime<Utc>,
}

/// Relational row for one (validator, work) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewLink {
    #[serde(skip_serializing, default)]
    pub id: String,
    #[serde(skip_serializing, default)]
    pub participant_id: String,
    #[serde(skip_serializing, default)]
    pub work_id: String,
    pub status: ReviewStatus,
    #[serde(rename = "created_date")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_date")]
    pub updated_at: DateTime<Utc>,
}

impl ReviewLink {
    pub fn new(participant_id: &str, work_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: super::new_id(),
            participant_id: participant_id.to_string(),
            work_id: work_id.to_string(),
            status: ReviewStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }
}

/// When a submission concludes the review pool of a work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewQuorum {
    /// Any row of the work already SUBMITTED before this write
    #[default]
    AnySubmitted,
    /// Every row other than the submitter's already SUBMITTED
    AllOthersSubmitted,
}

impl ReviewQuorum {
    /// Evaluate against the rows as they were before the submitter's write
    pub fn is_last_review(self, rows: &[ReviewLink], submitter_row_id: &str) -> bool {
        match self {
            ReviewQuorum::AnySubmitted => rows.iter().any(|r| r.status == ReviewStatus::Submitted),
            ReviewQuorum::AllOthersSubmitted => rows
                .iter()
                .filter(|r| r.id != submitter_row_id)
                .all(|r| r.status == ReviewStatus::Submitted),
        }
    }
}

impl FromStr for ReviewQuorum {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any-submitted" | "any_submitted" => Ok(ReviewQuorum::AnySubmitted),
            "all-others-submitted" | "all_others_submitted" => {
                Ok(ReviewQuorum::AllOthersSubmitted)
            }
            other => Err(format!(
                "unknown review quorum '{other}' (expected any-submitted or all-others-submitted)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questionnaire(pairs: &[(&str, i64)]) -> Questionnaire {
        Questionnaire {
            questions: pairs
                .iter()
                .map(|(k, v)| {
                    (
                        QuestionId::try_from(k.to_string()).unwrap(),
                        Score::try_from(*v).unwrap(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_merge_keeps_questionnaire_when_only_text_sent() {
        let q1 = questionnaire(&[("novelty", 3)]);
        let mut body = ReviewBody {
            questionnaire: Some(q1.clone()),
            review: "A".into(),
        };

        body.merge(ReviewBody {
            questionnaire: None,
            review: "B".into(),
        });
        assert_eq!(body.questionnaire, Some(q1));
        assert_eq!(body.review, "B");
    }

    #[test]
    fn test_merge_keeps_text_when_only_questionnaire_sent() {
        let q2 = questionnaire(&[("clarity", 1)]);
        let mut body = ReviewBody {
            questionnaire: Some(questionnaire(&[("novelty", 3)])),
            review: "A".into(),
        };

        body.merge(ReviewBody {
            questionnaire: Some(q2.clone()),
            review: String::new(),
        });
        assert_eq!(body.questionnaire, Some(q2));
        assert_eq!(body.review, "A");
    }

    #[test]
    fn test_questionnaire_validated_on_deserialize() {
        let ok: Questionnaire =
            serde_json::from_str(r#"{"questions": {"q-1": 0, "q_2": 4}}"#).unwrap();
        assert_eq!(ok.questions.len(), 2);

        assert!(serde_json::from_str::<Questionnaire>(r#"{"questions": {"q1": 5}}"#).is_err());
        assert!(serde_json::from_str::<Questionnaire>(r#"{"questions": {"q1": -1}}"#).is_err());
        assert!(serde_json::from_str::<Questionnaire>(r#"{"questions": {"": 1}}"#).is_err());
        assert!(
            serde_json::from_str::<Questionnaire>(r#"{"questions": {"what?": 1}}"#).is_err()
        );
    }

    #[test]
    fn test_empty_draft_rejected() {
        let draft = ReviewDraft {
            work_id: "w1".into(),
            language: String::new(),
            body: ReviewBody::default(),
        };
        assert!(matches!(draft.validate(), Err(LibraryError::BadRequest(_))));
    }

    #[test]
    fn test_review_status_parsing_is_strict() {
        assert_eq!(
            "WORK_REVIEW_DECLINED".parse::<ReviewStatus>().unwrap(),
            ReviewStatus::Rejected
        );
        assert_eq!(
            "submitted".parse::<ReviewStatus>().unwrap(),
            ReviewStatus::Submitted
        );
        assert!("maybe".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_status_triggers() {
        assert_eq!(
            ReviewStatus::Submitted.work_transition(),
            Some(WorkTransition::Confirm)
        );
        assert_eq!(
            ReviewStatus::Skipped.work_transition(),
            Some(WorkTransition::Decline)
        );
        assert_eq!(ReviewStatus::InProgress.work_transition(), None);
        assert_eq!(ReviewStatus::Accepted.work_transition(), None);
    }

    #[test]
    fn test_quorum_rules() {
        let now = Utc::now();
        let mut rows = vec![
            ReviewLink::new("v1", "w", now),
            ReviewLink::new("v2", "w", now),
            ReviewLink::new("v3", "w", now),
        ];
        let v1 = rows[0].id.clone();
        let v3 = rows[2].id.clone();

        assert!(!ReviewQuorum::AnySubmitted.is_last_review(&rows, &v1));
        assert!(!ReviewQuorum::AllOthersSubmitted.is_last_review(&rows, &v3));

        rows[0].status = ReviewStatus::Submitted;
        assert!(ReviewQuorum::AnySubmitted.is_last_review(&rows, &v3));
        assert!(!ReviewQuorum::AllOthersSubmitted.is_last_review(&rows, &v3));

        rows[1].status = ReviewStatus::Submitted;
        assert!(ReviewQuorum::AllOthersSubmitted.is_last_review(&rows, &v3));
    }
}
