//! Works and the work status state machine
//!
//! ```text
//! PRE_REVIEW --approve--> REVIEW --confirm--> OPEN
//!                                \--decline--> DECLINED
//! ```
//!
//! OPEN and DECLINED are final for the review cycle. The relational linkage
//! row carries the authoritative status; the document copy follows it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{LibraryError, Result};

/// Price applied when the author leaves it empty (50 tokens, in wei)
pub const DEFAULT_WORK_PRICE: &str = "50000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkStatus {
    #[serde(rename = "WORK_UNDER_PRE_REVIEW")]
    PreReview,
    #[serde(rename = "WORK_UNDER_REVIEW")]
    Review,
    #[serde(rename = "WORK_OPEN")]
    Open,
    #[serde(rename = "WORK_DECLINED")]
    Declined,
}

impl WorkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkStatus::PreReview => "WORK_UNDER_PRE_REVIEW",
            WorkStatus::Review => "WORK_UNDER_REVIEW",
            WorkStatus::Open => "WORK_OPEN",
            WorkStatus::Declined => "WORK_DECLINED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkStatus::Open | WorkStatus::Declined)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WORK_UNDER_PRE_REVIEW" | "PRE_REVIEW" | "PRE-REVIEW" => Ok(WorkStatus::PreReview),
            "WORK_UNDER_REVIEW" | "REVIEW" => Ok(WorkStatus::Review),
            "WORK_OPEN" | "OPEN" => Ok(WorkStatus::Open),
            "WORK_DECLINED" | "DECLINED" => Ok(WorkStatus::Declined),
            other => Err(LibraryError::BadRequest(format!(
                "unknown work status '{other}'"
            ))),
        }
    }
}

/// Status changes after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkTransition {
    /// Admin releases a pre-reviewed work to validators
    Approve,
    /// Reviews concluded positively
    Confirm,
    /// Reviews concluded negatively
    Decline,
}

/// What a transition does to a given current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Write `to` conditioned on the current status still being `from`
    Apply { from: WorkStatus, to: WorkStatus },
    /// Already at the target
    Unchanged,
    /// A review-driven transition against a status it does not apply to
    Ignored,
}

impl WorkTransition {
    pub fn name(self) -> &'static str {
        match self {
            WorkTransition::Approve => "approve",
            WorkTransition::Confirm => "confirm",
            WorkTransition::Decline => "decline",
        }
    }

    pub fn source(self) -> WorkStatus {
        match self {
            WorkTransition::Approve => WorkStatus::PreReview,
            WorkTransition::Confirm | WorkTransition::Decline => WorkStatus::Review,
        }
    }

    pub fn target(self) -> WorkStatus {
        match self {
            WorkTransition::Approve => WorkStatus::Review,
            WorkTransition::Confirm => WorkStatus::Open,
            WorkTransition::Decline => WorkStatus::Declined,
        }
    }

    /// Decide what this transition means from `current`.
    ///
    /// Approving a work that already left review is a conflict; review-driven
    /// transitions never fail, they are ignored outside REVIEW.
    pub fn plan(self, current: WorkStatus) -> Result<TransitionPlan> {
        if current == self.target() {
            return Ok(TransitionPlan::Unchanged);
        }
        if current == self.source() {
            return Ok(TransitionPlan::Apply {
                from: current,
                to: self.target(),
            });
        }
        match self {
            WorkTransition::Approve => Err(LibraryError::Conflict(format!(
                "work in status {current} cannot be approved"
            ))),
            WorkTransition::Confirm | WorkTransition::Decline => Ok(TransitionPlan::Ignored),
        }
    }
}

/// Which status a newly published work enters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialWorkStatus {
    /// Straight to the validator queue
    #[default]
    Review,
    /// Held until an admin approves it
    PreReview,
}

impl InitialWorkStatus {
    pub fn status(self) -> WorkStatus {
        match self {
            InitialWorkStatus::Review => WorkStatus::Review,
            InitialWorkStatus::PreReview => WorkStatus::PreReview,
        }
    }
}

impl FromStr for InitialWorkStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "review" => Ok(InitialWorkStatus::Review),
            "pre-review" | "pre_review" | "prereview" => Ok(InitialWorkStatus::PreReview),
            other => Err(format!(
                "unknown initial work status '{other}' (expected review or pre-review)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkContent {
    pub work_data: String,
}

/// Document-side work record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: String,
    pub name: String,
    pub annotation: String,
    #[serde(skip_serializing, default)]
    pub author_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub price: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sources: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    pub status: WorkStatus,
    pub content: Option<WorkContent>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing, default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub released_at: Option<DateTime<Utc>>,
}

/// Publication payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewWork {
    pub name: String,
    pub annotation: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub sources: String,
    #[serde(default)]
    pub language: String,
    pub content: Option<WorkContent>,
}

impl NewWork {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LibraryError::BadRequest("work name is empty".into()));
        }
        if self.annotation.trim().is_empty() {
            return Err(LibraryError::BadRequest("work annotation is empty".into()));
        }
        match &self.content {
            Some(content) if !content.work_data.is_empty() => {}
            _ => return Err(LibraryError::BadRequest("work content is empty".into())),
        }
        if !self.price.is_empty() && !self.price.chars().all(|c| c.is_ascii_digit()) {
            return Err(LibraryError::BadRequest(format!(
                "work price must be a decimal amount in wei, got '{}'",
                self.price
            )));
        }
        Ok(())
    }

    /// Build the document record attributed to `author_id`
    pub fn into_work(
        self,
        author_id: &str,
        status: WorkStatus,
        default_price: &str,
        now: DateTime<Utc>,
    ) -> Work {
        let price = if self.price.is_empty() {
            default_price.to_string()
        } else {
            self.price
        };
        Work {
            id: super::new_id(),
            name: self.name,
            annotation: self.annotation,
            author_id: author_id.to_string(),
            tags: self.tags,
            price,
            sources: self.sources,
            language: self.language,
            status,
            content: self.content,
            created_at: now,
            updated_at: now,
            released_at: None,
        }
    }
}

/// Relational linkage between a work and its author; owns the status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLink {
    pub id: String,
    /// Author's participant id
    pub participant_id: String,
    pub work_id: String,
    pub status: WorkStatus,
    pub created_at: DateTime<Utc>,
}

impl WorkLink {
    pub fn for_work(work: &Work) -> Self {
        Self {
            id: super::new_id(),
            participant_id: work.author_id.clone(),
            work_id: work.id.clone(),
            status: work.status,
            created_at: work.created_at,
        }
    }
}

/// Split a comma separated keyword path segment
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_apply() {
        assert_eq!(
            WorkTransition::Approve.plan(WorkStatus::PreReview).unwrap(),
            TransitionPlan::Apply {
                from: WorkStatus::PreReview,
                to: WorkStatus::Review
            }
        );
        assert_eq!(
            WorkTransition::Confirm.plan(WorkStatus::Review).unwrap(),
            TransitionPlan::Apply {
                from: WorkStatus::Review,
                to: WorkStatus::Open
            }
        );
        assert_eq!(
            WorkTransition::Decline.plan(WorkStatus::Review).unwrap(),
            TransitionPlan::Apply {
                from: WorkStatus::Review,
                to: WorkStatus::Declined
            }
        );
    }

    #[test]
    fn test_repeated_transitions_are_noops() {
        assert_eq!(
            WorkTransition::Confirm.plan(WorkStatus::Open).unwrap(),
            TransitionPlan::Unchanged
        );
        assert_eq!(
            WorkTransition::Decline.plan(WorkStatus::Declined).unwrap(),
            TransitionPlan::Unchanged
        );
        assert_eq!(
            WorkTransition::Approve.plan(WorkStatus::Review).unwrap(),
            TransitionPlan::Unchanged
        );
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert_eq!(
            WorkTransition::Decline.plan(WorkStatus::Open).unwrap(),
            TransitionPlan::Ignored
        );
        assert_eq!(
            WorkTransition::Confirm.plan(WorkStatus::Declined).unwrap(),
            TransitionPlan::Ignored
        );
        assert_eq!(
            WorkTransition::Confirm.plan(WorkStatus::PreReview).unwrap(),
            TransitionPlan::Ignored
        );
        assert!(matches!(
            WorkTransition::Approve.plan(WorkStatus::Open),
            Err(LibraryError::Conflict(_))
        ));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&WorkStatus::PreReview).unwrap(),
            "\"WORK_UNDER_PRE_REVIEW\""
        );
        assert_eq!("work_open".parse::<WorkStatus>().unwrap(), WorkStatus::Open);
        assert!("published".parse::<WorkStatus>().is_err());
    }

    #[test]
    fn test_new_work_validation_and_default_price() {
        let draft = NewWork {
            name: "On monofins".into(),
            annotation: "Hydrodynamics of a single blade".into(),
            tags: vec![],
            price: String::new(),
            sources: String::new(),
            language: "en".into(),
            content: Some(WorkContent {
                work_data: "body".into(),
            }),
        };
        assert!(draft.validate().is_ok());

        let work = draft.into_work("author-1", WorkStatus::Review, DEFAULT_WORK_PRICE, Utc::now());
        assert_eq!(work.price, DEFAULT_WORK_PRICE);
        assert_eq!(work.author_id, "author-1");

        let empty_content = NewWork {
            name: "x".into(),
            annotation: "y".into(),
            tags: vec![],
            price: "12".into(),
            sources: String::new(),
            language: String::new(),
            content: None,
        };
        assert!(matches!(
            empty_content.validate(),
            Err(LibraryError::BadRequest(_))
        ));
    }

    #[test]
    fn test_keyword_parsing() {
        assert_eq!(
            parse_keywords("monofin, Diving,,"),
            vec!["monofin".to_string(), "Diving".to_string()]
        );
        assert!(parse_keywords(" , ").is_empty());
    }
}
