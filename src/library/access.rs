//! Who may see a work, and whether they may read its content

use serde::Serialize;

use super::participant::Participant;
use super::work::{Work, WorkLink, WorkStatus};
use crate::auth::ParticipantRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Visibility {
    /// The work may appear in results for this viewer
    pub listed: bool,
    /// The work's content may be returned to this viewer
    pub content_visible: bool,
}

/// Visibility of the work behind `link` for `viewer` (None = anonymous).
///
/// Listed when the work is OPEN, the viewer is its author or at least a
/// validator, or the viewer holds a valid purchase. Content is visible to
/// the author, validators and above, and to purchase holders.
pub fn visibility(link: &WorkLink, viewer: Option<&Participant>, purchased: bool) -> Visibility {
    let privileged = viewer.is_some_and(|p| {
        p.id == link.participant_id || p.role >= ParticipantRole::Validator
    });

    Visibility {
        listed: link.status == WorkStatus::Open || privileged || purchased,
        content_visible: privileged || purchased,
    }
}

impl Visibility {
    /// Apply to a work: None when unlisted, content stripped when hidden
    pub fn apply(self, mut work: Work) -> Option<Work> {
        if !self.listed {
            return None;
        }
        if !self.content_visible {
            work.content = None;
        }
        Some(work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn participant(id: &str, role: ParticipantRole) -> Participant {
        Participant {
            id: id.into(),
            nickname: id.into(),
            web3_address: format!("0x{:0>40}", id.len()),
            role,
            language: String::new(),
            created_at: Utc::now(),
        }
    }

    fn link(status: WorkStatus) -> WorkLink {
        WorkLink {
            id: "link".into(),
            participant_id: "author".into(),
            work_id: "w".into(),
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_visibility_matrix_for_work_under_review() {
        let w = link(WorkStatus::Review);
        let reader = participant("reader", ParticipantRole::Reader);
        let validator = participant("validator", ParticipantRole::Validator);
        let author = participant("author", ParticipantRole::Author);

        assert!(!visibility(&w, Some(&reader), false).listed);
        assert_eq!(
            visibility(&w, Some(&validator), false),
            Visibility {
                listed: true,
                content_visible: true
            }
        );
        assert_eq!(
            visibility(&w, Some(&author), false),
            Visibility {
                listed: true,
                content_visible: true
            }
        );
        // An author other than the owner gets no special treatment
        let other_author = participant("someone", ParticipantRole::Author);
        assert!(!visibility(&w, Some(&other_author), false).listed);
    }

    #[test]
    fn test_anonymous_sees_open_metadata_only() {
        assert_eq!(
            visibility(&link(WorkStatus::Open), None, false),
            Visibility {
                listed: true,
                content_visible: false
            }
        );
        assert!(!visibility(&link(WorkStatus::Declined), None, false).listed);
    }

    #[test]
    fn test_purchase_unlocks_content_of_open_work() {
        let reader = participant("reader", ParticipantRole::Reader);
        let open = link(WorkStatus::Open);
        assert!(!visibility(&open, Some(&reader), false).content_visible);
        assert!(visibility(&open, Some(&reader), true).content_visible);
    }

    #[test]
    fn test_purchase_lists_work_under_review() {
        let reader = participant("reader", ParticipantRole::Reader);
        assert_eq!(
            visibility(&link(WorkStatus::Review), Some(&reader), true),
            Visibility {
                listed: true,
                content_visible: true
            }
        );
    }
}
