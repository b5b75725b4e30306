//! Participant roles and the route role table
//!
//! Roles form a total order: Guest < Reader < Author < Advisor < Validator < Admin.
//! The route table replaces a process-wide map: it is built once from
//! configuration and handed to the HTTP layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Participant role, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "RoleRepr")]
#[repr(u8)]
#[derive(Default)]
pub enum ParticipantRole {
    /// Unregistered caller
    #[default]
    Guest = 0,
    /// Registered participant, may purchase and bookmark
    Reader = 1,
    /// May publish works
    Author = 2,
    Advisor = 3,
    /// May review works and sees all content
    Validator = 4,
    /// Approves and removes works
    Admin = 5,
}

/// Roles arrive either as their numeric code (relational store, tokens
/// minted by the identity service) or as their upper-case name.
#[derive(Deserialize)]
#[serde(untagged)]
enum RoleRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<RoleRepr> for ParticipantRole {
    type Error = String;

    fn try_from(repr: RoleRepr) -> Result<Self, Self::Error> {
        match repr {
            RoleRepr::Code(code) => {
                ParticipantRole::from_code(code).ok_or_else(|| format!("unknown role code {code}"))
            }
            RoleRepr::Name(name) => name.parse(),
        }
    }
}

impl ParticipantRole {
    /// All roles in ascending order
    pub const ALL: [ParticipantRole; 6] = [
        ParticipantRole::Guest,
        ParticipantRole::Reader,
        ParticipantRole::Author,
        ParticipantRole::Advisor,
        ParticipantRole::Validator,
        ParticipantRole::Admin,
    ];

    /// Numeric code used by the relational store
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|r| i64::from(r.code()) == code)
    }

    /// Whether this role satisfies the given minimum
    pub fn at_least(self, minimum: ParticipantRole) -> bool {
        self >= minimum
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantRole::Guest => write!(f, "GUEST"),
            ParticipantRole::Reader => write!(f, "READER"),
            ParticipantRole::Author => write!(f, "AUTHOR"),
            ParticipantRole::Advisor => write!(f, "ADVISOR"),
            ParticipantRole::Validator => write!(f, "VALIDATOR"),
            ParticipantRole::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GUEST" => Ok(ParticipantRole::Guest),
            "READER" => Ok(ParticipantRole::Reader),
            "AUTHOR" => Ok(ParticipantRole::Author),
            "ADVISOR" => Ok(ParticipantRole::Advisor),
            "VALIDATOR" => Ok(ParticipantRole::Validator),
            "ADMIN" => Ok(ParticipantRole::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Minimum role per HTTP operation.
///
/// Operations missing from the table are public.
#[derive(Debug, Clone)]
pub struct RoleGate {
    routes: HashMap<String, ParticipantRole>,
}

impl Default for RoleGate {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RoleGate {
    /// Build a gate from an explicit table
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = (S, ParticipantRole)>,
        S: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// The library's standard table
    pub fn with_defaults() -> Self {
        use ParticipantRole::*;
        Self::new([
            // Participants
            ("get_basic_info", Reader),
            ("update_basic_info", Reader),
            ("become_author", Reader),
            ("become_validator", Reader),
            ("update_author_info", Author),
            ("update_validator_info", Validator),
            ("faucet", Reader),
            // Reviews
            ("update_review", Validator),
            ("work_review", Validator),
            ("work_review_status", Validator),
            ("submit_work_review", Validator),
            ("work_reviews", Author),
            // Works
            ("publish_work", Author),
            ("pending_works", Admin),
            ("approve_work", Admin),
            ("remove_work", Admin),
            ("purchase_work", Reader),
            ("purchased_works", Reader),
            ("mark_purchased", Admin),
            // Bookmarks
            ("add_bookmark", Reader),
            ("remove_bookmark", Reader),
            ("bookmarks", Reader),
        ])
    }

    /// Override or add a single entry
    pub fn set(&mut self, operation: impl Into<String>, role: ParticipantRole) {
        self.routes.insert(operation.into(), role);
    }

    /// Required role for an operation; None means public
    pub fn required_role(&self, operation: &str) -> Option<ParticipantRole> {
        self.routes.get(operation).copied()
    }

    /// Check whether a caller (None = anonymous) may invoke an operation
    pub fn is_allowed(&self, operation: &str, role: Option<ParticipantRole>) -> bool {
        match self.required_role(operation) {
            None => true,
            Some(required) => role.is_some_and(|r| r >= required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(ParticipantRole::Admin > ParticipantRole::Validator);
        assert!(ParticipantRole::Validator > ParticipantRole::Advisor);
        assert!(ParticipantRole::Advisor > ParticipantRole::Author);
        assert!(ParticipantRole::Author > ParticipantRole::Reader);
        assert!(ParticipantRole::Reader > ParticipantRole::Guest);
    }

    #[test]
    fn test_role_codes_round_trip_through_store_representation() {
        for role in ParticipantRole::ALL {
            assert_eq!(ParticipantRole::from_code(role.code().into()), Some(role));
        }
        assert_eq!(ParticipantRole::from_code(6), None);
        assert_eq!(ParticipantRole::from_code(-1), None);
    }

    #[test]
    fn test_role_deserializes_from_code_or_name() {
        let from_code: ParticipantRole = serde_json::from_str("4").unwrap();
        assert_eq!(from_code, ParticipantRole::Validator);

        let from_name: ParticipantRole = serde_json::from_str("\"author\"").unwrap();
        assert_eq!(from_name, ParticipantRole::Author);

        assert!(serde_json::from_str::<ParticipantRole>("9").is_err());
        assert_eq!(
            serde_json::to_string(&ParticipantRole::Admin).unwrap(),
            "\"ADMIN\""
        );
    }

    #[test]
    fn test_public_operations() {
        let gate = RoleGate::with_defaults();
        assert!(gate.is_allowed("works", None));
        assert!(gate.is_allowed("works", Some(ParticipantRole::Reader)));
    }

    #[test]
    fn test_gated_operations() {
        let gate = RoleGate::with_defaults();
        assert!(!gate.is_allowed("publish_work", None));
        assert!(!gate.is_allowed("publish_work", Some(ParticipantRole::Reader)));
        assert!(gate.is_allowed("publish_work", Some(ParticipantRole::Author)));
        assert!(gate.is_allowed("publish_work", Some(ParticipantRole::Admin)));

        assert!(!gate.is_allowed("approve_work", Some(ParticipantRole::Validator)));
        assert!(gate.is_allowed("approve_work", Some(ParticipantRole::Admin)));
    }

    #[test]
    fn test_override_entry() {
        let mut gate = RoleGate::with_defaults();
        gate.set("pending_works", ParticipantRole::Validator);
        assert!(gate.is_allowed("pending_works", Some(ParticipantRole::Validator)));
    }
}
