//! Participants and their author/validator profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::ParticipantRole;
use crate::types::{LibraryError, Result};

/// A registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(skip_serializing)]
    #[serde(default)]
    pub id: String,
    pub nickname: String,
    pub web3_address: String,
    pub role: ParticipantRole,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(skip_serializing)]
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(
        nickname: impl Into<String>,
        web3_address: &str,
        role: ParticipantRole,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: super::new_id(),
            nickname: nickname.into(),
            web3_address: normalize_address(web3_address),
            role,
            language: String::new(),
            created_at,
        }
    }
}

/// Whether `address` is `0x` followed by 40 hex digits
pub fn is_web3_address(address: &str) -> bool {
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"));
    match hex {
        Some(digits) => digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Addresses are stored and compared in lower case
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub nickname: String,
    pub web3_address: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        if self.nickname.trim().is_empty() {
            return Err(LibraryError::BadRequest("nickname is empty".into()));
        }
        if !is_web3_address(self.web3_address.trim()) {
            return Err(LibraryError::BadRequest(format!(
                "wrong web3 address: {}",
                self.web3_address
            )));
        }
        Ok(())
    }
}

/// Author extension of a participant, keyed by participant id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthorProfile {
    #[serde(skip_serializing, default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub middlename: String,
    pub surname: String,
    pub email_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub orcid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sciences: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scholar_ship_profile: String,
}

/// Validator extension of a participant, keyed by participant id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidatorProfile {
    #[serde(skip_serializing, default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub middlename: String,
    pub surname: String,
    pub email_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub orcid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sciences: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    /// Reference to the diploma document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diploma_id: String,
}

/// Profile fields sent when applying for a role or editing a profile.
///
/// On application, email, name and surname are mandatory (and language for
/// validators). On update, only non-empty fields replace stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub middlename: String,
    #[serde(default)]
    pub orcid: String,
    #[serde(default)]
    pub sciences: Vec<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub scholar_ship_profile: String,
}

impl ProfileFields {
    fn require_identity(&self) -> Result<()> {
        if self.email_address.is_empty() {
            return Err(LibraryError::BadRequest("email address is empty".into()));
        }
        if self.name.is_empty() {
            return Err(LibraryError::BadRequest("name is empty".into()));
        }
        if self.surname.is_empty() {
            return Err(LibraryError::BadRequest("surname is empty".into()));
        }
        Ok(())
    }

    pub fn validate_author_application(&self) -> Result<()> {
        self.require_identity()
    }

    pub fn validate_validator_application(&self) -> Result<()> {
        self.require_identity()?;
        if self.language.is_empty() {
            return Err(LibraryError::BadRequest("language is empty".into()));
        }
        Ok(())
    }

    pub fn into_author(self, participant_id: &str) -> AuthorProfile {
        AuthorProfile {
            id: participant_id.to_string(),
            name: self.name,
            middlename: self.middlename,
            surname: self.surname,
            email_address: self.email_address,
            orcid: self.orcid,
            sciences: self.sciences,
            language: self.language,
            scholar_ship_profile: self.scholar_ship_profile,
        }
    }

    pub fn into_validator(self, participant_id: &str) -> ValidatorProfile {
        ValidatorProfile {
            id: participant_id.to_string(),
            name: self.name,
            middlename: self.middlename,
            surname: self.surname,
            email_address: self.email_address,
            orcid: self.orcid,
            sciences: self.sciences,
            language: self.language,
            diploma_id: String::new(),
        }
    }

    pub fn apply_to_author(self, profile: &mut AuthorProfile) {
        replace_if_present(&mut profile.email_address, self.email_address);
        replace_if_present(&mut profile.name, self.name);
        replace_if_present(&mut profile.surname, self.surname);
        replace_if_present(&mut profile.middlename, self.middlename);
        replace_if_present(&mut profile.orcid, self.orcid);
        replace_if_present(&mut profile.language, self.language);
        replace_if_present(&mut profile.scholar_ship_profile, self.scholar_ship_profile);
        if !self.sciences.is_empty() {
            profile.sciences = self.sciences;
        }
    }

    pub fn apply_to_validator(self, profile: &mut ValidatorProfile) {
        replace_if_present(&mut profile.email_address, self.email_address);
        replace_if_present(&mut profile.name, self.name);
        replace_if_present(&mut profile.surname, self.surname);
        replace_if_present(&mut profile.middlename, self.middlename);
        replace_if_present(&mut profile.orcid, self.orcid);
        replace_if_present(&mut profile.language, self.language);
        if !self.sciences.is_empty() {
            profile.sciences = self.sciences;
        }
    }
}

fn replace_if_present(slot: &mut String, value: String) {
    if !value.is_empty() {
        *slot = value;
    }
}

/// Author as shown next to a work or on the author page
#[derive(Debug, Clone, Serialize)]
pub struct AuthorInfo {
    pub basic_info: Participant,
    pub author_info: Option<AuthorProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatorInfo {
    pub basic_info: Participant,
    pub validator_info: Option<ValidatorProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web3_address_shape() {
        assert!(is_web3_address("0xdd868980ef73edcbc1ff758f6e53023be18e2a52"));
        assert!(is_web3_address("0xDD868980EF73EDCBC1FF758F6E53023BE18E2A52"));
        assert!(!is_web3_address("dd868980ef73edcbc1ff758f6e53023be18e2a52"));
        assert!(!is_web3_address("0xdd868980ef73edcbc1ff758f6e53023be18e2a5"));
        assert!(!is_web3_address("0xzz868980ef73edcbc1ff758f6e53023be18e2a52"));
    }

    #[test]
    fn test_registration_validation() {
        let ok = Registration {
            nickname: "reader".into(),
            web3_address: "0xdd868980ef73edcbc1ff758f6e53023be18e2a52".into(),
        };
        assert!(ok.validate().is_ok());

        let no_nick = Registration {
            nickname: " ".into(),
            ..ok.clone()
        };
        assert!(matches!(no_nick.validate(), Err(LibraryError::BadRequest(_))));

        let bad_address = Registration {
            web3_address: "0x1234".into(),
            ..ok
        };
        assert!(matches!(bad_address.validate(), Err(LibraryError::BadRequest(_))));
    }

    #[test]
    fn test_validator_application_needs_language() {
        let fields = ProfileFields {
            email_address: "v@science.org".into(),
            name: "Vera".into(),
            surname: "Ivanova".into(),
            ..Default::default()
        };
        assert!(fields.validate_author_application().is_ok());
        assert!(fields.validate_validator_application().is_err());
    }

    #[test]
    fn test_profile_update_replaces_only_present_fields() {
        let mut profile = ProfileFields {
            email_address: "a@science.org".into(),
            name: "Anna".into(),
            surname: "Petrova".into(),
            sciences: vec!["math".into()],
            ..Default::default()
        }
        .into_author("p1");

        ProfileFields {
            orcid: "0000-0002-1825-0097".into(),
            ..Default::default()
        }
        .apply_to_author(&mut profile);

        assert_eq!(profile.name, "Anna");
        assert_eq!(profile.email_address, "a@science.org");
        assert_eq!(profile.sciences, vec!["math".to_string()]);
        assert_eq!(profile.orcid, "0000-0002-1825-0097");
    }
}
