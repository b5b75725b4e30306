//! Authentication and authorization for Scriptorium
//!
//! Provides:
//! - JWT validation (tokens are minted by the identity provider)
//! - Participant roles and the route role table

pub mod jwt;
pub mod roles;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use roles::{ParticipantRole, RoleGate};
