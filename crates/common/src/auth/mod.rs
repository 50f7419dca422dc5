//! OAuth 2.0 helpers shared by the login flow
//!
//! Only the PKCE primitives live here; token endpoint calls are an
//! infrastructure concern and session lifecycle is core business logic.

pub mod pkce;

pub use pkce::{
    code_challenge_s256, generate_code_verifier, generate_state, validate_state, PkceChallenge,
};
