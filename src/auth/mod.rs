//! Authentication
//!
//! Accounts are managed outside this service; requests carry a bearer JWT
//! signed with the shared `JWT_SECRET`.

mod jwt;

pub use jwt::{generate_access_token, get_user_id_from_claims, verify_token, Claims, JwtConfig, JwtError};
