//! Authentication: token issuance/validation and password hashing

pub mod password;
pub mod token;

// Re-export main components
pub use password::{hash_password, verify_password};
pub use token::{extract_bearer_token, Claims, TokenManager};
