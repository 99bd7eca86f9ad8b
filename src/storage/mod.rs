//! Storage mechanisms for user identities and token revocations

pub mod memory;
pub mod token_revocation;
pub mod traits;

// Re-export main components
pub use memory::{MemoryUserStore, UserRecord};
pub use token_revocation::TokenRevocationList;
pub use traits::{IdentityStore, SharedIdentityStore, UserId, UserIdentity, UserStatus};
