// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const WS_PATH: &str = "ws";

// Hub intake capacities
pub const DEFAULT_REGISTER_CAPACITY: usize = 32;
pub const DEFAULT_UNREGISTER_CAPACITY: usize = 32;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

// Fan-out configuration constants
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 64;

// Message and token limits
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4096;
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;
pub const DEFAULT_REVOCATION_CLEANUP_SECS: u64 = 900;
pub const MAX_REQUEST_BODY_BYTES: u64 = 16 * 1024;
pub const MIN_PASSWORD_LENGTH: usize = 6;
