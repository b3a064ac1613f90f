pub const DEFAULT_CAPACITY: usize = 256;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
