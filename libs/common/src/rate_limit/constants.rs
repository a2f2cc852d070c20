/// Maximum number of distinct keys (routes) to track in the LRU cache.
pub const MAX_TRACKED_KEYS: usize = 10_000;
