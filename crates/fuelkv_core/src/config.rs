//! Store open options.

/// Default number of pending writes held before an automatic flush.
pub const DEFAULT_CACHE_CAPACITY: usize = 250;

/// Default estimated index growth, in bytes, that forces the mapped index
/// to be rewritten during an automatic flush.
pub const DEFAULT_INDEX_FLUSH_THRESHOLD: u64 = 25 * 1024 * 1024;

/// Options for opening a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject every mutation and never create the file.
    pub read_only: bool,

    /// Pending writes held (per table, for relational stores) before an
    /// automatic flush. Never zero.
    pub cache_capacity: usize,

    /// Delete an existing file before opening. Ignored for read-only opens.
    pub override_existing: bool,

    /// Mapped stores only: index growth that forces an index rewrite.
    pub index_flush_threshold: u64,

    /// Mapped stores only: decode the index on a background thread.
    pub background_index_load: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            override_existing: false,
            index_flush_threshold: DEFAULT_INDEX_FLUSH_THRESHOLD,
            background_index_load: true,
        }
    }
}

impl StoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for default options with `read_only` set.
    #[must_use]
    pub fn read_only_mode() -> Self {
        Self::default().with_read_only(true)
    }

    /// Sets read-only mode.
    #[must_use]
    pub const fn with_read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets the write cache capacity. Zero is raised to one.
    #[must_use]
    pub const fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Sets whether an existing file is deleted on open.
    #[must_use]
    pub const fn override_existing(mut self, value: bool) -> Self {
        self.override_existing = value;
        self
    }

    /// Sets the mapped index rewrite threshold in bytes.
    #[must_use]
    pub const fn index_flush_threshold(mut self, bytes: u64) -> Self {
        self.index_flush_threshold = bytes;
        self
    }

    /// Sets whether the mapped index is decoded in the background.
    #[must_use]
    pub const fn background_index_load(mut self, value: bool) -> Self {
        self.background_index_load = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = StoreOptions::default();
        assert!(!options.read_only);
        assert!(!options.override_existing);
        assert!(options.background_index_load);
        assert_eq!(options.cache_capacity, 250);
        assert_eq!(options.index_flush_threshold, 25 * 1024 * 1024);
    }

    #[test]
    fn builder_pattern() {
        let options = StoreOptions::new()
            .cache_capacity(3)
            .override_existing(true)
            .background_index_load(false);

        assert_eq!(options.cache_capacity, 3);
        assert!(options.override_existing);
        assert!(!options.background_index_load);
        assert!(StoreOptions::read_only_mode().read_only);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(StoreOptions::new().cache_capacity(0).cache_capacity, 1);
    }
}
