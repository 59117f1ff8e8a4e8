//! Storage configuration options

use std::path::PathBuf;

/// Options for configuring the storage engine
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Path to the database directory
    pub path: PathBuf,

    /// Whether to create the database if it doesn't exist
    pub create_if_missing: bool,

    /// Maximum size of the write buffer (memtable) in bytes
    pub write_buffer_size: usize,

    /// Maximum number of write buffers
    pub max_write_buffer_number: i32,

    /// Number of background compaction threads
    pub max_background_jobs: i32,

    /// Enable compression
    pub enable_compression: bool,

    /// Enable bloom filters
    pub enable_bloom_filter: bool,

    /// Bloom filter bits per key
    pub bloom_filter_bits_per_key: i32,
}

impl StorageOptions {
    /// Create options for a new database at the given path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create options optimized for development/testing
    pub fn for_testing<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_compression: false,
            enable_bloom_filter: true,
            bloom_filter_bits_per_key: 10,
        }
    }

    /// Create options optimized for production
    pub fn for_production<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_compression: true,
            enable_bloom_filter: true,
            bloom_filter_bits_per_key: 10,
        }
    }
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/mnemograph"),
            create_if_missing: true,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_compression: true,
            enable_bloom_filter: true,
            bloom_filter_bits_per_key: 10,
        }
    }
}
