//! Granula Test & Validation Infrastructure
//!
//! Seeded synthetic datasets, property-based suites over the engine and
//! end-to-end search scenarios that exercise several modules together.

pub mod end_to_end;
pub mod fixtures;
pub mod proptest_search;
pub mod search_scenarios;

pub use fixtures::{bucket_hierarchy, SyntheticDataset};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a test-friendly `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
