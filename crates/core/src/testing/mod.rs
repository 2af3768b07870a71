//! Testing utilities and mock implementations.
//!
//! Mocks for every service seam, so the orchestrator can be exercised end to
//! end without GCS, a metadata server or the external tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use finpipe_core::testing::{fixtures, MockObjectStore, MockTokenProvider, MockToolRunner};
//!
//! let store = MockObjectStore::new();
//! fixtures::seed_inputs(&store, "in-bkt", "in/", "demo").await;
//!
//! let runner = MockToolRunner::new();
//! runner.fail_tool("recon", 1, "bad row").await;
//! ```

mod mock_object_store;
mod mock_token_provider;
mod mock_tool_runner;

pub use mock_object_store::{MockObjectStore, StoreCall, StoreOp};
pub use mock_token_provider::MockTokenProvider;
pub use mock_tool_runner::MockToolRunner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use super::MockObjectStore;
    use crate::config::Config;

    pub const INPUT_BUCKET: &str = "in-bkt";
    pub const OUTPUT_BUCKET: &str = "out-bkt";

    pub const LEFT_CSV: &str = "id,amount\n1,10.00\n2,20.00\n";
    pub const RIGHT_CSV: &str = "id,amount\n1,10.00\n2,21.00\n";

    /// Config with both buckets set and scratch space under `work_root`.
    pub fn test_config(work_root: &Path) -> Config {
        let mut config = Config::default();
        config.storage.input_bucket = INPUT_BUCKET.to_string();
        config.storage.output_bucket = OUTPUT_BUCKET.to_string();
        config.pipeline.work_root = Some(work_root.to_path_buf());
        config
    }

    /// Direct-shape notification body.
    pub fn notification_body(bucket: &str, name: &str) -> Vec<u8> {
        serde_json::json!({ "bucket": bucket, "name": name })
            .to_string()
            .into_bytes()
    }

    /// Stores `left.csv` and `right.csv` for `run_id` under `prefix`.
    pub async fn seed_inputs(store: &MockObjectStore, bucket: &str, prefix: &str, run_id: &str) {
        store
            .put_object(bucket, &format!("{prefix}{run_id}/left.csv"), LEFT_CSV)
            .await;
        store
            .put_object(bucket, &format!("{prefix}{run_id}/right.csv"), RIGHT_CSV)
            .await;
    }
}
