#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the integration tests. The mock collaborators live in
//! `kbc-test-utils`.

use dotenvy::dotenv;
use kbc::config::TrackerSettings;
use std::fs;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        tracing_subscriber::fmt::init();
    });
}

/// Tracker settings that never sleep between retries.
pub fn fast_tracker_settings() -> TrackerSettings {
    TrackerSettings {
        retry_backoff: Duration::ZERO,
        ..TrackerSettings::default()
    }
}

/// A minimal JSON-schema elicitation template.
pub const TEMPLATE: &str = r#"{"custom_id": "{{ subject_name }}", "method": "POST", "url": "/v1/chat/completions", "body": {"model": "{{ model }}", "messages": [{"role": "user", "content": "List facts about {{ subject_name }} as JSON under the key facts."}]}}"#;

/// Writes `names` as template files into `dir`.
pub fn write_templates(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), TEMPLATE).unwrap();
    }
}
