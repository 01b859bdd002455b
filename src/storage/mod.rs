//! Persistence layer.
//!
//! Saves and loads the running gain/loss totals of each portfolio to/from a
//! JSON file so they survive restarts. Previous totals are not stored: the
//! first cycle after a restart establishes a fresh baseline.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "coinwatch_state.json";

/// Durable part of the portfolio cycle state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    /// Portfolio name → cumulative gain/loss.
    pub accumulators: BTreeMap<String, Decimal>,
    pub saved_at: Option<DateTime<Utc>>,
}

/// Save monitor state to a JSON file.
pub fn save_state(state: &MonitorState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let mut state = state.clone();
    state.saved_at = Some(Utc::now());

    let json = serde_json::to_string_pretty(&state)
        .context("Failed to serialise monitor state")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(path, portfolios = state.accumulators.len(), "State saved");
    Ok(())
}

/// Load monitor state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<MonitorState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let state: MonitorState = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        portfolios = state.accumulators.len(),
        saved_at = ?state.saved_at,
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
