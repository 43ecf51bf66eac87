//! Kill switch: emergency stop for all trading.
//!
//! Three activation channels with identical effect: presence of a sentinel
//! file, an authenticated API call, a direct in-process call. Activation
//! writes the sentinel file (best-effort) so restarts come up halted; the
//! file's existence is the ground truth at process start and is re-checked
//! on every `is_active` read.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

/// Kill-switch status for the operator surface. No secrets, no paths.
#[derive(Debug, Clone, Serialize)]
pub struct KillSwitchStatus {
    pub is_active: bool,
    pub reason: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub kill_file_exists: bool,
}

#[derive(Debug)]
struct KillState {
    active: bool,
    reason: String,
    activated_at: Option<DateTime<Utc>>,
}

/// File-and-API-activated global halt.
#[derive(Debug)]
pub struct KillSwitch {
    kill_file: PathBuf,
    state: RwLock<KillState>,
}

impl KillSwitch {
    /// Creates a kill switch backed by the given sentinel path.
    ///
    /// A pre-existing sentinel file activates the switch immediately.
    #[must_use]
    pub fn new(kill_file: impl Into<PathBuf>) -> Self {
        let kill_file = kill_file.into();
        let pre_existing = kill_file.exists();

        let state = if pre_existing {
            error!(file = %kill_file.display(), "Kill switch active on startup: sentinel file exists");
            KillState {
                active: true,
                reason: "kill switch file found on startup".to_string(),
                activated_at: Some(Utc::now()),
            }
        } else {
            info!(file = %kill_file.display(), "KillSwitch initialized");
            KillState {
                active: false,
                reason: String::new(),
                activated_at: None,
            }
        };

        Self {
            kill_file,
            state: RwLock::new(state),
        }
    }

    /// Activates the switch and writes the sentinel file (best-effort).
    ///
    /// Activating an already-active switch keeps the original activation
    /// timestamp.
    pub fn activate(&self, reason: &str) {
        let mut state = self.state.write();

        if !state.active {
            state.active = true;
            state.activated_at = Some(Utc::now());
            state.reason = reason.to_string();
        }
        let activated_at = state.activated_at.unwrap_or_else(Utc::now);
        drop(state);

        let contents = format!(
            "KILL SWITCH ACTIVATED\nTime: {}\nReason: {}\n",
            activated_at.to_rfc3339(),
            reason
        );
        if let Err(e) = std::fs::write(&self.kill_file, contents) {
            error!(error = %e, "Failed to write kill switch file");
        }

        error!(reason, "KILL SWITCH ACTIVATED");
    }

    /// Deactivates the switch and removes the sentinel file (best-effort).
    pub fn deactivate(&self, reason: &str) {
        {
            let mut state = self.state.write();
            state.active = false;
            state.reason.clear();
            state.activated_at = None;
        }

        if self.kill_file.exists() {
            if let Err(e) = std::fs::remove_file(&self.kill_file) {
                error!(error = %e, "Failed to remove kill switch file");
            }
        }

        info!(reason, "Kill switch deactivated");
    }

    /// Whether the switch is active.
    ///
    /// Also checks the file system: a sentinel file appearing at runtime
    /// activates the switch even without an API call.
    #[must_use]
    pub fn is_active(&self) -> bool {
        if self.kill_file.exists() {
            let mut state = self.state.write();
            if !state.active {
                state.active = true;
                state.reason = "kill switch file detected".to_string();
                state.activated_at = Some(Utc::now());
                error!("Kill switch file detected at runtime");
            }
            return true;
        }
        self.state.read().active
    }

    /// Sentinel file path.
    #[must_use]
    pub fn kill_file(&self) -> &Path {
        &self.kill_file
    }

    /// Full status block.
    #[must_use]
    pub fn status(&self) -> KillSwitchStatus {
        let is_active = self.is_active();
        let state = self.state.read();
        KillSwitchStatus {
            is_active,
            reason: is_active.then(|| state.reason.clone()),
            activated_at: state.activated_at,
            kill_file_exists: self.kill_file.exists(),
        }
    }
}

/// Validates a kill-switch API token.
///
/// Fail-closed: with no token configured (or an empty one), every call
/// returns false regardless of input. The comparison is constant-time to
/// prevent timing attacks, and neither value is ever logged.
#[must_use]
pub fn validate_token(provided: &str, configured: Option<&SecretString>) -> bool {
    let Some(expected) = configured else {
        warn!("Kill switch token not configured, rejecting request");
        return false;
    };
    let expected = expected.expose_secret();
    if expected.is_empty() {
        warn!("Kill switch token not configured, rejecting request");
        return false;
    }

    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
