//! Consent audit log, one JSON object per line.
//!
//! ```text
//! {"category":"marketing","value":true,"timestamp":1760000000,"ip":"203.0.113.9"}
//! ```
//!
//! Appends go through a mutex so concurrent requests never interleave lines.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::AuditLogConfig;
use crate::error::AppError;

/// One recorded consent decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub category: String,
    pub value: bool,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub ip: Option<String>,
}

pub struct ConsentLog {
    path: PathBuf,
    anonymize_ip: bool,
    write_lock: Mutex<()>,
}

impl ConsentLog {
    pub fn new(path: impl Into<PathBuf>, anonymize_ip: bool) -> Self {
        Self {
            path: path.into(),
            anonymize_ip,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AuditLogConfig) -> Self {
        Self::new(&config.path, config.anonymize_ip)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build an entry stamped with the current time.
    pub fn entry(&self, category: &str, value: bool, ip: Option<IpAddr>) -> AuditEntry {
        AuditEntry {
            category: category.to_string(),
            value,
            timestamp: chrono::Utc::now().timestamp(),
            ip: ip.map(|ip| self.format_ip(ip)),
        }
    }

    fn format_ip(&self, ip: IpAddr) -> String {
        if !self.anonymize_ip {
            return ip.to_string();
        }
        let digest = Sha256::digest(ip.to_string().as_bytes());
        hex::encode(&digest[..8])
    }

    pub fn append(&self, entry: &AuditEntry) -> Result<(), AppError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| AppError::Audit(format!("serialise entry: {e}")))?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Audit("audit log lock poisoned".into()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Audit(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::Audit(format!("cannot open {}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .map_err(|e| AppError::Audit(format!("cannot write {}: {e}", self.path.display())))
    }

    /// All readable entries, oldest first. Blank and malformed lines are
    /// skipped; a missing file is an empty log.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, AppError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Audit(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        Ok(data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("skipping malformed audit line: {e}");
                    None
                }
            })
            .collect())
    }
}
