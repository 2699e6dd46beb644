use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CorrelateError;
use crate::types::STATUS_BOUNCED;

/// Postfix stage whose log line identifies the originating client.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Daemon {
    #[default]
    Smtpd,
    Pickup,
    Cleanup,
    OpenDkim,
    Qmgr
}

impl Daemon {
    pub const ALL: [Daemon; 5] =
        [Self::Smtpd, Self::Pickup, Self::Cleanup, Self::OpenDkim, Self::Qmgr];

    pub fn name(self) -> &'static str {
        match self {
            Self::Smtpd => "smtpd",
            Self::Pickup => "pickup",
            Self::Cleanup => "cleanup",
            Self::OpenDkim => "opendkim",
            Self::Qmgr => "qmgr"
        }
    }

    /// Program name as written by syslog in front of `[pid]`.
    pub fn literal(self) -> &'static str {
        match self {
            Self::Smtpd => "postfix/smtpd",
            Self::Pickup => "postfix/pickup",
            Self::Cleanup => "postfix/cleanup",
            Self::OpenDkim => "opendkim",
            Self::Qmgr => "postfix/qmgr"
        }
    }

    fn stage_alias(self) -> &'static str {
        match self {
            Self::Smtpd => "smtpd-inbound",
            Self::Pickup => "pickup-local",
            Self::Cleanup => "cleanup-stage",
            Self::OpenDkim => "signing-stage",
            Self::Qmgr => "queue-manager-stage"
        }
    }

    fn allowed_names() -> String {
        Self::ALL.iter().map(|daemon| daemon.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Daemon {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Daemon {
    type Err = CorrelateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|daemon| {
                wanted == daemon.name()
                    || wanted == daemon.literal()
                    || wanted == daemon.stage_alias()
            })
            .ok_or_else(|| {
                CorrelateError::invalid(format!(
                    "unhandled daemon: {value} (must be one of: {})",
                    Self::allowed_names()
                ))
            })
    }
}

impl TryFrom<String> for Daemon {
    type Error = CorrelateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Daemon> for String {
    fn from(daemon: Daemon) -> Self {
        daemon.name().to_string()
    }
}

/// Delivery status token compared against `status=` in delivery lines.
///
/// Kept open-ended (postfix may emit tokens beyond sent/deferred/bounced/
/// expired) but restricted to the lowercase word shape postfix writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetStatus(String);

impl TargetStatus {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TargetStatus {
    fn default() -> Self {
        Self(STATUS_BOUNCED.to_string())
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetStatus {
    type Err = CorrelateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let token = value.trim().to_ascii_lowercase();
        if token.is_empty() {
            return Err(CorrelateError::invalid("target status is empty"));
        }
        if !token.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(CorrelateError::invalid(format!(
                "malformed target status: {value} (expected a word such as sent, deferred, bounced, expired)"
            )));
        }
        Ok(Self(token))
    }
}

impl TryFrom<String> for TargetStatus {
    type Error = CorrelateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetStatus> for String {
    fn from(status: TargetStatus) -> Self {
        status.0
    }
}

/// Whether ids without a target-status delivery line still get a record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RecordPolicy {
    /// Build a record for every id; only the reduction filters by status.
    #[default]
    All,
    /// Skip ids whose lines never carry `status=<target>`.
    TargetOnly
}

impl FromStr for RecordPolicy {
    type Err = CorrelateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "target-only" | "target_only" => Ok(Self::TargetOnly),
            other => Err(CorrelateError::invalid(format!(
                "unknown record policy: {other} (must be one of: all, target-only)"
            )))
        }
    }
}

pub const DEFAULT_SERVER: &str = r"\S+";
pub const DEFAULT_SEARCH: &str = "localhost";

/// Immutable run configuration handed once to [`crate::correlate`].
///
/// `server` and `search` are regex fragments spliced into the line grammar;
/// pass them through [`regex::escape`] for literal matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelateConfig {
    pub daemon: Daemon,
    pub server: String,
    pub search: String,
    pub target_status: TargetStatus,
    pub offset: usize,
    pub limit: usize,
    pub record_policy: RecordPolicy
}

impl Default for CorrelateConfig {
    fn default() -> Self {
        Self {
            daemon: Daemon::default(),
            server: DEFAULT_SERVER.to_string(),
            search: DEFAULT_SEARCH.to_string(),
            target_status: TargetStatus::default(),
            offset: 0,
            limit: 0,
            record_policy: RecordPolicy::default()
        }
    }
}
