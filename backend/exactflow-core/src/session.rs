// src/session.rs

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::collaborators::IdentityProvider;
use crate::error::{ConfigError, ReconcileError};

pub const MIN_OFFSET_MINUTES: i32 = -720;
pub const MAX_OFFSET_MINUTES: i32 = 840;

/// Minutes east of UTC, within [-720, 840].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct UtcOffsetMinutes(i32);

impl UtcOffsetMinutes {
    pub const UTC: UtcOffsetMinutes = UtcOffsetMinutes(0);

    pub fn new(minutes: i32) -> Result<Self, ConfigError> {
        if (MIN_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
            Ok(UtcOffsetMinutes(minutes))
        } else {
            Err(ConfigError::OffsetOutOfRange(minutes))
        }
    }

    pub fn minutes(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for UtcOffsetMinutes {
    type Error = ConfigError;

    fn try_from(minutes: i32) -> Result<Self, Self::Error> {
        UtcOffsetMinutes::new(minutes)
    }
}

impl From<UtcOffsetMinutes> for i32 {
    fn from(offset: UtcOffsetMinutes) -> Self {
        offset.0
    }
}

impl fmt::Display for UtcOffsetMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The local machine's current offset from UTC, in minutes.
pub fn ambient_offset_minutes() -> i32 {
    Local::now().offset().local_minus_utc() / 60
}

/// Picks the offset used for every write in a run.
///
/// A zero ambient offset can't be told apart from "offset not available", so
/// it falls back to `default`, as does an ambient value outside the valid range.
pub fn resolve_offset(ambient: i32, default: UtcOffsetMinutes) -> UtcOffsetMinutes {
    if ambient == 0 {
        return default;
    }
    match UtcOffsetMinutes::new(ambient) {
        Ok(offset) => offset,
        Err(e) => {
            warn!("Ambient offset rejected ({}); using default {}", e, default);
            default
        }
    }
}

/// Opaque identifier of the employee every write targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        EmployeeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub identity: EmployeeId,
    pub offset: UtcOffsetMinutes,
}

impl SessionContext {
    /// Fetches the acting identity and fixes the offset for the run.
    pub async fn resolve(
        identity_provider: &dyn IdentityProvider,
        ambient_offset: i32,
        default_offset: UtcOffsetMinutes,
    ) -> Result<Self, ReconcileError> {
        let identity = identity_provider
            .fetch_identity()
            .await
            .map_err(|e| ReconcileError::IdentityUnavailable(e.diagnostic()))?;

        if identity.as_str().trim().is_empty() {
            return Err(ReconcileError::IdentityUnavailable(
                "identity provider returned an empty id".to_string(),
            ));
        }

        let offset = resolve_offset(ambient_offset, default_offset);
        info!("Session resolved: employee={}, offset={}", identity, offset);
        Ok(Self { identity, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(m: i32) -> UtcOffsetMinutes {
        UtcOffsetMinutes::new(m).unwrap()
    }

    #[test]
    fn test_offset_range_bounds() {
        assert!(UtcOffsetMinutes::new(-720).is_ok());
        assert!(UtcOffsetMinutes::new(840).is_ok());
        assert!(matches!(
            UtcOffsetMinutes::new(841),
            Err(ConfigError::OffsetOutOfRange(841))
        ));
        assert!(UtcOffsetMinutes::new(-721).is_err());
    }

    #[test]
    fn test_resolve_offset_prefers_nonzero_ambient() {
        assert_eq!(resolve_offset(180, offset(120)), offset(180));
        assert_eq!(resolve_offset(-300, offset(120)), offset(-300));
    }

    #[test]
    fn test_resolve_offset_zero_ambient_uses_default() {
        assert_eq!(resolve_offset(0, offset(120)), offset(120));
        assert_eq!(resolve_offset(0, UtcOffsetMinutes::UTC), UtcOffsetMinutes::UTC);
    }

    #[test]
    fn test_resolve_offset_out_of_range_ambient_uses_default() {
        assert_eq!(resolve_offset(5000, offset(60)), offset(60));
    }

    #[test]
    fn test_offset_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<UtcOffsetMinutes>("120").is_ok());
        assert!(serde_json::from_str::<UtcOffsetMinutes>("9999").is_err());
        assert_eq!(serde_json::to_string(&offset(-60)).unwrap(), "-60");
    }
}
