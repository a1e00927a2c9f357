use crate::services::attribution::AttributionPolicy;
use crate::services::store::DEFAULT_RANKING_LIMIT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seconds after which a command reply and its trigger are deleted. `0` keeps them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyExpiry {
    pub my_invites_secs: u64,
    pub leaderboard_secs: u64,
    pub who_added_secs: u64,
    pub denied_secs: u64,
}

impl Default for ReplyExpiry {
    fn default() -> Self {
        Self {
            my_invites_secs: 15,
            leaderboard_secs: 30,
            who_added_secs: 30,
            denied_secs: 5,
        }
    }
}

fn expiry(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl ReplyExpiry {
    pub fn my_invites(&self) -> Option<Duration> {
        expiry(self.my_invites_secs)
    }

    pub fn leaderboard(&self) -> Option<Duration> {
        expiry(self.leaderboard_secs)
    }

    pub fn who_added(&self) -> Option<Duration> {
        expiry(self.who_added_secs)
    }

    pub fn denied(&self) -> Option<Duration> {
        expiry(self.denied_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub attribution: AttributionPolicy,
    /// Take an invite back off the inviter's count when the invitee leaves.
    pub reverse_on_leave: bool,
    pub leaderboard_limit: u64,
    pub expiry: ReplyExpiry,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            attribution: AttributionPolicy::default(),
            reverse_on_leave: false,
            leaderboard_limit: DEFAULT_RANKING_LIMIT,
            expiry: ReplyExpiry::default(),
        }
    }
}

impl TrackingSettings {
    /// Parses a JSON expiry override such as `{"leaderboard_secs": 60}`. Missing fields
    /// keep their defaults.
    pub fn with_expiry_json(mut self, json: &str) -> Result<Self, serde_json::Error> {
        self.expiry = serde_json::from_str(json)?;
        Ok(self)
    }
}
