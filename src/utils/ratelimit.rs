use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use tokio::sync::Mutex;

lazy_static! {
    static ref CHART_COOLDOWNS: Mutex<Cooldowns> = Mutex::new(Cooldowns::new(COOLDOWN_SECONDS));
}

/// Chart rendering is CPU-bound, so each user gets one request per window
pub const COOLDOWN_SECONDS: u64 = 5;

/// Per-key cooldown tracker
pub struct Cooldowns {
    window_secs: u64,
    /// Key: (user id, command), value: unix seconds of the last accepted use
    last_use: HashMap<(u64, String), u64>,
    /// Last time a key was told to wait, so each cooldown warns only once
    last_warning: HashMap<(u64, String), u64>,
}

/// A rejected attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownActive {
    pub remaining_secs: u64,
    /// true on the first rejection within this cooldown window
    pub should_warn: bool,
}

impl Cooldowns {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            last_use: HashMap::new(),
            last_warning: HashMap::new(),
        }
    }

    /// Accept and record the attempt, or report how long is left
    pub fn check(&mut self, user_id: u64, command: &str, now: u64) -> Result<(), CooldownActive> {
        let key = (user_id, command.to_string());
        self.prune(now);

        if let Some(&last) = self.last_use.get(&key) {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.window_secs {
                let should_warn = self
                    .last_warning
                    .get(&key)
                    .map_or(true, |&warned| warned < last);
                if should_warn {
                    self.last_warning.insert(key, now);
                }
                return Err(CooldownActive {
                    remaining_secs: self.window_secs - elapsed,
                    should_warn,
                });
            }
        }

        self.last_use.insert(key, now);
        Ok(())
    }

    /// Forget keys whose window has passed
    fn prune(&mut self, now: u64) {
        let window = self.window_secs;
        self.last_use.retain(|_, last| now.saturating_sub(*last) < window);
        self.last_warning.retain(|_, warned| now.saturating_sub(*warned) < window);
    }
}

/// Check the shared chart cooldown for `user_id`
pub async fn check_cooldown(user_id: u64, command: &str) -> Result<(), CooldownActive> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    CHART_COOLDOWNS.lock().await.check(user_id, command, now)
}
