use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub redis_url: Option<String>,
    pub lock_wait_timeout_ms: u64,
    pub lock_hold_timeout_ms: u64,
    /// Upper bound on one store round trip and on a whole check-and-write.
    pub commit_timeout_ms: u64,
    pub clinic_utc_offset_minutes: i32,
    pub slot_min_minutes: i64,
    pub slot_max_minutes: i64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            redis_url: None,
            lock_wait_timeout_ms: 5_000,
            lock_hold_timeout_ms: 5_000,
            commit_timeout_ms: 3_000,
            clinic_utc_offset_minutes: 0,
            slot_min_minutes: 15,
            slot_max_minutes: 120,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using in-memory appointment store");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            lock_wait_timeout_ms: parse_or_default(
                "SCHEDULING_LOCK_WAIT_MS",
                env::var("SCHEDULING_LOCK_WAIT_MS").ok(),
                defaults.lock_wait_timeout_ms,
            ),
            lock_hold_timeout_ms: parse_or_default(
                "SCHEDULING_LOCK_HOLD_MS",
                env::var("SCHEDULING_LOCK_HOLD_MS").ok(),
                defaults.lock_hold_timeout_ms,
            ),
            commit_timeout_ms: parse_or_default(
                "SCHEDULING_COMMIT_TIMEOUT_MS",
                env::var("SCHEDULING_COMMIT_TIMEOUT_MS").ok(),
                defaults.commit_timeout_ms,
            ),
            clinic_utc_offset_minutes: parse_or_default(
                "CLINIC_UTC_OFFSET_MINUTES",
                env::var("CLINIC_UTC_OFFSET_MINUTES").ok(),
                defaults.clinic_utc_offset_minutes,
            ),
            slot_min_minutes: parse_or_default(
                "SLOT_MIN_MINUTES",
                env::var("SLOT_MIN_MINUTES").ok(),
                defaults.slot_min_minutes,
            ),
            slot_max_minutes: parse_or_default(
                "SLOT_MAX_MINUTES",
                env::var("SLOT_MAX_MINUTES").ok(),
                defaults.slot_max_minutes,
            ),
            port: parse_or_default("PORT", env::var("PORT").ok(), defaults.port),
        };

        if config.redis_url.is_none() {
            warn!("REDIS_URL not set, falling back to in-process scheduling locks");
        }

        if config.slot_min_minutes <= 0 || config.slot_min_minutes > config.slot_max_minutes {
            warn!(
                "Invalid slot duration bounds {}..={}, using defaults",
                config.slot_min_minutes, config.slot_max_minutes
            );
            return Self {
                slot_min_minutes: defaults.slot_min_minutes,
                slot_max_minutes: defaults.slot_max_minutes,
                ..config
            };
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn is_redis_configured(&self) -> bool {
        self.redis_url.is_some()
    }
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default", name, value);
            default
        }),
    }
}
