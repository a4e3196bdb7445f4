use std::sync::OnceLock;

use crate::error::{Error, LifetimeError, Result};

// Process-wide settings
//
// Most operations return `Result` and leave policy to the caller. The
// exception is code running inside `Drop` (owner guards held by
// descriptors, views and aliases): a lifetime violation found there has no
// caller to return to, so `LifetimePolicy` decides between aborting the
// current thread with a panic and logging the defect.

pub const ENV_LIFETIME_POLICY: &str = "NDBRIDGE_LIFETIME_POLICY";
pub const ENV_LOG_REJECTIONS: &str = "NDBRIDGE_LOG_REJECTIONS";

/// What to do with a lifetime violation that cannot be returned as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimePolicy {
    Panic,
    Report,
}

impl LifetimePolicy {
    /// Apply the policy to a violation detected in a drop path.
    pub fn handle(self, err: LifetimeError) {
        match self {
            LifetimePolicy::Panic => panic!("ownership protocol violated: {err}"),
            LifetimePolicy::Report => {
                tracing::error!(error = %err, "ownership protocol violated");
            }
        }
    }
}

impl Default for LifetimePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LifetimePolicy::Panic
        } else {
            LifetimePolicy::Report
        }
    }
}

impl std::str::FromStr for LifetimePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(LifetimePolicy::Panic),
            "report" => Ok(LifetimePolicy::Report),
            other => Err(Error::Config(format!(
                "{ENV_LIFETIME_POLICY}: expected `panic` or `report`, got `{other}`"
            ))),
        }
    }
}

/// Settings shared by every boundary call in the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Handling of lifetime violations found while dropping a claim.
    pub lifetime_policy: LifetimePolicy,
    /// Log every rejected array at debug level.
    pub log_rejections: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            lifetime_policy: LifetimePolicy::default(),
            log_rejections: true,
        }
    }
}

impl BridgeConfig {
    pub fn with_lifetime_policy(mut self, policy: LifetimePolicy) -> Self {
        self.lifetime_policy = policy;
        self
    }

    pub fn with_log_rejections(mut self, log: bool) -> Self {
        self.log_rejections = log;
        self
    }

    /// Defaults overridden by `NDBRIDGE_LIFETIME_POLICY` and `NDBRIDGE_LOG_REJECTIONS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(policy) = lookup(ENV_LIFETIME_POLICY) {
            config.lifetime_policy = policy.parse()?;
        }
        if let Some(flag) = lookup(ENV_LOG_REJECTIONS) {
            config.log_rejections = parse_flag(ENV_LOG_REJECTIONS, &flag)?;
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got `{other}`"))),
    }
}

static GLOBAL: OnceLock<BridgeConfig> = OnceLock::new();

/// Install the process-wide config. The first call wins; later calls get
/// their config handed back.
pub fn install(config: BridgeConfig) -> std::result::Result<(), BridgeConfig> {
    GLOBAL.set(config)
}

/// The installed config, or one read from the environment on first use.
pub fn global() -> &'static BridgeConfig {
    GLOBAL.get_or_init(|| {
        BridgeConfig::from_env().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring environment, using default config");
            BridgeConfig::default()
        })
    })
}
