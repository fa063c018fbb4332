//! Run configuration: required CI environment plus optional TOML settings.
//!
//! Everything is resolved once at startup into [`ProvisionConfig`] and passed down
//! explicitly; no other module reads the environment.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::poll::WaitPolicy;
use crate::core::tags::stack_tags;
use crate::core::types::{OnFailure, TagSet};

/// Settings file looked up in the working directory when `--config` is not given.
pub const DEFAULT_SETTINGS_PATH: &str = ".cfn-provision.toml";
pub const DEFAULT_TEMPLATE_PATH: &str = "./aws/cloudformation/cloudformation.template";

pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_KEY";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_KEYID";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_BILLING_ENV: &str = "BILLING_ENV";
pub const ENV_STACK_NAME: &str = "STACK_NAME";
pub const ENV_TEAM: &str = "TEAM";

const REQUIRED_ENV: [&str; 6] = [
    ENV_SECRET_ACCESS_KEY,
    ENV_ACCESS_KEY_ID,
    ENV_REGION,
    ENV_BILLING_ENV,
    ENV_STACK_NAME,
    ENV_TEAM,
];

/// Tunables for a provisioning run (TOML).
///
/// Missing fields default to the values the CI pipeline has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisionSettings {
    /// Template document passed verbatim to the provider.
    pub template_path: PathBuf,

    /// Poll interval while a new stack is being created.
    pub create_poll_interval_secs: u64,

    /// Poll interval around stack updates.
    pub update_poll_interval_secs: u64,

    /// Poll interval around tag updates.
    pub tag_poll_interval_secs: u64,

    /// Upper bound for any single convergence wait.
    pub max_wait_secs: u64,

    /// Provider behavior when creation fails.
    pub on_failure: OnFailure,

    /// Treat update errors other than "no updates" as fatal instead of logging them.
    pub strict_update: bool,

    /// Re-tag a stack whose update rolled back.
    pub tag_after_rollback: bool,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            create_poll_interval_secs: 60,
            update_poll_interval_secs: 10,
            tag_poll_interval_secs: 10,
            max_wait_secs: 60 * 60,
            on_failure: OnFailure::DoNothing,
            strict_update: false,
            tag_after_rollback: true,
        }
    }
}

impl ProvisionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.template_path.as_os_str().is_empty() {
            return Err(anyhow!("template_path must not be empty"));
        }
        for (name, value) in [
            ("create_poll_interval_secs", self.create_poll_interval_secs),
            ("update_poll_interval_secs", self.update_poll_interval_secs),
            ("tag_poll_interval_secs", self.tag_poll_interval_secs),
            ("max_wait_secs", self.max_wait_secs),
        ] {
            if value == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        Ok(())
    }

    pub fn create_wait(&self) -> WaitPolicy {
        self.wait_policy(self.create_poll_interval_secs)
    }

    pub fn update_wait(&self) -> WaitPolicy {
        self.wait_policy(self.update_poll_interval_secs)
    }

    pub fn tag_wait(&self) -> WaitPolicy {
        self.wait_policy(self.tag_poll_interval_secs)
    }

    fn wait_policy(&self, interval_secs: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(self.max_wait_secs),
        )
    }
}

/// Static provider credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// The stack this run manages and the values its tags are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTarget {
    pub stack_name: String,
    pub region: String,
    pub billing_env: String,
    pub team: String,
}

impl StackTarget {
    pub fn tags(&self) -> TagSet {
        stack_tags(&self.stack_name, &self.billing_env, &self.team)
    }
}

/// Values supplied by the CI environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEnv {
    pub target: StackTarget,
    pub credentials: AwsCredentials,
}

impl StackEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve every required variable through `lookup`.
    ///
    /// Empty values count as missing. All missing names are reported together.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let mut missing = Vec::new();
        let mut get = |key: &'static str| -> String {
            match lookup(key).filter(|value| !value.trim().is_empty()) {
                Some(value) => value,
                None => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let secret_access_key = get(ENV_SECRET_ACCESS_KEY);
        let access_key_id = get(ENV_ACCESS_KEY_ID);
        let region = get(ENV_REGION);
        let billing_env = get(ENV_BILLING_ENV);
        let stack_name = get(ENV_STACK_NAME);
        let team = get(ENV_TEAM);

        if !missing.is_empty() {
            return Err(anyhow!(
                "missing required environment variables: {} (expected {})",
                missing.join(", "),
                REQUIRED_ENV.join(", ")
            ));
        }

        Ok(Self {
            target: StackTarget {
                stack_name,
                region,
                billing_env,
                team,
            },
            credentials: AwsCredentials {
                access_key_id,
                secret_access_key,
            },
        })
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub target: StackTarget,
    pub credentials: AwsCredentials,
    pub settings: ProvisionSettings,
}

impl ProvisionConfig {
    pub fn new(env: StackEnv, settings: ProvisionSettings) -> Self {
        Self {
            target: env.target,
            credentials: env.credentials,
            settings,
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `ProvisionSettings::default()`.
pub fn load_settings(path: &Path) -> Result<ProvisionSettings> {
    if !path.exists() {
        debug!(path = %path.display(), "settings file missing, using defaults");
        let settings = ProvisionSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: ProvisionSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    debug!(path = %path.display(), ?settings, "settings loaded");
    Ok(settings)
}
