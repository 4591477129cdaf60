//! Engine configuration
//!
//! Peer compatibility shims are data, not code: which client versions omit
//! the content `creator` attribute, and which capability nodes identify
//! clients with known limitations, are both listed in [`QuirkRules`] and can
//! be overridden from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capabilities::{
    QUIRK_ANDROID_GTALK_CLIENT, QUIRK_GOOGLE_WEBMAIL_CLIENT, QUIRK_OMITS_CONTENT_CREATORS,
};
use crate::errors::{JingleError, Result};
use crate::protocol::Dialect;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quirks: QuirkRules,
    pub session: SessionDefaults,
    /// Default level for [`crate::logging::init_logging`]; `RUST_LOG` wins
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quirks: QuirkRules::default(),
            session: SessionDefaults::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JingleError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        crate::logging::parse_log_level(&self.log_level)?;
        self.quirks.validate()
    }
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Defaults applied to newly created sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Dialect for locally initiated sessions
    pub default_dialect: Dialect,
    pub local_hold: bool,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            default_dialect: Dialect::V1,
            local_hold: false,
        }
    }
}

/// Quirks the resolver knows how to synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnownQuirk {
    OmitsContentCreators,
    GoogleWebmailClient,
    AndroidGtalkClient,
}

impl KnownQuirk {
    /// Capability token carrying this quirk
    pub fn token(&self) -> &'static str {
        match self {
            KnownQuirk::OmitsContentCreators => QUIRK_OMITS_CONTENT_CREATORS,
            KnownQuirk::GoogleWebmailClient => QUIRK_GOOGLE_WEBMAIL_CLIENT,
            KnownQuirk::AndroidGtalkClient => QUIRK_ANDROID_GTALK_CLIENT,
        }
    }
}

/// Client names whose numeric suffix falls in `min..=max`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRangeRule {
    pub name_prefix: String,
    pub min: u32,
    pub max: u32,
}

impl VersionRangeRule {
    /// True if `client_name` is `name_prefix` followed by a number in range
    pub fn matches(&self, client_name: &str) -> bool {
        let Some(suffix) = client_name.strip_prefix(self.name_prefix.as_str()) else {
            return false;
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match suffix.parse::<u32>() {
            Ok(version) => (self.min..=self.max).contains(&version),
            Err(_) => false,
        }
    }
}

/// Capability node identifying a client with a known quirk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeQuirkRule {
    pub node: String,
    pub quirk: KnownQuirk,
}

impl NodeQuirkRule {
    /// Matches the bare node or `node#ver`
    pub fn matches(&self, node: &str) -> bool {
        let base = node.split_once('#').map_or(node, |(base, _)| base);
        base == self.node
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuirkRules {
    pub creator_omission: Vec<VersionRangeRule>,
    pub node_quirks: Vec<NodeQuirkRule>,
}

impl Default for QuirkRules {
    fn default() -> Self {
        Self {
            creator_omission: vec![VersionRangeRule {
                name_prefix: "Telepathy Gabble 0.7.".to_string(),
                min: 16,
                max: 28,
            }],
            node_quirks: vec![
                NodeQuirkRule {
                    node: "http://www.android.com/gtalk/client/caps".to_string(),
                    quirk: KnownQuirk::AndroidGtalkClient,
                },
                NodeQuirkRule {
                    node: "http://mail.google.com/xmpp/client/caps".to_string(),
                    quirk: KnownQuirk::GoogleWebmailClient,
                },
            ],
        }
    }
}

impl QuirkRules {
    pub fn validate(&self) -> Result<()> {
        for rule in &self.creator_omission {
            if rule.name_prefix.is_empty() {
                return Err(JingleError::config("creator_omission rule has an empty name_prefix"));
            }
            if rule.min > rule.max {
                return Err(JingleError::config(format!(
                    "creator_omission rule '{}' has min {} > max {}",
                    rule.name_prefix, rule.min, rule.max
                )));
            }
        }
        for rule in &self.node_quirks {
            if rule.node.is_empty() {
                return Err(JingleError::config("node_quirks rule has an empty node"));
            }
        }
        Ok(())
    }
}
