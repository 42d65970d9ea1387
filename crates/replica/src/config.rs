//! Replica configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a [`ReplicaConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML source did not parse or did not match the schema.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A field parsed but holds an unusable value.
	#[error("invalid value for `{field}`: {reason}")]
	Invalid {
		/// Name of the offending field.
		field: &'static str,
		/// What is wrong with it.
		reason: String,
	},
}

/// Tunables shared by every document of a [`ReplicaDirectory`](crate::ReplicaDirectory).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplicaConfig {
	/// Number of operations each record keeps for rebasing late edits.
	pub log_retention: usize,
	/// Compare the external document with the replica after every sync.
	pub consistency_checks: bool,
	/// Name of the process-wide materialization lane.
	pub materialize_lane: String,
}

impl Default for ReplicaConfig {
	fn default() -> Self {
		Self {
			log_retention: 256,
			consistency_checks: cfg!(debug_assertions),
			materialize_lane: "replica-materialize".to_string(),
		}
	}
}

impl ReplicaConfig {
	/// Parses and validates a config from TOML source.
	pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks field values that the schema alone cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.log_retention == 0 {
			return Err(ConfigError::Invalid {
				field: "log_retention",
				reason: "must keep at least one operation".to_string(),
			});
		}
		if self.materialize_lane.trim().is_empty() {
			return Err(ConfigError::Invalid {
				field: "materialize_lane",
				reason: "must not be empty".to_string(),
			});
		}
		Ok(())
	}
}
