// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that syncsel uses to reach
//! the Syncthing daemon. File I/O is left to the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Default address of the Syncthing GUI and REST listener.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8384";

/// Default request timeout in seconds.
pub const DEFAULT_API_TIMEOUT: u64 = 30;

/// Configuration file layout.
///
/// # General Layout
///
/// Currently only holds the `[api]` table, which describes how to talk to
/// the REST interface of the Syncthing daemon. Any missing field falls back
/// to its default, so an empty file is a valid configuration.
///
/// Both the URL and the API key go through shell expansion after parsing.
/// Thus, `key = "$SYNCTHING_API_KEY"` keeps the secret out of the file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// REST interface settings.
    #[serde(default)]
    pub api: ApiSettings,
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on fields that may name secrets or paths.
        settings.api.url = expand(&settings.api.url)?;
        settings.api.key = expand(&settings.api.key)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Syncthing REST interface settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    /// Base URL of the REST interface.
    #[serde(default = "default_url")]
    pub url: String,

    /// API key sent through the `X-API-Key` header.
    #[serde(default)]
    pub key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            key: String::new(),
            timeout: default_timeout(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_timeout() -> u64 {
    DEFAULT_API_TIMEOUT
}

fn expand(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)
        .map_err(ConfigError::ShellExpansion)?
        .into_owned())
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("SYNCTHING_API_KEY", "s3cr3t")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [api]
            url = "http://10.0.0.2:8384"
            key = "$SYNCTHING_API_KEY"
            timeout = 5
        "#
        .parse()?;

        let expect = Settings {
            api: ApiSettings {
                url: "http://10.0.0.2:8384".into(),
                key: "s3cr3t".into(),
                timeout: 5,
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_empty_settings_uses_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());
        assert_eq!(result.api.url, DEFAULT_API_URL);
        assert_eq!(result.api.timeout, DEFAULT_API_TIMEOUT);

        let result: Settings = "[api]\nkey = \"abc\"\n".parse()?;
        assert_eq!(result.api.url, DEFAULT_API_URL);
        assert_eq!(result.api.key, "abc");

        Ok(())
    }

    #[test]
    fn deserialize_settings_reports_missing_variable() {
        let result = "[api]\nkey = \"$SYNCSEL_NEVER_SET_IN_TESTS\"\n".parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::ShellExpansion(_))));
    }

    #[test]
    fn serialize_settings() {
        let result = Settings {
            api: ApiSettings {
                url: "http://127.0.0.1:8384".into(),
                key: "abc".into(),
                timeout: 30,
            },
        }
        .to_string();

        let expect = indoc! {r#"
            [api]
            url = "http://127.0.0.1:8384"
            key = "abc"
            timeout = 30
        "#};

        assert_eq!(result, expect);
    }
}
