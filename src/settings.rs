//! Credentials and connection parameters.
//!
//! Values come from the process environment, after an optional `.env` file
//! in the working directory has been loaded into it.  Keys are matched
//! case-insensitively (`APP_ID`, `app_id` and `App_Id` are the same
//! setting).  A `.env` file that exists but does not parse is an error.
//!
//! | key                 | meaning                               | default                 |
//! |---------------------|---------------------------------------|-------------------------|
//! | `APP_ID`            | OAuth client id (≥ 14 chars)          | —                       |
//! | `APP_SECRET`        | OAuth client secret (≥ 27 chars)      | —                       |
//! | `APP_NAME`          | `User-Agent` sent with every request  | —                       |
//! | `REDIRECT_URI`      | registered redirect URI               | `http://localhost:8080` |
//! | `RATELIMIT_SECONDS` | wait after a rate-limit response      | `10`                    |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::SettingsError;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080";
pub const DEFAULT_RATELIMIT_SECONDS: u64 = 10;

const CLIENT_ID_MIN_LEN: usize = 14;
const CLIENT_SECRET_MIN_LEN: usize = 27;

/// Validated application settings.
///
/// Constructing one is the only validation step: a `Settings` value that
/// exists is always usable for connecting.
#[derive(Clone)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub redirect_uri: String,
    ratelimit_seconds: u64,
}

impl Settings {
    /// Load `.env` (if present) and read settings from the environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        check_dotenv(dotenvy::dotenv())?;
        // Non-UTF-8 variables cannot hold any of our settings.
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Build settings from `(key, value)` pairs, ignoring key case.
    pub fn from_vars<I>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        Self::from_lookup(|key| {
            vars.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, value)| value.clone())
        })
    }

    /// Build settings from an arbitrary key lookup.
    ///
    /// `lookup` is queried with the upper-case key first and the lower-case
    /// key second; mixed-case keys are only found through [`Self::from_vars`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&key.to_ascii_uppercase()).or_else(|| lookup(&key.to_ascii_lowercase()))
        };

        let client_id = get("APP_ID").ok_or(SettingsError::Missing("APP_ID"))?;
        check_len("APP_ID", &client_id, CLIENT_ID_MIN_LEN)?;

        let client_secret = get("APP_SECRET").ok_or(SettingsError::Missing("APP_SECRET"))?;
        check_len("APP_SECRET", &client_secret, CLIENT_SECRET_MIN_LEN)?;

        let user_agent = get("APP_NAME")
            .filter(|name| !name.trim().is_empty())
            .ok_or(SettingsError::Missing("APP_NAME"))?;

        let redirect_uri =
            get("REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        let ratelimit_seconds = match get("RATELIMIT_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| SettingsError::InvalidSeconds {
                    name: "RATELIMIT_SECONDS",
                    value: raw,
                })?,
            None => DEFAULT_RATELIMIT_SECONDS,
        };

        Ok(Self {
            client_id,
            client_secret,
            user_agent,
            redirect_uri,
            ratelimit_seconds,
        })
    }

    /// How long to back off after a rate-limit response when the server
    /// gives no hint (and always, in blocking mode).
    pub fn ratelimit(&self) -> Duration {
        Duration::from_secs(self.ratelimit_seconds)
    }
}

/// A missing `.env` is normal; one that fails to parse is not.
fn check_dotenv(loaded: Result<PathBuf, dotenvy::Error>) -> Result<(), SettingsError> {
    match loaded {
        Ok(path) => {
            debug!(path = %path.display(), "loaded .env file");
            Ok(())
        }
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(SettingsError::DotEnv(err)),
    }
}

fn check_len(name: &'static str, value: &str, min: usize) -> Result<(), SettingsError> {
    let actual = value.chars().count();
    if actual < min {
        return Err(SettingsError::TooShort { name, min, actual });
    }
    Ok(())
}

// Keep the secret out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("redirect_uri", &self.redirect_uri)
            .field("ratelimit_seconds", &self.ratelimit_seconds)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
