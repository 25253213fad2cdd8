//! Reddit forum client.
//!
//! Talks to the Reddit OAuth API with an application-only token (the
//! `client_credentials` grant), so no user account is involved: the app's
//! client id and secret are enough to read public listings.
//!
//! ## Session lifetime
//!
//! [`RedditClient::connect`] is the acquisition point: it validates the
//! credentials by obtaining a token and fails fast if Reddit rejects them.
//! The session is released when the client is dropped, on every exit path.
//! Tokens expire (usually after 24 h); a stale token is renewed before the
//! next request, which matters when rate-limit waits pile up.
//!
//! ## Listings
//!
//! Reddit serves at most 100 items per page.  Larger limits are satisfied
//! by following the listing's `after` cursor until enough items have been
//! collected or the subreddit runs out.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ForumClient, RawItem};
use crate::error::{AuthError, FetchError};
use crate::settings::Settings;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Largest page Reddit will serve.
const PAGE_SIZE: u32 = 100;

/// Renew this many seconds before the advertised expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token lifetime assumed when the response does not state one.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 3600;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest server-suggested wait honoured; larger hints are clamped.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Author name Reddit reports once an account is deleted.
const DELETED_AUTHOR: &str = "[deleted]";

/// Base URLs the client talks to.  Overridable for tests and proxies.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
        }
    }
}

/// An authenticated Reddit session.
pub struct RedditClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    client_id: String,
    client_secret: String,
    token: AccessToken,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

impl RedditClient {
    /// Connect to the public Reddit API.
    pub async fn connect(settings: &Settings) -> Result<Self, AuthError> {
        Self::connect_to(settings, Endpoints::default()).await
    }

    /// Connect using explicit endpoints.
    pub async fn connect_to(settings: &Settings, endpoints: Endpoints) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let token = request_token(
            &http,
            &endpoints.token_url,
            &settings.client_id,
            &settings.client_secret,
        )
        .await?;

        info!(redirect_uri = %settings.redirect_uri, "Successfully connected to Reddit.");

        Ok(Self {
            http,
            endpoints,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token,
        })
    }

    /// Current bearer token, renewed first if it is about to expire.
    async fn bearer(&mut self) -> Result<String, AuthError> {
        if self.token.is_stale(Utc::now()) {
            debug!("access token expired, requesting a new one");
            self.token = request_token(
                &self.http,
                &self.endpoints.token_url,
                &self.client_id,
                &self.client_secret,
            )
            .await?;
        }
        Ok(self.token.value.clone())
    }

    async fn fetch_page(
        &mut self,
        resource: &str,
        count: u32,
        after: Option<&str>,
    ) -> Result<Page, FetchError> {
        let token = self.bearer().await?;
        let url = format!("{}/r/{}/new", self.endpoints.api_base, resource);

        let mut query = vec![("limit", count.to_string()), ("raw_json", "1".to_string())];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let final_path = response.url().path().to_string();
        let body = response.text().await?;

        check_response(resource, status, &headers, &final_path, &body)?;
        parse_listing(&body)
    }
}

#[async_trait]
impl ForumClient for RedditClient {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn list_newest(
        &mut self,
        resource: &str,
        limit: u32,
    ) -> Result<Vec<RawItem>, FetchError> {
        validate_name(resource)?;

        let wanted = limit as usize;
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        while items.len() < wanted {
            let count = (limit - items.len() as u32).min(PAGE_SIZE);
            let page = self.fetch_page(resource, count, after.as_deref()).await?;

            let exhausted = page.items.is_empty() || page.after.is_none();
            items.extend(page.items);
            if exhausted {
                break;
            }
            after = page.after;
        }

        items.truncate(wanted);
        debug!(subreddit = resource, count = items.len(), "listing fetched");
        Ok(items)
    }
}

impl Drop for RedditClient {
    fn drop(&mut self) {
        debug!("Reddit session closed");
    }
}

// ---------------------------------------------------------------------------
// Token endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    /// Reddit reports failures either as a string (`"invalid_grant"`) or
    /// as a bare status code (`401`).
    error: Option<serde_json::Value>,
}

async fn request_token(
    http: &reqwest::Client,
    url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<AccessToken, AuthError> {
    let response = http
        .post(url)
        .basic_auth(client_id, Some(client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message: snippet(&body),
        });
    }

    parse_token(&body, status, Utc::now())
}

fn parse_token(
    body: &str,
    status: StatusCode,
    now: DateTime<Utc>,
) -> Result<AccessToken, AuthError> {
    let response: TokenResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        let message = match error {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let value = response
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Rejected {
            status: status.as_u16(),
            message: "response carried no access_token".to_string(),
        })?;

    let lifetime = response
        .expires_in
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
        .clamp(0, MAX_TOKEN_LIFETIME_SECS);

    Ok(AccessToken {
        value,
        expires_at: now + TimeDelta::seconds(lifetime),
    })
}

// ---------------------------------------------------------------------------
// Listing endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    #[serde(default)]
    title: String,
    author: Option<String>,
    #[serde(default)]
    ups: i64,
}

impl From<Submission> for RawItem {
    fn from(submission: Submission) -> Self {
        Self {
            title: submission.title,
            author: submission.author.filter(|name| name != DELETED_AUTHOR),
            score: submission.ups,
        }
    }
}

struct Page {
    items: Vec<RawItem>,
    after: Option<String>,
}

/// Decode one page of a `/new` listing.  Pure, so tests can feed it
/// canned JSON.
fn parse_listing(body: &str) -> Result<Page, FetchError> {
    let listing: Listing = serde_json::from_str(body)?;
    let items = listing
        .data
        .children
        .into_iter()
        .map(|child| RawItem::from(child.data))
        .collect();

    Ok(Page {
        items,
        after: listing.data.after,
    })
}

/// Map an HTTP response onto the fetch error taxonomy.
fn check_response(
    resource: &str,
    status: StatusCode,
    headers: &HeaderMap,
    final_path: &str,
    body: &str,
) -> Result<(), FetchError> {
    // Unknown subreddits are redirected to the search page.
    if final_path.starts_with("/subreddits/search") {
        return Err(FetchError::NotFound(resource.to_string()));
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited {
            retry_after: retry_after_hint(headers),
        }),
        StatusCode::NOT_FOUND => Err(FetchError::NotFound(resource.to_string())),
        StatusCode::FORBIDDEN => Err(FetchError::Forbidden(resource.to_string())),
        status if !status.is_success() => Err(FetchError::Api {
            status: status.as_u16(),
            message: snippet(body),
        }),
        _ if has_ratelimit_error(body) => Err(FetchError::RateLimited { retry_after: None }),
        _ => Ok(()),
    }
}

/// Wait suggested by `Retry-After`, else by Reddit's `x-ratelimit-reset`.
fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    [RETRY_AFTER.as_str(), "x-ratelimit-reset"]
        .iter()
        .find_map(|name| {
            let seconds: f64 = headers.get(*name)?.to_str().ok()?.trim().parse().ok()?;
            if seconds.is_nan() || seconds < 0.0 {
                return None;
            }
            let wait = Duration::try_from_secs_f64(seconds.ceil()).unwrap_or(MAX_RETRY_AFTER);
            Some(wait.min(MAX_RETRY_AFTER))
        })
}

/// `true` when a 2xx body is an API error envelope carrying `RATELIMIT`.
fn has_ratelimit_error(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };

    value
        .pointer("/json/errors")
        .and_then(|errors| errors.as_array())
        .is_some_and(|errors| {
            errors
                .iter()
                .any(|error| error.get(0).and_then(|kind| kind.as_str()) == Some("RATELIMIT"))
        })
}

fn validate_name(resource: &str) -> Result<(), FetchError> {
    let valid = !resource.is_empty()
        && resource
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+');

    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidResource(resource.to_string()))
    }
}

/// First line of a response body, bounded, for error messages.
fn snippet(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default().trim();
    line.chars().take(200).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
