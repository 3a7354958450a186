//! Direct links out of kwik locker pages.
//!
//! A locker page hides its download form in a packed script. Resolution fetches
//! the page, unpacks the script, reads the form target and token, and posts the
//! token with the page session; the answer redirects to the file.

mod exchange;
mod form;
mod session;

#[cfg(test)]
mod tests;

use futures::{stream, StreamExt};
use log::{debug, error, warn};
use reqwest::StatusCode;
use strum_macros::Display;
use thiserror::Error;
use url::Url;

pub use exchange::find_media_link;
pub use form::{FormCredentials, TOKEN_FIELD};
pub use session::{SessionContext, SESSION_COOKIE};

use crate::{
    config::ResolverConfig,
    models::ResolutionOutcome,
    utils::{
        self,
        unpack::hunter::{self, DecodeError},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Fetching,
    Locating,
    Decoding,
    Extracting,
    Exchanging,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid locker url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("nothing to work with at stage {stage}")]
    StructuralMiss { stage: Stage },
    #[error("payload decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("network error at stage {stage}: {source}")]
    Network {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },
    #[error("exchange rejected with status {status}")]
    Rejected { status: StatusCode },
    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        last: Box<ResolveError>,
    },
}

impl ResolveError {
    fn network(stage: Stage, source: reqwest::Error) -> Self {
        ResolveError::Network { stage, source }
    }

    /// Everything that a fresh page might fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ResolveError::InvalidUrl { .. } | ResolveError::ExhaustedRetries { .. }
        )
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            ResolveError::StructuralMiss { stage } | ResolveError::Network { stage, .. } => {
                Some(*stage)
            }
            ResolveError::Decode(_) => Some(Stage::Decoding),
            ResolveError::Rejected { .. } => Some(Stage::Exchanging),
            ResolveError::InvalidUrl { .. } => Some(Stage::Fetching),
            ResolveError::ExhaustedRetries { last, .. } => last.stage(),
        }
    }
}

/// Resolves locker links to direct links.
///
/// Holds no per-link state: every attempt fetches its own page and session.
pub struct LockerResolver {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl LockerResolver {
    pub fn new(config: ResolverConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let client = utils::create_locker_client(&config)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Never errors: every failure ends up as [`ResolutionOutcome::Failed`].
    pub async fn resolve(&self, locker_url: &str) -> ResolutionOutcome {
        match self.try_resolve(locker_url).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("[kwik] failed to resolve {locker_url}: {err}");
                ResolutionOutcome::Failed(err.to_string())
            }
        }
    }

    /// Resolves every link independently, at most `max_in_flight` at a time.
    /// Outcomes come back in input order.
    pub async fn resolve_all<I>(&self, locker_urls: I) -> Vec<ResolutionOutcome>
    where
        I: IntoIterator<Item = String>,
    {
        let deadline = self.config.resolve_timeout();

        stream::iter(locker_urls)
            .map(|locker_url| async move {
                match tokio::time::timeout(deadline, self.resolve(&locker_url)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("[kwik] {locker_url} timed out after {deadline:?}");
                        ResolutionOutcome::Failed(format!("timed out after {deadline:?}"))
                    }
                }
            })
            .buffered(self.config.max_in_flight)
            .collect()
            .await
    }

    async fn try_resolve(&self, locker_url: &str) -> Result<ResolutionOutcome, ResolveError> {
        let url = Url::parse(locker_url).map_err(|source| ResolveError::InvalidUrl {
            url: locker_url.to_owned(),
            source,
        })?;

        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.attempt(&url).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                return Err(ResolveError::ExhaustedRetries {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            warn!("[kwik] attempt {attempt}/{max_attempts} for {url} failed: {err}");
            tokio::time::sleep(self.config.retry_delay()).await;
        }
    }

    async fn attempt(&self, url: &Url) -> Result<ResolutionOutcome, ResolveError> {
        debug!("[kwik] fetching {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|source| ResolveError::network(Stage::Fetching, source))?;

        let session = SessionContext::from_headers(response.headers());
        let page = response
            .text()
            .await
            .map_err(|source| ResolveError::network(Stage::Fetching, source))?;

        let payload = hunter::locate(&page).ok_or(ResolveError::StructuralMiss {
            stage: Stage::Locating,
        })?;
        debug!(
            "[kwik] payload of {} chars, base {}, offset {}",
            payload.encoded.len(),
            payload.base,
            payload.offset
        );

        let markup = hunter::decode(&payload)?;

        let credentials = form::extract(&markup).ok_or(ResolveError::StructuralMiss {
            stage: Stage::Extracting,
        })?;
        debug!("[kwik] posting token to {}", credentials.action_url);

        exchange::exchange(&self.client, &credentials, &session, url).await
    }
}
