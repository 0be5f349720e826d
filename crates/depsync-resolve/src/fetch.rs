//! Bounded, retrying, caching metadata lookups.
//!
//! Lookups for a batch of names run concurrently on the tokio runtime, at
//! most `concurrency` at a time. Each attempt is cut off after `timeout`;
//! transient failures are retried with exponential backoff up to
//! `max_retries` times. Results land in a `BTreeMap`, so completion order
//! never leaks into resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metadata::PackageMetadata;
use crate::registry::{FetchError, Registry};

/// Timeout and retry settings for registry lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub concurrency: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            concurrency: 8,
        }
    }
}

/// Why a lookup gave up.
#[derive(Debug)]
enum Failure {
    NotFound,
    Invalid(String),
    Exhausted { attempts: u32, reason: String },
}

impl Failure {
    fn into_error(self, package: &str) -> Error {
        let package = package.to_string();
        match self {
            Self::NotFound => Error::NotFound { package },
            Self::Invalid(message) => Error::InvalidMetadata { package, message },
            Self::Exhausted { attempts, reason } => Error::RegistryUnavailable {
                package,
                attempts,
                reason,
            },
        }
    }
}

/// Caching front for a [`Registry`].
pub struct Fetcher {
    registry: Arc<dyn Registry>,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
    cache: Mutex<BTreeMap<String, Arc<PackageMetadata>>>,
}

impl Fetcher {
    pub fn new(registry: Arc<dyn Registry>, policy: RetryPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.concurrency.max(1)));
        Self {
            registry,
            policy,
            permits,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch metadata for every name, reusing cached answers.
    ///
    /// When several names fail, the error for the alphabetically first one is
    /// returned.
    pub async fn fetch_all(
        &self,
        names: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Arc<PackageMetadata>>> {
        let missing: Vec<String> = {
            let cache = self.cache.lock().await;
            names
                .iter()
                .filter(|name| !cache.contains_key(*name))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            debug!(count = missing.len(), "fetching registry metadata");
            let mut tasks = JoinSet::new();
            for name in missing {
                let registry = Arc::clone(&self.registry);
                let permits = Arc::clone(&self.permits);
                let policy = self.policy.clone();
                tasks.spawn(async move {
                    let result = fetch_one(registry, permits, &policy, &name).await;
                    (name, result)
                });
            }

            let mut fetched = BTreeMap::new();
            let mut failures = BTreeMap::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((name, Ok(metadata))) => {
                        fetched.insert(name, Arc::new(metadata));
                    }
                    Ok((name, Err(failure))) => {
                        failures.insert(name, failure);
                    }
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => {
                        return Err(Error::RegistryUnavailable {
                            package: "<cancelled lookup>".to_string(),
                            attempts: 0,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if let Some((name, failure)) = failures.into_iter().next() {
                return Err(failure.into_error(&name));
            }
            self.cache.lock().await.extend(fetched);
        }

        let cache = self.cache.lock().await;
        Ok(names
            .iter()
            .filter_map(|name| cache.get(name).map(|m| (name.clone(), Arc::clone(m))))
            .collect())
    }

    /// Fetch a single package.
    pub async fn fetch(&self, name: &str) -> Result<Arc<PackageMetadata>> {
        let names = BTreeSet::from([name.to_string()]);
        let mut fetched = self.fetch_all(&names).await?;
        fetched.remove(name).ok_or_else(|| Error::NotFound {
            package: name.to_string(),
        })
    }
}

async fn fetch_one(
    registry: Arc<dyn Registry>,
    permits: Arc<Semaphore>,
    policy: &RetryPolicy,
    name: &str,
) -> std::result::Result<PackageMetadata, Failure> {
    let attempts = AtomicU32::new(0);
    let schedule = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_backoff)
        .with_max_interval(policy.max_backoff)
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build();

    let attempts = &attempts;
    let permits = &permits;
    let registry = &registry;
    backoff::future::retry(schedule, move || async move {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let result = match permits.acquire().await {
            Ok(_permit) => tokio::time::timeout(policy.timeout, registry.fetch(name)).await,
            Err(e) => {
                return Err(backoff::Error::permanent(Failure::Exhausted {
                    attempts: attempt,
                    reason: e.to_string(),
                }));
            }
        };

        let reason = match result {
            Ok(Ok(metadata)) => return Ok(metadata),
            Ok(Err(FetchError::NotFound)) => {
                return Err(backoff::Error::permanent(Failure::NotFound));
            }
            Ok(Err(FetchError::Invalid(message))) => {
                return Err(backoff::Error::permanent(Failure::Invalid(message)));
            }
            Ok(Err(FetchError::Transient(reason))) => reason,
            Err(_) => format!("timed out after {}ms", policy.timeout.as_millis()),
        };

        let failure = Failure::Exhausted {
            attempts: attempt,
            reason: reason.clone(),
        };
        if attempt > policy.max_retries {
            Err(backoff::Error::permanent(failure))
        } else {
            warn!(package = name, attempt, %reason, "registry lookup failed, retrying");
            Err(backoff::Error::transient(failure))
        }
    })
    .await
}
