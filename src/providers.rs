//! Ordered provider fallback

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AgentflowError, Result};

/// Anything that can sit in an ordered fallback list
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
}

/// Call `op` against each provider in order and return the first success.
///
/// Failures are logged and the next provider is tried. When every provider fails
/// the last error is returned; an empty list is a `MarketDataUnavailable` error.
pub async fn try_in_order<P, T, F, Fut>(providers: &[Arc<P>], what: &str, mut op: F) -> Result<T>
where
    P: Provider + ?Sized,
    F: FnMut(Arc<P>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for provider in providers {
        match op(Arc::clone(provider)).await {
            Ok(value) => {
                debug!(provider = provider.name(), what, "provider succeeded");
                return Ok(value);
            }
            Err(e) => {
                warn!(provider = provider.name(), what, error = %e, "provider failed, trying next");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        AgentflowError::MarketDataUnavailable(format!("no provider configured for {}", what))
    }))
}
