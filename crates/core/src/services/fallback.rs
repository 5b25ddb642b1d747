use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::{CoreError, ProviderError};
use crate::providers::traits::Provider;

/// Walk `chain` in order and return the first successful answer together with the
/// name of the provider that produced it.
///
/// Each provider is asked at most once. A failure moves on to the next entry; the
/// last failure is kept for the final error. Cancelling `cancel` abandons the
/// in-flight call and stops the walk.
pub async fn first_success<P, T, F, Fut>(
    chain: &[Arc<P>],
    request: &str,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<(T, String), CoreError>
where
    P: Provider + ?Sized,
    F: FnMut(Arc<P>) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_error: Option<ProviderError> = None;

    for (index, provider) in chain.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let name = provider.name().to_string();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ProviderError::cancelled(&name)),
            result = call(Arc::clone(provider)) => result,
        };

        match outcome {
            Ok(value) => {
                if index > 0 {
                    info!(provider = %name, request, attempt = index + 1, "Fallback provider answered");
                }
                return Ok((value, name));
            }
            Err(e) if e.is_cancelled() => return Err(CoreError::Cancelled),
            Err(e) => {
                warn!(provider = %name, request, error = %e, "Provider failed, trying next");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(last_error) => {
            error!(request, error = %last_error, "All providers failed");
            Err(CoreError::AllProvidersFailed {
                request: request.to_string(),
                last_error,
            })
        }
        None => Err(CoreError::NoProvider(request.to_string())),
    }
}
