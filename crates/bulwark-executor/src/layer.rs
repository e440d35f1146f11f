//! Tower integration.

use crate::ResilientExecutor;
use bulwark_core::{OperationKey, ResilienceError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A Tower layer that protects a service under one operation key.
///
/// Every request is run through [`ResilientExecutor::invoke`], so the key's
/// breaker, bulkhead, timeout and fallback all apply. The registered fallback
/// must have the service's request and response types.
///
/// # Example
///
/// ```rust
/// use bulwark_executor::{ResilientExecutor, ResilientLayer};
/// use bulwark_fallback::Fallback;
/// use tower::{Layer, Service, ServiceExt, service_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let executor = ResilientExecutor::builder()
///     .fallback("organization-lookup", Fallback::<String, String>::value("unknown".into()))
///     .build();
///
/// let mut service = ResilientLayer::new(executor, "organization-lookup").layer(service_fn(
///     |_org_id: String| async { Err::<String, std::io::Error>(std::io::Error::other("down")) },
/// ));
///
/// let name = service.ready().await.unwrap().call("e254f8c".into()).await.unwrap();
/// assert_eq!(name, "unknown");
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ResilientLayer {
    executor: ResilientExecutor,
    key: OperationKey,
}

impl ResilientLayer {
    /// Creates a layer protecting services under `key`.
    pub fn new(executor: ResilientExecutor, key: impl Into<OperationKey>) -> Self {
        Self {
            executor,
            key: key.into(),
        }
    }
}

impl<S> Layer<S> for ResilientLayer {
    type Service = ResilientService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ResilientService {
            inner: service,
            executor: self.executor.clone(),
            key: self.key.clone(),
        }
    }
}

/// A service whose calls run under a [`ResilientExecutor`].
///
/// Errors from [`call`](Service::call) surface only as
/// [`ResilienceError::FallbackFailed`]. An error from the inner service's
/// `poll_ready` is not run through the executor and surfaces as
/// [`ResilienceError::CallFailure`].
#[derive(Clone, Debug)]
pub struct ResilientService<S> {
    inner: S,
    executor: ResilientExecutor,
    key: OperationKey,
}

impl<S> ResilientService<S> {
    /// The operation key requests run under.
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Returns a reference to the inner service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consumes the service and returns the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Req> Service<Req> for ResilientService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(ResilienceError::CallFailure)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let executor = self.executor.clone();
        let key = self.key.clone();

        Box::pin(async move {
            executor
                .invoke(&key, request, move |request| inner.call(request))
                .await
        })
    }
}
