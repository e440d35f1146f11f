use bulwark_core::BoxError;
use std::fmt;
use std::sync::Arc;

type FallbackFn<Req, Res> = dyn Fn(Req) -> Result<Res, BoxError> + Send + Sync;

/// A cheap stand-in for a protected call, with the same request and
/// response types.
///
/// Fallbacks run synchronously and unprotected, so they should not do I/O.
pub struct Fallback<Req, Res> {
    f: Arc<FallbackFn<Req, Res>>,
}

impl<Req, Res> Fallback<Req, Res> {
    /// Wraps a function computing the fallback response from the request.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Req) -> Result<Res, BoxError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// A fallback that always returns a clone of `value`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bulwark_fallback::Fallback;
    ///
    /// let fallback = Fallback::<u64, String>::value("unknown organization".to_string());
    /// assert_eq!(fallback.call(42).unwrap(), "unknown organization");
    /// ```
    pub fn value(value: Res) -> Self
    where
        Res: Clone + Send + Sync + 'static,
    {
        Self::new(move |_| Ok(value.clone()))
    }

    /// A fallback that computes its response infallibly.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Req) -> Res + Send + Sync + 'static,
    {
        Self::new(move |req| Ok(f(req)))
    }

    /// Runs the fallback.
    pub fn call(&self, req: Req) -> Result<Res, BoxError> {
        (self.f)(req)
    }
}

impl<Req, Res> Clone for Fallback<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<Req, Res> fmt::Debug for Fallback<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback")
            .field("signature", &signature::<Req, Res>())
            .finish()
    }
}

pub(crate) fn signature<Req, Res>() -> &'static str {
    std::any::type_name::<fn(Req) -> Res>()
}
