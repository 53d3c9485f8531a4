//! Tower layers shared by listener and command services.

use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::{BoxError, Service};
use tower_layer::Layer;

use crate::error::Panicked;

/// Converts panics raised by the inner service into [`Panicked`] errors.
///
/// Both the synchronous `call` and the returned future are guarded, so a
/// misbehaving listener never takes down the task that drives it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatchPanicLayer;

impl<S> Layer<S> for CatchPanicLayer {
    type Service = CatchPanicService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CatchPanicService { inner }
    }
}

pub struct CatchPanicService<S> {
    inner: S,
}

impl<S> Clone for CatchPanicService<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        CatchPanicService {
            inner: self.inner.clone(),
        }
    }
}

impl<S, R> Service<R> for CatchPanicService<S>
where
    S: Service<R, Error = BoxError>,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                let err: BoxError = Box::new(Panicked::from_payload(payload));
                return Box::pin(async move { Err(err) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(Box::new(Panicked::from_payload(payload)) as BoxError),
            }
        })
    }
}
