use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};

use crate::error::TiledError;
use crate::scalar::Element;
use crate::tile::Tile;

pub(crate) type TileSender<T> = oneshot::Sender<Result<Tile<T>, TiledError>>;

/// A tile that may not have been produced yet.
///
/// Clones observe the same value. Awaiting or [`wait`](TileFuture::wait)ing
/// yields the tile, or the error of its producer, or `Abandoned` if the
/// producer went away.
pub struct TileFuture<T: Element> {
    inner: Shared<BoxFuture<'static, Result<Tile<T>, TiledError>>>,
}

impl<T: Element> Clone for TileFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Element> fmt::Debug for TileFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T: Element> TileFuture<T> {
    pub(crate) fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Tile<T>, TiledError>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    pub fn ready(value: Result<Tile<T>, TiledError>) -> Self {
        Self::from_future(futures::future::ready(value))
    }

    /// Future fed by the returned sender.
    pub(crate) fn channel(ordinal: usize) -> (TileSender<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let future = rx.map(move |r| r.unwrap_or(Err(TiledError::Abandoned { ordinal })));
        (tx, Self::from_future(future))
    }

    /// `true` once the value is available.
    pub fn is_ready(&self) -> bool {
        self.inner.clone().now_or_never().is_some()
    }

    /// Blocks the calling thread until the value is available.
    pub fn wait(&self) -> Result<Tile<T>, TiledError> {
        futures::executor::block_on(self.inner.clone())
    }

    /// Future of `f` applied to the tile once it is available.
    pub fn then_map<U, F>(self, f: F) -> TileFuture<U>
    where
        U: Element,
        F: FnOnce(Tile<T>) -> Result<Tile<U>, TiledError> + Send + 'static,
    {
        TileFuture::from_future(async move { f(self.await?) })
    }
}

impl<T: Element> Future for TileFuture<T> {
    type Output = Result<Tile<T>, TiledError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::tensor::Tensor;

    #[test]
    fn test_channel_delivery() {
        let (tx, fut) = TileFuture::<f64>::channel(3);
        let other = fut.clone();
        assert!(!fut.is_ready());
        tx.send(Ok(Tile::new(Tensor::filled(Range::from_extent(&[2]), 1.5))))
            .unwrap();
        assert!(fut.is_ready());
        assert_eq!(other.wait().unwrap().tensor().unwrap().data(), &[1.5, 1.5]);
    }

    #[test]
    fn test_dropped_sender_abandons() {
        let (tx, fut) = TileFuture::<f64>::channel(5);
        drop(tx);
        assert_eq!(fut.wait(), Err(TiledError::Abandoned { ordinal: 5 }));
    }

    #[test]
    fn test_then_map() {
        let fut = TileFuture::ready(Ok(Tile::new(Tensor::filled(Range::from_extent(&[3]), 2.0))));
        let mapped = fut.then_map(|t| Ok(t.map(|x: f64| x as i64 * 2)));
        assert_eq!(mapped.wait().unwrap().tensor().unwrap().data(), &[4, 4, 4]);
    }
}
