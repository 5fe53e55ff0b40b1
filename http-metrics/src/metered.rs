use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Buf;
use hyper::body::{Body, Frame, SizeHint};

type OnComplete = Box<dyn FnOnce(u64) + Send + Sync>;

/// Running byte count of a body, and the callback to hand it to once the body completes.
struct Meter {
    bytes: u64,
    on_complete: Option<OnComplete>,
}

impl Meter {
    fn record(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(self.bytes);
        }
    }
}

impl Drop for Meter {
    fn drop(&mut self) {
        // Abandoned before completing: report what was seen so far.
        self.complete();
    }
}

/// A body that counts the bytes flowing through it.
///
/// Frames are handed to the consumer exactly as the inner body produced them.  The callback given
/// to [`Metered::new`] is called exactly once with the number of data bytes seen, at the first of:
/// - the inner body reaching its end,
/// - the inner body returning an error (the error itself is passed on untouched),
/// - the `Metered` body being dropped.
///
/// A body created with [`Metered::passthrough`] counts nothing and has no callback.
pub struct Metered<B> {
    inner: B,
    meter: Option<Meter>,
}

impl<B> Metered<B> {
    /// Wraps `inner`, calling `on_complete` with its total size once it completes.
    pub fn new<F>(inner: B, on_complete: F) -> Self
    where
        F: FnOnce(u64) + Send + Sync + 'static,
    {
        let meter = Meter { bytes: 0, on_complete: Some(Box::new(on_complete)) };
        Metered { inner, meter: Some(meter) }
    }

    /// Wraps `inner` without instrumenting it.
    pub fn passthrough(inner: B) -> Self {
        Metered { inner, meter: None }
    }

    /// Whether or not this body is counting bytes.
    pub fn is_instrumented(&self) -> bool {
        self.meter.is_some()
    }

    /// Number of data bytes seen so far.
    pub fn bytes_seen(&self) -> u64 {
        self.meter.as_ref().map_or(0, |meter| meter.bytes)
    }

    /// Consumes this body, returning the inner body.
    ///
    /// If the body has not completed yet, the callback fires now with the bytes seen so far.
    pub fn into_inner(self) -> B {
        self.inner
    }

    fn complete(&mut self) {
        if let Some(meter) = self.meter.as_mut() {
            meter.complete();
        }
    }
}

impl<B> Body for Metered<B>
where
    B: Body + Unpin,
    B::Data: Buf,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(meter), Some(data)) = (this.meter.as_mut(), frame.data_ref()) {
                    meter.record(data.remaining());
                }
                if this.inner.is_end_stream() {
                    this.complete();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.complete();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: fmt::Debug> fmt::Debug for Metered<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metered")
            .field("inner", &self.inner)
            .field("instrumented", &self.is_instrumented())
            .field("bytes_seen", &self.bytes_seen())
            .finish()
    }
}
