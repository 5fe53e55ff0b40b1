use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use hyper::{
    body::{Body, Frame, SizeHint},
    Version,
};

/// The body of a request or response, tagged by how it is represented.
///
/// The representation decides how the registry measures the body: a strict body is measured on
/// the spot, a streamed body is measured as it flows through to its consumer.
#[derive(Debug)]
pub enum Entity<B> {
    /// A body whose content is entirely in memory.
    Strict(Bytes),

    /// A streamed body of unknown final length.
    Chunked(B),

    /// A streamed body with a length declared up front.
    Default {
        /// Declared length of the body, in bytes.
        content_length: u64,
        /// The stream delivering the body.
        body: B,
    },
}

impl<B> Entity<B> {
    /// Creates a strict entity from in-memory content.
    pub fn strict<D>(data: D) -> Self
    where
        D: Into<Bytes>,
    {
        Entity::Strict(data.into())
    }

    /// Creates an empty strict entity.
    pub fn empty() -> Self {
        Entity::Strict(Bytes::new())
    }

    /// Creates a chunked entity from a stream of unknown length.
    pub fn chunked(body: B) -> Self {
        Entity::Chunked(body)
    }

    /// Creates an entity from a stream with a declared length.
    pub fn with_content_length(content_length: u64, body: B) -> Self {
        Entity::Default { content_length, body }
    }

    /// Whether or not the content of this entity is entirely in memory.
    pub fn is_strict(&self) -> bool {
        matches!(self, Entity::Strict(_))
    }

    /// Length of this entity, when known before it is consumed.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Entity::Strict(data) => Some(data.len() as u64),
            Entity::Chunked(_) => None,
            Entity::Default { content_length, .. } => Some(*content_length),
        }
    }

    /// Whether or not this entity may be re-framed when sent over the given protocol version.
    ///
    /// A declared-length entity sent over HTTP/1.0 or older is delimited by its declared length
    /// alone, as chunked transfer does not exist there, so its stream must be handed to the
    /// transport untouched.  Every other entity can be re-framed.
    pub fn supports_reframing(&self, version: Version) -> bool {
        match self {
            Entity::Strict(_) | Entity::Chunked(_) => true,
            Entity::Default { .. } => version >= Version::HTTP_11,
        }
    }
}

impl<B> Default for Entity<B> {
    fn default() -> Self {
        Entity::empty()
    }
}

impl<B> Body for Entity<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Entity::Strict(data) if data.is_empty() => Poll::Ready(None),
            Entity::Strict(data) => Poll::Ready(Some(Ok(Frame::data(std::mem::take(data))))),
            Entity::Chunked(body) | Entity::Default { body, .. } => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Entity::Strict(data) => data.is_empty(),
            Entity::Chunked(body) | Entity::Default { body, .. } => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Entity::Strict(data) => SizeHint::with_exact(data.len() as u64),
            Entity::Chunked(body) => body.size_hint(),
            Entity::Default { content_length, .. } => SizeHint::with_exact(*content_length),
        }
    }
}
