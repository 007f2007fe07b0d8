//! Lazy, one-shot traversal of `@odata.nextLink`-paginated collections.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::Stream;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::resource::GraphCollection;

type PageFuture<T> = Pin<Box<dyn std::future::Future<Output = Result<GraphCollection<T>>> + Send>>;

enum State<T> {
    Pending(PageFuture<T>),
    Buffered { items: std::vec::IntoIter<T>, next_link: Option<String> },
    Done,
}

/// A lazy, finite, non-restartable sequence of `T` obtained by following
/// `@odata.nextLink`. An `ItemNotFound` while fetching the very first page
/// means the root itself is gone; the caller is expected to translate that
/// into `FolderMissing`.
pub struct PaginatedStream<T> {
    pipeline: Arc<Pipeline>,
    timeout: Duration,
    cancel: CancellationToken,
    state: State<T>,
}

impl<T: DeserializeOwned + Send + 'static> PaginatedStream<T> {
    pub fn new(pipeline: Arc<Pipeline>, start_url: String, timeout: Duration, cancel: CancellationToken) -> Self {
        let fut = fetch_page(pipeline.clone(), start_url, timeout, cancel.clone());
        Self {
            pipeline,
            timeout,
            cancel,
            state: State::Pending(Box::pin(fut)),
        }
    }
}

async fn fetch_page<T: DeserializeOwned>(
    pipeline: Arc<Pipeline>,
    url: String,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<GraphCollection<T>> {
    pipeline.get_json(&url, timeout, &cancel).await
}

impl<T: DeserializeOwned + Send + Unpin + 'static> Stream for PaginatedStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Done => return Poll::Ready(None),
                State::Buffered { items, next_link } => match items.next() {
                    Some(item) => return Poll::Ready(Some(Ok(item))),
                    None => match next_link.take() {
                        Some(url) => {
                            let fut = fetch_page(this.pipeline.clone(), url, this.timeout, this.cancel.clone());
                            this.state = State::Pending(Box::pin(fut));
                        }
                        None => {
                            this.state = State::Done;
                            return Poll::Ready(None);
                        }
                    },
                },
                State::Pending(fut) => match fut.poll_unpin(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => {
                        this.state = State::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Ready(Ok(page)) => {
                        this.state = State::Buffered {
                            items: page.value.into_iter(),
                            next_link: page.next_link.filter(|s| !s.is_empty()),
                        };
                    }
                },
            }
        }
    }
}

/// Collect a [`PaginatedStream`] into a `Vec`, stopping at the first error.
pub async fn collect_all<T: DeserializeOwned + Send + Unpin + 'static>(mut stream: PaginatedStream<T>) -> Result<Vec<T>> {
    use futures_util::StreamExt;
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        out.push(item?);
    }
    Ok(out)
}
