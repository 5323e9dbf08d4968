use crate::api::query::ReadQuery;
use crate::api::store::RemoteStore;
use crate::error::AppResult;
use crate::logging::{log, LogLevel};
use crate::model::record::Record;
use futures::stream::{self, Stream, TryStreamExt};

/// Walks a query page by page with a fixed limit and an advancing offset.
///
/// A page shorter than the limit (including an empty one) ends the sequence. There is no
/// resumption token: a failed fetch ends the walk and the error is the caller's to handle.
pub struct BatchFetcher<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
    query: ReadQuery,
    page_size: usize,
    offset: usize,
    done: bool,
}

impl<'a, S: RemoteStore + ?Sized> BatchFetcher<'a, S> {
    pub fn new(store: &'a S, query: ReadQuery, page_size: usize) -> Self {
        BatchFetcher {
            store,
            query,
            page_size: page_size.max(1),
            offset: 0,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Next page, or `None` once the end of data has been seen. An empty final page is
    /// reported as `None`.
    pub async fn next_page(&mut self) -> AppResult<Option<Vec<Record>>> {
        if self.done {
            return Ok(None);
        }

        let page = match self
            .store
            .fetch_page(&self.query, self.offset, self.page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                log(
                    LogLevel::Error,
                    &format!(
                        "Fetch FAIL {} at offset {}: {}",
                        self.query.describe(),
                        self.offset,
                        e
                    ),
                );
                return Err(e);
            }
        };

        if page.len() < self.page_size {
            self.done = true;
        }
        self.offset += page.len();

        if page.is_empty() {
            Ok(None)
        } else {
            Ok(Some(page))
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = AppResult<Vec<Record>>> + 'a
    where
        S: 'a,
    {
        stream::try_unfold(self, |mut fetcher| async move {
            Ok(fetcher.next_page().await?.map(|page| (page, fetcher)))
        })
    }

    /// Drains every page into one vector.
    pub async fn collect_all(self) -> AppResult<Vec<Record>> {
        let pages: Vec<Vec<Record>> = self.into_stream().try_collect().await?;
        Ok(pages.into_iter().flatten().collect())
    }
}
