//! Cursor-based pagination shared by both listing endpoints
//!
//! [`paginate`] turns a page-fetching closure into a lazy stream of items.
//! Nothing is requested until the stream is polled, and each page is fully
//! drained before the next one is fetched.

use crate::error::Result;
use crate::types::Page;
use futures::Stream;
use std::collections::VecDeque;
use std::future::Future;

struct PageState<T, F> {
    fetch_page: F,
    cursor: Option<String>,
    buffered: VecDeque<T>,
    exhausted: bool,
}

/// Stream every item of a cursor-paginated listing
///
/// `fetch_page` is called with `None` for the first page and with the
/// previous page's cursor afterwards. The stream ends when a page reports
/// `has_more == false`, or when it reports more pages without a usable cursor
/// (logged as a warning). A fetch error is yielded once and ends the stream.
///
/// # Example
///
/// ```
/// use feishu_backup::pagination::paginate;
/// use feishu_backup::types::Page;
/// use futures::TryStreamExt;
///
/// # futures::executor::block_on(async {
/// let items: Vec<u32> = paginate(|cursor: Option<String>| async move {
///     Ok(match cursor.as_deref() {
///         None => Page { items: vec![1, 2], has_more: true, next_cursor: Some("p2".into()) },
///         Some(_) => Page { items: vec![3], has_more: false, next_cursor: None },
///     })
/// })
/// .try_collect()
/// .await
/// .unwrap();
/// assert_eq!(items, vec![1, 2, 3]);
/// # });
/// ```
pub fn paginate<T, F, Fut>(fetch_page: F) -> impl Stream<Item = Result<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let state = PageState {
        fetch_page,
        cursor: None,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffered.pop_front() {
                return Ok(Some((item, state)));
            }
            if state.exhausted {
                return Ok(None);
            }

            let page = match (state.fetch_page)(state.cursor.take()).await {
                Ok(page) => page,
                Err(e) => return Err(e),
            };
            state.buffered.extend(page.items);

            if !page.has_more {
                state.exhausted = true;
                continue;
            }
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(cursor) => state.cursor = Some(cursor),
                None => {
                    tracing::warn!("listing reports more pages but returned no cursor, stopping");
                    state.exhausted = true;
                }
            }
        }
    })
}
