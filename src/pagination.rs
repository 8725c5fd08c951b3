//! Accumulation of paginated content API results.
//!
//! [`accumulate`] merges a freshly fetched page into the results shown so far.
//! The "load more" interaction built on top of it is modelled as explicit
//! state ([`PostListState`]) updated by a pure function ([`reduce`]) from
//! [`Action`]s, so that a page is only ever requested once: a second
//! [`Action::LoadMore`] while a request is outstanding is ignored.

/// A page (or an accumulation of pages) of results along with the token for
/// the following page. `next_page` is `None` exactly when there are no
/// further pages upstream. An empty-string token is still a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub next_page: Option<String>,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, next_page: Option<String>) -> Self {
        PaginatedResult { items, next_page }
    }

    /// Whether another page can be fetched.
    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }
}

/// Appends the items of `fetched` to those of `current` and takes the next
/// page token from `fetched`. Nothing checks that `fetched` really is the page
/// `current.next_page` refers to, and items are never deduplicated: merging
/// the same page twice shows its items twice.
pub fn accumulate<T>(
    current: PaginatedResult<T>,
    fetched: PaginatedResult<T>,
) -> PaginatedResult<T> {
    let mut items = current.items;
    items.extend(fetched.items);
    PaginatedResult {
        items,
        next_page: fetched.next_page,
    }
}

/// The state of a list of posts which can be extended page by page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostListState<T> {
    /// Everything loaded so far.
    pub result: PaginatedResult<T>,

    /// Set while the page for `result.next_page` is being fetched.
    pub in_flight: bool,

    /// The message of the last failed fetch, cleared by the next attempt.
    pub notice: Option<String>,
}

/// Events which move a [`PostListState`] forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action<T> {
    /// The user asked for more posts.
    LoadMore,

    /// The requested page arrived.
    Loaded(PaginatedResult<T>),

    /// The requested page couldn't be fetched; carries the failure message.
    Failed(String),
}

impl<T> PostListState<T> {
    pub fn new(result: PaginatedResult<T>) -> Self {
        PostListState {
            result,
            in_flight: false,
            notice: None,
        }
    }

    /// The token of the page that should be fetched now, if any. This is
    /// `Some` only between an accepted [`Action::LoadMore`] and the
    /// [`Action::Loaded`] or [`Action::Failed`] that answers it.
    pub fn pending(&self) -> Option<&str> {
        match self.in_flight {
            true => self.result.next_page.as_deref(),
            false => None,
        }
    }

    /// Whether a "load more" control should be offered.
    pub fn can_load_more(&self) -> bool {
        !self.in_flight && self.result.has_more()
    }
}

/// Computes the state following `action`.
pub fn reduce<T>(state: PostListState<T>, action: Action<T>) -> PostListState<T> {
    match action {
        Action::LoadMore => match state.can_load_more() {
            true => PostListState {
                in_flight: true,
                notice: None,
                ..state
            },
            false => state,
        },
        Action::Loaded(page) => match state.in_flight {
            true => PostListState {
                result: accumulate(state.result, page),
                in_flight: false,
                notice: None,
            },
            // nobody asked for this page
            false => state,
        },
        Action::Failed(message) => match state.in_flight {
            true => PostListState {
                in_flight: false,
                notice: Some(message),
                ..state
            },
            false => state,
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn page(items: &[u32], next_page: Option<&str>) -> PaginatedResult<u32> {
        PaginatedResult::new(items.to_vec(), next_page.map(str::to_owned))
    }

    #[test]
    fn test_accumulate_concatenates_in_order() {
        let merged = accumulate(page(&[1, 2], Some("p2")), page(&[3, 4, 5], Some("p3")));
        assert_eq!(page(&[1, 2, 3, 4, 5], Some("p3")), merged);
    }

    #[test]
    fn test_accumulate_takes_fetched_token() {
        assert_eq!(None, accumulate(page(&[1], Some("p2")), page(&[2], None)).next_page);
        assert_eq!(
            Some(String::from("p9")),
            accumulate(page(&[], None), page(&[], Some("p9"))).next_page
        );
    }

    #[test]
    fn test_accumulate_keeps_duplicates() {
        let merged = accumulate(page(&[1], Some("p2")), page(&[1], None));
        assert_eq!(vec![1, 1], merged.items);
    }

    #[test]
    fn test_accumulate_is_associative() {
        let a = page(&[1, 2], Some("b"));
        let b = page(&[3, 4], Some("c"));
        let c = page(&[5], None);
        assert_eq!(
            accumulate(accumulate(a.clone(), b.clone()), c.clone()),
            accumulate(a, accumulate(b, c))
        );
    }

    #[test]
    fn test_accumulate_same_page_twice_duplicates() {
        let a = page(&[1, 2], Some("b"));
        let b = page(&[3, 4], Some("c"));
        let twice = accumulate(accumulate(a, b.clone()), b);
        assert_eq!(vec![1, 2, 3, 4, 3, 4], twice.items);
        assert_eq!(Some(String::from("c")), twice.next_page);
    }

    #[test]
    fn test_empty_string_token_is_not_exhaustion() {
        assert!(page(&[], Some("")).has_more());
        assert!(!page(&[], None).has_more());
    }

    #[test]
    fn test_reduce_load_more_then_loaded() {
        let state = PostListState::new(page(&[1, 2], Some("p2")));
        let state = reduce(state, Action::LoadMore);
        assert!(state.in_flight);
        assert_eq!(Some("p2"), state.pending());
        assert!(!state.can_load_more());

        let state = reduce(state, Action::Loaded(page(&[3, 4], None)));
        assert!(!state.in_flight);
        assert_eq!(page(&[1, 2, 3, 4], None), state.result);
        assert_eq!(None, state.pending());
        assert!(!state.can_load_more());
    }

    #[test]
    fn test_reduce_ignores_load_more_while_in_flight() {
        let state = reduce(PostListState::new(page(&[1], Some("p2"))), Action::LoadMore);
        let again = reduce(state.clone(), Action::LoadMore);
        assert_eq!(state, again);

        // only the first answer is merged
        let state = reduce(again, Action::Loaded(page(&[2], Some("p3"))));
        let state = reduce(state, Action::Loaded(page(&[2], Some("p3"))));
        assert_eq!(page(&[1, 2], Some("p3")), state.result);
    }

    #[test]
    fn test_reduce_load_more_when_exhausted_is_noop() {
        let state = PostListState::new(page(&[1], None));
        assert_eq!(state.clone(), reduce(state, Action::LoadMore));
    }

    #[test]
    fn test_reduce_failure_keeps_result() {
        let state = reduce(PostListState::new(page(&[1], Some("p2"))), Action::LoadMore);
        let state = reduce(state, Action::Failed(String::from("connection reset")));
        assert!(!state.in_flight);
        assert_eq!(page(&[1], Some("p2")), state.result);
        assert_eq!(Some(String::from("connection reset")), state.notice);

        // retrying clears the notice
        let state = reduce(state, Action::LoadMore);
        assert_eq!(None, state.notice);
        assert_eq!(Some("p2"), state.pending());
    }

    #[test]
    fn test_reduce_ignores_failure_when_idle() {
        let state = reduce(PostListState::new(page(&[1], Some("p2"))), Action::LoadMore);
        let state = reduce(state, Action::Loaded(page(&[2], Some("p3"))));
        let after = reduce(state.clone(), Action::Failed(String::from("late timeout")));
        assert_eq!(state, after);
        assert_eq!(None, after.notice);
    }
}
