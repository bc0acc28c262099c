//! Searchable, paginated view over a snapshot fetched once.
//!
//! The browser moves `Idle -> Loading -> Ready | Failed` exactly once, on
//! [`CollectionBrowser::activate`]. Search and paging only work in `Ready`
//! and never touch the source again.

use std::fmt;

use anyhow::bail;
use tracing::{debug, info, instrument, warn};

use crate::observer::{SubscriptionId, Subscribers};
use crate::pagination::{self, DEFAULT_PAGE_SIZE, PAGE_WINDOW};
use crate::post::Post;
use crate::remote::PostSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    PhaseChanged(Phase),
    QueryChanged { query: String, matching: usize },
    PageChanged(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSummary {
    pub showing: usize,
    pub matching: usize,
    pub available: usize,
    pub query: String,
}

#[derive(Debug)]
struct Snapshot {
    posts: Vec<Post>,
    // Indices into `posts` matching `applied_query`.
    filtered: Vec<usize>,
    applied_query: String,
}

impl Snapshot {
    fn new(posts: Vec<Post>) -> Self {
        let filtered = (0..posts.len()).collect();
        Self {
            posts,
            filtered,
            applied_query: String::new(),
        }
    }

    fn apply_query(&mut self, query: &str) {
        if self.applied_query == query {
            return;
        }
        let needle = query.to_lowercase();
        self.filtered = self
            .posts
            .iter()
            .enumerate()
            .filter(|(_, post)| post.matches_lowercase(&needle))
            .map(|(idx, _)| idx)
            .collect();
        self.applied_query = query.to_string();
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Loading,
    Ready(Snapshot),
    Failed(String),
}

#[derive(Debug)]
pub struct CollectionBrowser {
    state: State,
    query: String,
    page: usize,
    page_size: usize,
    subscribers: Subscribers<BrowserEvent>,
}

impl Default for CollectionBrowser {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CollectionBrowser {
    /// `page_size` of zero is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            state: State::Idle,
            query: String::new(),
            page: 1,
            page_size: page_size.max(1),
            subscribers: Subscribers::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Loading => Phase::Loading,
            State::Ready(_) => Phase::Ready,
            State::Failed(_) => Phase::Failed,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            State::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Runs the one fetch. Calls after the first are ignored.
    #[instrument(skip(self, source))]
    pub async fn activate<S: PostSource>(&mut self, source: &S) {
        if !matches!(self.state, State::Idle) {
            debug!(phase = %self.phase(), "browser already activated");
            return;
        }

        self.set_state(State::Loading);
        match source.fetch_posts().await {
            Ok(posts) => {
                info!(count = posts.len(), "posts snapshot ready");
                let mut snapshot = Snapshot::new(posts);
                snapshot.apply_query(&self.query);
                self.page = 1;
                self.set_state(State::Ready(snapshot));
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "failed to load posts");
                self.set_state(State::Failed(message));
            }
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    /// Filters by case-insensitive substring of title or body and returns
    /// to page 1.
    #[instrument(skip(self))]
    pub fn set_query(&mut self, query: &str) -> anyhow::Result<()> {
        let phase = self.phase();
        let State::Ready(snapshot) = &mut self.state else {
            bail!("posts are not loaded (state: {phase})");
        };

        snapshot.apply_query(query);
        let matching = snapshot.filtered.len();
        self.query = query.to_string();
        debug!(matching, "query applied");

        self.subscribers.notify(&BrowserEvent::QueryChanged {
            query: self.query.clone(),
            matching,
        });
        self.set_page(1);
        Ok(())
    }

    pub fn clear_query(&mut self) -> anyhow::Result<()> {
        self.set_query("")
    }

    /// Clamps `page` into `[1, total_pages]` and returns the page now shown.
    #[instrument(skip(self))]
    pub fn go_to_page(&mut self, page: i64) -> anyhow::Result<usize> {
        if !matches!(self.state, State::Ready(_)) {
            bail!("posts are not loaded (state: {})", self.phase());
        }
        let clamped = pagination::clamp_page(page, self.total_pages());
        if clamped as i64 != page {
            debug!(requested = page, clamped, "page clamped");
        }
        self.set_page(clamped);
        Ok(clamped)
    }

    pub fn next_page(&mut self) -> anyhow::Result<usize> {
        self.go_to_page(self.page as i64 + 1)
    }

    pub fn previous_page(&mut self) -> anyhow::Result<usize> {
        self.go_to_page(self.page as i64 - 1)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Full snapshot; empty unless ready.
    pub fn snapshot(&self) -> &[Post] {
        match &self.state {
            State::Ready(snapshot) => &snapshot.posts,
            _ => &[],
        }
    }

    pub fn filtered(&self) -> Vec<&Post> {
        match &self.state {
            State::Ready(snapshot) => snapshot
                .filtered
                .iter()
                .map(|&idx| &snapshot.posts[idx])
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn matching_count(&self) -> usize {
        match &self.state {
            State::Ready(snapshot) => snapshot.filtered.len(),
            _ => 0,
        }
    }

    pub fn total_pages(&self) -> usize {
        pagination::total_pages(self.matching_count(), self.page_size)
    }

    pub fn current_page_items(&self) -> Vec<&Post> {
        let State::Ready(snapshot) = &self.state else {
            return Vec::new();
        };
        let bounds = pagination::page_bounds(self.page, self.page_size, snapshot.filtered.len());
        snapshot.filtered[bounds]
            .iter()
            .map(|&idx| &snapshot.posts[idx])
            .collect()
    }

    pub fn page_window(&self) -> Vec<usize> {
        pagination::page_window(self.page, self.total_pages(), PAGE_WINDOW)
    }

    pub fn summary(&self) -> BrowserSummary {
        BrowserSummary {
            showing: self.current_page_items().len(),
            matching: self.matching_count(),
            available: self.snapshot().len(),
            query: self.query.clone(),
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&BrowserEvent) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
        let phase = self.phase();
        debug!(%phase, "browser phase changed");
        self.subscribers.notify(&BrowserEvent::PhaseChanged(phase));
    }

    fn set_page(&mut self, page: usize) {
        if self.page == page {
            return;
        }
        self.page = page;
        self.subscribers.notify(&BrowserEvent::PageChanged(page));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use anyhow::anyhow;

    use super::{BrowserEvent, CollectionBrowser, Phase};
    use crate::post::Post;
    use crate::remote::PostSource;

    struct FixedSource {
        posts: Vec<Post>,
        calls: Cell<usize>,
    }

    impl FixedSource {
        fn new(posts: Vec<Post>) -> Self {
            Self {
                posts,
                calls: Cell::new(0),
            }
        }
    }

    impl PostSource for FixedSource {
        async fn fetch_posts(&self) -> anyhow::Result<Vec<Post>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.posts.clone())
        }
    }

    struct FailingSource;

    impl PostSource for FailingSource {
        async fn fetch_posts(&self) -> anyhow::Result<Vec<Post>> {
            Err(anyhow!("HTTP error! status: 500"))
        }
    }

    fn numbered_posts(count: u64) -> Vec<Post> {
        (1..=count)
            .map(|id| Post {
                id,
                user_id: (id - 1) / 10 + 1,
                title: format!("post {id}"),
                body: format!("body of post {id}"),
            })
            .collect()
    }

    async fn ready_browser(posts: Vec<Post>) -> CollectionBrowser {
        let mut browser = CollectionBrowser::default();
        browser.activate(&FixedSource::new(posts)).await;
        assert_eq!(browser.phase(), Phase::Ready);
        browser
    }

    fn ids(posts: &[&Post]) -> Vec<u64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn idle_browser_has_empty_views_and_rejects_operations() {
        let mut browser = CollectionBrowser::default();
        assert_eq!(browser.phase(), Phase::Idle);
        assert!(browser.current_page_items().is_empty());
        assert_eq!(browser.total_pages(), 0);
        assert!(browser.set_query("x").is_err());
        assert!(browser.go_to_page(2).is_err());
        assert_eq!(browser.query(), "");
    }

    #[tokio::test]
    async fn fourteen_posts_split_into_three_pages() {
        let mut browser = ready_browser(numbered_posts(14)).await;

        assert_eq!(browser.total_pages(), 3);
        assert_eq!(ids(&browser.current_page_items()), vec![1, 2, 3, 4, 5, 6]);

        assert_eq!(browser.go_to_page(3).expect("page"), 3);
        assert_eq!(ids(&browser.current_page_items()), vec![13, 14]);
        assert!(!browser.has_next());
        assert!(browser.has_previous());
        assert_eq!(browser.page_window(), vec![1, 2, 3]);
        assert_eq!(
            browser.summary(),
            super::BrowserSummary {
                showing: 2,
                matching: 14,
                available: 14,
                query: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn out_of_range_pages_clamp() {
        let mut browser = ready_browser(numbered_posts(14)).await;

        assert_eq!(browser.go_to_page(0).expect("page"), 1);
        assert_eq!(browser.go_to_page(-7).expect("page"), 1);
        assert_eq!(browser.go_to_page(42).expect("page"), 3);
        assert_eq!(browser.next_page().expect("page"), 3);
        browser.go_to_page(1).expect("page");
        assert_eq!(browser.previous_page().expect("page"), 1);
    }

    #[tokio::test]
    async fn search_filters_case_insensitively_and_resets_page() {
        let mut posts = numbered_posts(20);
        posts[2].title = "Sunt aut facere".to_string();
        posts[9].body = "quia et SUNT rem".to_string();
        posts[17].title = "eum et est occaecati sunt".to_string();
        let mut browser = ready_browser(posts).await;

        browser.go_to_page(3).expect("page");
        browser.set_query("sunt").expect("query");

        assert_eq!(browser.current_page(), 1);
        assert_eq!(ids(&browser.filtered()), vec![3, 10, 18]);
        assert_eq!(browser.total_pages(), 1);
        assert_eq!(browser.query(), "sunt");

        browser.clear_query().expect("clear");
        assert_eq!(browser.matching_count(), 20);
    }

    #[tokio::test]
    async fn empty_result_set_holds_page_at_one() {
        let mut browser = ready_browser(numbered_posts(14)).await;
        browser.set_query("no such words").expect("query");

        assert_eq!(browser.total_pages(), 0);
        assert!(browser.current_page_items().is_empty());
        assert!(browser.page_window().is_empty());
        assert_eq!(browser.go_to_page(5).expect("page"), 1);
        assert!(!browser.has_next());
        assert!(!browser.has_previous());
    }

    #[tokio::test]
    async fn activation_fetches_only_once() {
        let source = FixedSource::new(numbered_posts(3));
        let mut browser = CollectionBrowser::default();

        browser.activate(&source).await;
        browser.activate(&source).await;
        browser.activate(&FailingSource).await;

        assert_eq!(source.calls.get(), 1);
        assert_eq!(browser.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn failure_is_terminal_with_message() {
        let mut browser = CollectionBrowser::default();
        browser.activate(&FailingSource).await;

        assert_eq!(browser.phase(), Phase::Failed);
        assert_eq!(browser.error_message(), Some("HTTP error! status: 500"));
        assert!(browser.set_query("x").is_err());

        let retry = FixedSource::new(numbered_posts(3));
        browser.activate(&retry).await;
        assert_eq!(retry.calls.get(), 0);
        assert_eq!(browser.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn window_slides_over_many_pages() {
        let mut browser = ready_browser(numbered_posts(100)).await;
        assert_eq!(browser.total_pages(), 17);
        assert_eq!(browser.page_window(), vec![1, 2, 3, 4, 5]);

        browser.go_to_page(10).expect("page");
        assert_eq!(browser.page_window(), vec![8, 9, 10, 11, 12]);

        browser.go_to_page(16).expect("page");
        assert_eq!(browser.page_window(), vec![13, 14, 15, 16, 17]);
    }

    #[tokio::test]
    async fn subscribers_follow_phase_query_and_page() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut browser = CollectionBrowser::new(6);
        {
            let events = Rc::clone(&events);
            browser.subscribe(move |event| events.borrow_mut().push(event.clone()));
        }

        browser.activate(&FixedSource::new(numbered_posts(14))).await;
        browser.go_to_page(2).expect("page");
        browser.go_to_page(2).expect("page");
        browser.set_query("post 1").expect("query");

        assert_eq!(
            *events.borrow(),
            vec![
                BrowserEvent::PhaseChanged(Phase::Loading),
                BrowserEvent::PhaseChanged(Phase::Ready),
                BrowserEvent::PageChanged(2),
                BrowserEvent::QueryChanged {
                    query: "post 1".to_string(),
                    matching: 6,
                },
                BrowserEvent::PageChanged(1),
            ]
        );
    }
}
