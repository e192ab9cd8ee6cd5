//! In-memory fakes of the external collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use engage_types::MessageRef;

use crate::clients::{
    ClientError, ClientResult, CommentGenerator, CommentPublisher, LeadSource, Notifier,
    ReviewCard, SearchPage,
};

fn unavailable() -> ClientError {
    ClientError::Api {
        status: 503,
        message: "unavailable".to_string(),
    }
}

/// Search pages chained by cursor, lookups and post feeds
#[derive(Default)]
pub struct FakeSource {
    pages: Vec<(Vec<Value>, Option<String>)>,
    resolutions: HashMap<String, String>,
    failing_lookups: HashSet<String>,
    posts: HashMap<String, Vec<Value>>,
    failing_feeds: HashSet<String>,
    lookup_calls: Mutex<HashMap<String, usize>>,
}

impl FakeSource {
    pub fn with_page(mut self, items: Vec<Value>, cursor: Option<&str>) -> Self {
        self.pages.push((items, cursor.map(str::to_string)));
        self
    }

    pub fn with_resolution(mut self, lead_id: &str, identifier: &str) -> Self {
        self.resolutions
            .insert(lead_id.to_string(), identifier.to_string());
        self
    }

    pub fn failing_lookup(mut self, lead_id: &str) -> Self {
        self.failing_lookups.insert(lead_id.to_string());
        self
    }

    pub fn with_posts(mut self, identifier: &str, posts: Vec<Value>) -> Self {
        self.posts.insert(identifier.to_string(), posts);
        self
    }

    pub fn failing_feed(mut self, identifier: &str) -> Self {
        self.failing_feeds.insert(identifier.to_string());
        self
    }

    pub fn lookups(&self, lead_id: &str) -> usize {
        self.lookup_calls
            .lock()
            .unwrap()
            .get(lead_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl LeadSource for FakeSource {
    async fn search_page(&self, _search_url: &str, cursor: Option<&str>) -> ClientResult<SearchPage> {
        let index = match cursor {
            None => Some(0),
            Some(c) => self
                .pages
                .iter()
                .position(|(_, next)| next.as_deref() == Some(c))
                .map(|i| i + 1),
        };
        let (items, cursor) = index
            .and_then(|i| self.pages.get(i))
            .cloned()
            .ok_or_else(unavailable)?;
        Ok(SearchPage { items, cursor })
    }

    async fn resolve_lead(&self, lead_id: &str) -> ClientResult<Option<String>> {
        *self
            .lookup_calls
            .lock()
            .unwrap()
            .entry(lead_id.to_string())
            .or_default() += 1;
        if self.failing_lookups.contains(lead_id) {
            return Err(unavailable());
        }
        Ok(self.resolutions.get(lead_id).cloned())
    }

    async fn list_posts(&self, identifier: &str, limit: u32) -> ClientResult<Vec<Value>> {
        if self.failing_feeds.contains(identifier) {
            return Err(unavailable());
        }
        Ok(self
            .posts
            .get(identifier)
            .map(|posts| posts.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}

/// Records publishes; can be switched to fail
#[derive(Default)]
pub struct FakePublisher {
    pub published: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl FakePublisher {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommentPublisher for FakePublisher {
    async fn publish_comment(&self, social_id: &str, text: &str) -> ClientResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(unavailable());
        }
        self.published
            .lock()
            .unwrap()
            .push((social_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Sent(String),
    Refreshed { ts: String, notice: String },
    Closed { ts: String, text: String },
    EditorOpened { social_id: String, initial_text: String },
}

/// Records every call; message refs are `("D1", "<n>.0")`
#[derive(Default)]
pub struct FakeNotifier {
    pub events: Mutex<Vec<NotifierEvent>>,
    pub fail: Mutex<bool>,
}

impl FakeNotifier {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: NotifierEvent) -> ClientResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(unavailable());
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_review(&self, card: &ReviewCard) -> ClientResult<MessageRef> {
        self.record(NotifierEvent::Sent(card.social_id.clone()))?;
        let n = self.events.lock().unwrap().len();
        Ok(MessageRef::new("D1", format!("{}.0", n)))
    }

    async fn refresh_review(
        &self,
        message: &MessageRef,
        _card: &ReviewCard,
        notice: &str,
    ) -> ClientResult<()> {
        self.record(NotifierEvent::Refreshed {
            ts: message.ts.clone(),
            notice: notice.to_string(),
        })
    }

    async fn close_review(&self, message: &MessageRef, text: &str) -> ClientResult<()> {
        self.record(NotifierEvent::Closed {
            ts: message.ts.clone(),
            text: text.to_string(),
        })
    }

    async fn open_editor(
        &self,
        _trigger_id: &str,
        social_id: &str,
        initial_text: &str,
    ) -> ClientResult<()> {
        self.record(NotifierEvent::EditorOpened {
            social_id: social_id.to_string(),
            initial_text: initial_text.to_string(),
        })
    }
}

/// Drafts "Draft for <author>"; fails for authors in `failing`
#[derive(Default)]
pub struct FakeGenerator {
    pub failing: HashSet<String>,
}

#[async_trait]
impl CommentGenerator for FakeGenerator {
    async fn generate(&self, author: &str, _post_text: &str) -> ClientResult<String> {
        if self.failing.contains(author) {
            return Err(unavailable());
        }
        Ok(format!("Draft for {}", author))
    }
}
