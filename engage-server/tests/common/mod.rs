// Shared fakes for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use engage_server::clients::{
    ClientError, ClientResult, CommentGenerator, CommentPublisher, LeadSource, Notifier,
    ReviewCard, SearchPage,
};
use engage_server::db::Database;
use engage_types::MessageRef;

pub fn memory_db() -> Database {
    let db = Database::in_memory().expect("Failed to create database");
    db.initialize().expect("Failed to initialize schema");
    db
}

/// One search page, fixed lookups and fixed feeds
#[derive(Default)]
pub struct ScriptedSource {
    pub people: Vec<Value>,
    pub resolutions: HashMap<String, String>,
    pub feeds: HashMap<String, Vec<Value>>,
}

#[async_trait]
impl LeadSource for ScriptedSource {
    async fn search_page(&self, _search_url: &str, cursor: Option<&str>) -> ClientResult<SearchPage> {
        match cursor {
            None => Ok(SearchPage {
                items: self.people.clone(),
                cursor: None,
            }),
            Some(_) => Err(ClientError::Api {
                status: 400,
                message: "unknown cursor".to_string(),
            }),
        }
    }

    async fn resolve_lead(&self, lead_id: &str) -> ClientResult<Option<String>> {
        Ok(self.resolutions.get(lead_id).cloned())
    }

    async fn list_posts(&self, identifier: &str, _limit: u32) -> ClientResult<Vec<Value>> {
        Ok(self.feeds.get(identifier).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommentPublisher for RecordingPublisher {
    async fn publish_comment(&self, social_id: &str, text: &str) -> ClientResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((social_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub closed: Mutex<Vec<(MessageRef, String)>>,
    pub editors: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_review(&self, card: &ReviewCard) -> ClientResult<MessageRef> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(card.social_id.clone());
        Ok(MessageRef::new("D42", format!("{}.000", sent.len())))
    }

    async fn refresh_review(
        &self,
        _message: &MessageRef,
        _card: &ReviewCard,
        _notice: &str,
    ) -> ClientResult<()> {
        Ok(())
    }

    async fn close_review(&self, message: &MessageRef, text: &str) -> ClientResult<()> {
        self.closed
            .lock()
            .unwrap()
            .push((message.clone(), text.to_string()));
        Ok(())
    }

    async fn open_editor(
        &self,
        _trigger_id: &str,
        social_id: &str,
        initial_text: &str,
    ) -> ClientResult<()> {
        self.editors
            .lock()
            .unwrap()
            .push((social_id.to_string(), initial_text.to_string()));
        Ok(())
    }
}

pub struct EchoGenerator;

#[async_trait]
impl CommentGenerator for EchoGenerator {
    async fn generate(&self, author: &str, post_text: &str) -> ClientResult<String> {
        Ok(format!("{}: loved \"{}\"", author, post_text))
    }
}
