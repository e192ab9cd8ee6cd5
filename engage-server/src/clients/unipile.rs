use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};

use super::error::{ensure_success, ClientResult};
use super::{CommentPublisher, LeadSource, SearchPage};
use crate::config::Unipile;
use crate::normalize::{items_from_response, next_cursor};
use crate::resolver::canonical_identifier;

/// Unipile client for the LinkedIn account the pipeline acts as
#[derive(Clone)]
pub struct UnipileClient {
    client: Client,
    base_url: String,
    account_id: String,
    api_key: String,
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    account_id: &'a str,
    text: &'a str,
}

impl UnipileClient {
    pub fn new(settings: &Unipile) -> ClientResult<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url(),
            account_id: settings.account_id.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-API-KEY", &self.api_key)
            .header("accept", "application/json")
    }

    fn search_url(&self) -> String {
        format!("{}/api/v1/linkedin/search", self.base_url)
    }

    fn profile_url(&self, lead_id: &str) -> String {
        format!("{}/api/v1/users/{}", self.base_url, encode_segment(lead_id))
    }

    fn posts_url(&self, identifier: &str) -> String {
        format!("{}/api/v1/users/{}/posts", self.base_url, encode_segment(identifier))
    }

    fn comments_url(&self, social_id: &str) -> String {
        format!("{}/api/v1/posts/{}/comments", self.base_url, encode_social_id(social_id))
    }
}

#[async_trait]
impl LeadSource for UnipileClient {
    async fn search_page(&self, search_url: &str, cursor: Option<&str>) -> ClientResult<SearchPage> {
        let mut req = self
            .authorized(self.client.post(self.search_url()))
            .query(&[("account_id", self.account_id.as_str())]);
        if let Some(cursor) = cursor {
            req = req.query(&[("cursor", cursor)]);
        }
        let response = req.json(&json!({ "url": search_url })).send().await?;
        let data: Value = ensure_success(response).await?.json().await?;
        Ok(SearchPage {
            items: items_from_response(&data),
            cursor: next_cursor(&data),
        })
    }

    async fn resolve_lead(&self, lead_id: &str) -> ClientResult<Option<String>> {
        let response = self
            .authorized(self.client.get(self.profile_url(lead_id)))
            .query(&[
                ("account_id", self.account_id.as_str()),
                ("linkedin_api", "sales_navigator"),
                ("notify", "false"),
            ])
            .send()
            .await?;
        let data: Value = ensure_success(response).await?.json().await?;
        Ok(canonical_identifier(&data))
    }

    async fn list_posts(&self, identifier: &str, limit: u32) -> ClientResult<Vec<Value>> {
        let response = self
            .authorized(self.client.get(self.posts_url(identifier)))
            .query(&[("account_id", self.account_id.clone()), ("limit", limit.to_string())])
            .send()
            .await?;
        let data: Value = ensure_success(response).await?.json().await?;
        Ok(items_from_response(&data))
    }
}

#[async_trait]
impl CommentPublisher for UnipileClient {
    async fn publish_comment(&self, social_id: &str, text: &str) -> ClientResult<()> {
        let body = CommentRequest {
            account_id: &self.account_id,
            text,
        };
        let response = self
            .authorized(self.client.post(self.comments_url(social_id)))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Percent-encode an identifier for use as one path segment
pub fn encode_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Post URNs keep their colons in the comments path
pub fn encode_social_id(social_id: &str) -> String {
    urlencoding::encode(social_id).replace("%3A", ":")
}
