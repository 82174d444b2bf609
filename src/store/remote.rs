// src/store/remote.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::{
    models::fields::Key,
    store::{Collection, Filter, RecordStore, StoreError, scalar_text},
};

/// Record store reached over a json-server style REST API:
/// `GET /{collection}?field=value`, `GET|PUT|DELETE /{collection}/{id}`,
/// `POST /{collection}`.
pub struct RemoteStore {
    client: Client,
    base: Url,
}

impl RemoteStore {
    pub fn new(base: Url) -> Result<Self, StoreError> {
        if base.cannot_be_a_base() {
            return Err(StoreError::InvalidInput(format!("{} cannot be a base URL", base)));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { client, base })
    }

    fn url(&self, collection: Collection, id: Option<&Key>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(collection.as_str());
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        url
    }

    async fn read_json(
        response: Response,
        collection: Collection,
        id: Option<&Key>,
    ) -> Result<Value, StoreError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                collection,
                id: id.cloned().unwrap_or_else(|| Key::new("*")),
            }),
            status if !status.is_success() => Err(StoreError::Unavailable(format!(
                "{} answered HTTP {}",
                response.url(),
                status
            ))),
            _ => Ok(response.json().await?),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn list(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> Result<Vec<Value>, StoreError> {
        let mut url = self.url(collection, None);
        if let Some(filter) = filter {
            let mut query = url.query_pairs_mut();
            for (field, value) in filter.clauses() {
                if let Some(text) = scalar_text(value) {
                    query.append_pair(field, &text);
                }
            }
        }

        let response = self.client.get(url).send().await?;
        match Self::read_json(response, collection, None).await? {
            // The server filters by string comparison; re-check with our rules.
            Value::Array(records) => Ok(records
                .into_iter()
                .filter(|r| filter.is_none_or(|f| f.matches(r)))
                .collect()),
            other => Err(StoreError::InvalidInput(format!(
                "{} did not return a list: {}",
                collection, other
            ))),
        }
    }

    async fn get(&self, collection: Collection, id: &Key) -> Result<Value, StoreError> {
        let response = self.client.get(self.url(collection, Some(id))).send().await?;
        Self::read_json(response, collection, Some(id)).await
    }

    async fn create(&self, collection: Collection, record: Value) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.url(collection, None))
            .json(&record)
            .send()
            .await?;
        Self::read_json(response, collection, None).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &Key,
        record: Value,
    ) -> Result<Value, StoreError> {
        let response = self
            .client
            .put(self.url(collection, Some(id)))
            .json(&record)
            .send()
            .await?;
        Self::read_json(response, collection, Some(id)).await
    }

    async fn delete(&self, collection: Collection, id: &Key) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.url(collection, Some(id)))
            .send()
            .await?;
        Self::read_json(response, collection, Some(id)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_collection_urls() {
        let store = RemoteStore::new(Url::parse("http://localhost:3001/").unwrap()).unwrap();
        assert_eq!(
            store.url(Collection::QuizResults, None).as_str(),
            "http://localhost:3001/quizResults"
        );
        assert_eq!(
            store.url(Collection::Subjects, Some(&Key::from(3))).as_str(),
            "http://localhost:3001/subjects/3"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        let store = RemoteStore::new(Url::parse("http://example.test/api").unwrap()).unwrap();
        assert_eq!(
            store.url(Collection::BatchSchedules, None).as_str(),
            "http://example.test/api/batchSchedules"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(RemoteStore::new(Url::parse("mailto:admin@example.test").unwrap()).is_err());
    }
}
