use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::{BillingStore, Result, StoreError};
use crate::models::{DocumentUsage, PaymentTransaction, Subscription, SubscribedUpdate, TrialUpdate, UserSubscription};

/// Billing tables in the hosted database, reached through its PostgREST API.
pub struct RestStore {
    http_client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(project_url: &str, service_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected(format!("{}: {}", status, body)));
        }
        Ok(response)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let response = self.send(self.request(Method::GET, table).query(query)).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidRow(e.to_string()))
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<()> {
        self.send(
            self.request(Method::POST, table)
                .header("Prefer", "return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl BillingStore for RestStore {
    fn driver(&self) -> &'static str {
        "rest"
    }

    async fn user_subscription(&self, user_id: &str) -> Result<Option<UserSubscription>> {
        let rows: Vec<UserSubscription> = self
            .select(
                "user_subscriptions",
                &[("user_id", eq(user_id)), ("select", "*".to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn mark_trial_used(&self, user_id: &str) -> Result<TrialUpdate> {
        match self.user_subscription(user_id).await? {
            Some(row) if row.subscription_active(Utc::now()) => Ok(TrialUpdate::AlreadySubscribed),
            Some(row) if row.free_trial_used => Ok(TrialUpdate::AlreadyUsed),
            Some(row) => {
                self.send(
                    self.request(Method::PATCH, "user_subscriptions")
                        .query(&[("id", eq(&row.id))])
                        .header("Prefer", "return=minimal")
                        .json(&json!({
                            "free_trial_used": true,
                            "updated_at": Utc::now(),
                        })),
                )
                .await?;
                tracing::debug!("Marked free trial used for {}", user_id);
                Ok(TrialUpdate::Marked)
            }
            None => {
                self.insert("user_subscriptions", &UserSubscription::trial_used(user_id)).await?;
                tracing::debug!("Created user subscription with free trial used for {}", user_id);
                Ok(TrialUpdate::Created)
            }
        }
    }

    async fn upsert_subscribed(&self, update: &SubscribedUpdate) -> Result<()> {
        // id and created_at are left to column defaults so a merge keeps the existing ones
        self.send(
            self.request(Method::POST, "user_subscriptions")
                .query(&[("on_conflict", "user_id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&json!({
                    "user_id": update.user_id,
                    "is_subscribed": true,
                    "payment_reference": update.payment_reference,
                    "subscription_start_date": update.subscription_start_date,
                    "subscription_end_date": update.subscription_end_date,
                    "updated_at": update.updated_at,
                })),
        )
        .await?;
        Ok(())
    }

    async fn subscription_by_reference(&self, payment_reference: &str) -> Result<Option<Subscription>> {
        let rows: Vec<Subscription> = self
            .select(
                "subscriptions",
                &[
                    ("payment_reference", eq(payment_reference)),
                    ("order", "created_at.asc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.insert("subscriptions", subscription).await
    }

    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        self.insert("payment_transactions", transaction).await
    }

    async fn transactions_for_user(&self, user_id: &str) -> Result<Vec<PaymentTransaction>> {
        self.select(
            "payment_transactions",
            &[("user_id", eq(user_id)), ("order", "created_at.desc".to_string())],
        )
        .await
    }

    async fn record_document(&self, document: &DocumentUsage) -> Result<()> {
        self.insert("document_usage", document).await
    }

    async fn documents_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<DocumentUsage>> {
        self.select(
            "document_usage",
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row_json(free_trial_used: bool, is_subscribed: bool) -> serde_json::Value {
        json!([{
            "id": "row-1",
            "user_id": "user-1",
            "free_trial_used": free_trial_used,
            "is_subscribed": is_subscribed,
            "payment_reference": null,
            "subscription_start_date": null,
            "subscription_end_date": null,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }])
    }

    #[tokio::test]
    async fn test_user_subscription_sends_service_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_subscriptions"))
            .and(query_param("user_id", "eq.user-1"))
            .and(header("apikey", "service"))
            .and(header("authorization", "Bearer service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(row_json(true, false)))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let row = store.user_subscription("user-1").await.unwrap().unwrap();
        assert_eq!(row.id, "row-1");
        assert!(row.free_trial_used);
    }

    #[tokio::test]
    async fn test_mark_trial_used_patches_existing_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(row_json(false, false)))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/user_subscriptions"))
            .and(query_param("id", "eq.row-1"))
            .and(body_partial_json(json!({"free_trial_used": true})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        assert_eq!(store.mark_trial_used("user-1").await.unwrap(), TrialUpdate::Marked);
    }

    #[tokio::test]
    async fn test_mark_trial_used_inserts_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_subscriptions"))
            .and(body_partial_json(json!({"user_id": "user-1", "free_trial_used": true, "is_subscribed": false})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        assert_eq!(store.mark_trial_used("user-1").await.unwrap(), TrialUpdate::Created);
    }

    #[tokio::test]
    async fn test_mark_trial_used_skips_subscribers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(row_json(false, true)))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        assert_eq!(store.mark_trial_used("user-1").await.unwrap(), TrialUpdate::AlreadySubscribed);
    }

    #[tokio::test]
    async fn test_mark_trial_used_patches_lapsed_subscriber() {
        let server = MockServer::start().await;
        let mut rows = row_json(false, true);
        rows[0]["subscription_end_date"] = json!("2024-01-01T00:00:00Z");
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/user_subscriptions"))
            .and(body_partial_json(json!({"free_trial_used": true})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        assert_eq!(store.mark_trial_used("user-1").await.unwrap(), TrialUpdate::Marked);
    }

    #[tokio::test]
    async fn test_upsert_merges_on_user_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_subscriptions"))
            .and(query_param("on_conflict", "user_id"))
            .and(header("prefer", "resolution=merge-duplicates,return=minimal"))
            .and(body_partial_json(json!({"user_id": "user-1", "is_subscribed": true, "payment_reference": "pay-1"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let sub = Subscription::new("user-1", "pay-1", 1400, 30);
        store.upsert_subscribed(&SubscribedUpdate::from_subscription(&sub)).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_request_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/subscriptions"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "service");
        let result = store.insert_subscription(&Subscription::new("user-1", "pay-1", 1400, 30)).await;
        match result {
            Err(StoreError::Rejected(message)) => assert!(message.contains("duplicate key")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
