//! TypeDB HTTP Backend
//!
//! Talks to the TypeDB 3 HTTP endpoint. Every write transaction is a
//! server-side transaction addressed by id, so many can be open on one
//! session at once.

use super::{Session, WriteTransaction};
use crate::error::BackendError;
use crate::query::InsertStatement;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenTransactionRequest<'a> {
    database_name: &'a str,
    transaction_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenTransactionResponse {
    transaction_id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

/// Authenticated handle on a TypeDB server
#[derive(Debug, Clone)]
pub struct TypeDbClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl TypeDbClient {
    pub async fn connect(base_url: &str, username: &str, password: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = http
            .post(format!("{}/v1/signin", base_url))
            .json(&SignInRequest { username, password })
            .send()
            .await?;
        let SignInResponse { token } = check(response).await?.json::<SignInResponse>().await?;

        info!("✅ Signed in to TypeDB at {}", base_url);
        Ok(Self { http, base_url, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<reqwest::Response, BackendError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/databases/{}", name)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    pub async fn create_database(&self, name: &str) -> Result<(), BackendError> {
        self.post_empty(&format!("/v1/databases/{}", name)).await?;
        info!("📦 Created database {}", name);
        Ok(())
    }

    pub async fn delete_database(&self, name: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(self.url(&format!("/v1/databases/{}", name)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await?;
        info!("🗑️  Deleted database {}", name);
        Ok(())
    }

    async fn open(&self, database: &str, transaction_type: &str) -> Result<String, BackendError> {
        let request = OpenTransactionRequest {
            database_name: database,
            transaction_type,
        };
        let response: OpenTransactionResponse = self
            .post_json("/v1/transactions/open", &request)
            .await?
            .json()
            .await?;
        debug!("Opened {} transaction {}", transaction_type, response.transaction_id);
        Ok(response.transaction_id)
    }

    async fn query(&self, transaction_id: &str, query: &str) -> Result<(), BackendError> {
        self.post_json(
            &format!("/v1/transactions/{}/query", transaction_id),
            &QueryRequest { query },
        )
        .await?;
        Ok(())
    }

    async fn commit(&self, transaction_id: &str) -> Result<(), BackendError> {
        self.post_empty(&format!("/v1/transactions/{}/commit", transaction_id))
            .await?;
        Ok(())
    }

    async fn close(&self, transaction_id: &str) -> Result<(), BackendError> {
        self.post_empty(&format!("/v1/transactions/{}/close", transaction_id))
            .await?;
        Ok(())
    }

    /// Close a transaction whose query or commit failed. The server
    /// discards everything it ran.
    async fn abandon(&self, transaction_id: &str) {
        if let Err(e) = self.close(transaction_id).await {
            warn!("Closing failed transaction {} also failed: {}", transaction_id, e);
        }
    }

    /// Commit, closing the transaction when the commit is refused.
    async fn commit_or_abandon(&self, transaction_id: &str) -> Result<(), BackendError> {
        if let Err(e) = self.commit(transaction_id).await {
            self.abandon(transaction_id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Run `schema` as a single define query in a schema transaction.
    pub async fn define_schema(&self, database: &str, schema: &str) -> Result<(), BackendError> {
        let id = self.open(database, "schema").await?;
        if let Err(e) = self.query(&id, schema).await {
            self.abandon(&id).await;
            return Err(e);
        }
        self.commit_or_abandon(&id).await?;
        info!("📐 Defined schema in {}", database);
        Ok(())
    }

    pub fn session(&self, database: &str) -> TypeDbSession {
        TypeDbSession {
            client: self.clone(),
            database: database.to_string(),
        }
    }
}

/// Data-write session on one database
#[derive(Debug, Clone)]
pub struct TypeDbSession {
    client: TypeDbClient,
    database: String,
}

pub struct TypeDbTransaction {
    client: TypeDbClient,
    id: String,
}

#[async_trait]
impl Session for TypeDbSession {
    type Transaction = TypeDbTransaction;

    fn database(&self) -> &str {
        &self.database
    }

    async fn open_write(&self) -> Result<TypeDbTransaction, BackendError> {
        let id = self.client.open(&self.database, "write").await?;
        Ok(TypeDbTransaction {
            client: self.client.clone(),
            id,
        })
    }
}

#[async_trait]
impl WriteTransaction for TypeDbTransaction {
    async fn insert(&mut self, statement: &InsertStatement) -> Result<(), BackendError> {
        self.client.query(&self.id, statement.as_str()).await
    }

    async fn commit(self) -> Result<(), BackendError> {
        self.client.commit_or_abandon(&self.id).await
    }

    async fn rollback(self) -> Result<(), BackendError> {
        self.client.close(&self.id).await
    }
}
