//! `ScheduleStore` backed by a hosted PostgREST endpoint
//! (`<base>/rest/v1/<table>`), e.g. a Supabase project.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    domain::EntryId,
    store::{
        Column, Filter, FilterValue, ScheduleStore, SelectQuery, StoreFailure, StoreRow,
        SCHEDULE_TABLE,
    },
};
use tracing::{debug, warn};
use url::Url;

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: SCHEDULE_TABLE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct RestStore {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let endpoint = table_endpoint(&config.base_url, &config.table)?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, self.endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_rows(&self, query: &SelectQuery) -> Result<Vec<StoreRow>> {
        let response = self
            .request(Method::GET)
            .query(&select_params(query))
            .send()
            .await
            .context("select request failed")?;
        read_rows(response).await
    }

    async fn create_row(&self, row: StoreRow) -> Result<StoreRow> {
        let response = self
            .request(Method::POST)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&vec![Value::Object(row)])
            .send()
            .await
            .context("insert request failed")?;
        read_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert returned no row"))
    }

    async fn patch_row(&self, id: EntryId, patch: StoreRow) -> Result<Option<StoreRow>> {
        if patch.is_empty() {
            bail!("update for entry {id} has no fields");
        }
        let response = self
            .request(Method::PATCH)
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&[id_filter(id)])
            .json(&Value::Object(patch))
            .send()
            .await
            .with_context(|| format!("update request for entry {id} failed"))?;
        Ok(read_rows(response).await?.into_iter().next())
    }

    async fn remove_row(&self, id: EntryId) -> Result<bool> {
        let response = self
            .request(Method::DELETE)
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&[id_filter(id)])
            .send()
            .await
            .with_context(|| format!("delete request for entry {id} failed"))?;
        Ok(!read_rows(response).await?.is_empty())
    }

    async fn probe(&self) -> Result<()> {
        let response = self
            .request(Method::GET)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
            .context("ping request failed")?;
        read_rows(response).await.map(|_| ())
    }
}

#[async_trait]
impl ScheduleStore for RestStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<StoreRow>, StoreFailure> {
        debug!(endpoint = %self.endpoint, ?query, "rest select");
        self.fetch_rows(query).await.map_err(store_failure)
    }

    async fn insert(&self, row: StoreRow) -> Result<StoreRow, StoreFailure> {
        self.create_row(row).await.map_err(store_failure)
    }

    async fn update(
        &self,
        id: EntryId,
        patch: StoreRow,
    ) -> Result<Option<StoreRow>, StoreFailure> {
        self.patch_row(id, patch).await.map_err(store_failure)
    }

    async fn delete(&self, id: EntryId) -> Result<bool, StoreFailure> {
        self.remove_row(id).await.map_err(store_failure)
    }

    async fn ping(&self) -> Result<(), StoreFailure> {
        self.probe().await.map_err(store_failure)
    }
}

fn store_failure(err: anyhow::Error) -> StoreFailure {
    warn!(error = %format!("{err:#}"), "rest store operation failed");
    StoreFailure::new(format!("{err:#}"))
}

async fn read_rows(response: Response) -> Result<Vec<StoreRow>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("backend responded {status}: {}", body.trim());
    }
    let body = response.bytes().await.context("failed reading response body")?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&body).context("backend response is not an array of rows")
}

fn table_endpoint(base_url: &str, table: &str) -> Result<Url> {
    let mut base = Url::parse(base_url.trim())
        .with_context(|| format!("invalid store url '{base_url}'"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("rest/v1/{table}"))
        .with_context(|| format!("invalid table name '{table}'"))
}

fn id_filter(id: EntryId) -> (&'static str, String) {
    (Column::Id.as_str(), format!("eq.{}", id.0))
}

fn select_params(query: &SelectQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];
    for filter in &query.filters {
        match filter {
            Filter::Eq(column, FilterValue::Text(text)) => {
                params.push((column.as_str(), format!("eq.{text}")))
            }
            Filter::Eq(column, FilterValue::Integer(number)) => {
                params.push((column.as_str(), format!("eq.{number}")))
            }
            Filter::Gte(column, number) => params.push((column.as_str(), format!("gte.{number}"))),
        }
    }
    let order = query.order_by.map_or_else(
        || "id.asc".to_string(),
        |column| format!("{}.asc,id.asc", column.as_str()),
    );
    params.push(("order", order));
    params
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
