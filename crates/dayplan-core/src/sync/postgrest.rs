//! Supabase REST (PostgREST) implementation of [`RemoteStore`].

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::auth::{check_status, OwnerId, SessionHandle};
use crate::models::RecordKind;
use crate::util::is_http_url;

/// Talks to `{project}/rest/v1/{table}` with the anon key and the signed-in
/// user's access token.
#[derive(Clone)]
pub struct PostgrestRemoteStore {
    rest_url: String,
    anon_key: String,
    client: Client,
    session: SessionHandle,
}

impl PostgrestRemoteStore {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        session: SessionHandle,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            client: Client::builder().build()?,
            session,
        })
    }

    fn table_url(&self, kind: RecordKind) -> String {
        format!("{}/{}", self.rest_url, kind.table())
    }

    fn authorized(&self, request: RequestBuilder) -> RemoteResult<RequestBuilder> {
        let token = self
            .session
            .access_token()
            .ok_or_else(|| RemoteError::Unavailable("no active auth session".to_string()))?;
        Ok(request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .header("Accept", "application/json"))
    }
}

impl RemoteStore for PostgrestRemoteStore {
    async fn select(&self, kind: RecordKind, owner: &OwnerId) -> RemoteResult<Vec<Value>> {
        let owner_filter = format!("eq.{owner}");
        let request = self.authorized(self.client.get(self.table_url(kind)).query(&[
            ("select", "*"),
            ("user_id", owner_filter.as_str()),
            ("order", "updated_at.desc"),
        ]))?;

        let response = check_status(request.send().await?)
            .await
            .map_err(RemoteError::Api)?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn upsert(&self, kind: RecordKind, owner: &OwnerId, rows: Vec<Value>) -> RemoteResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "Upserting {} {} rows for {}",
            rows.len(),
            kind.table(),
            owner
        );

        let request = self.authorized(
            self.client
                .post(self.table_url(kind))
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&rows),
        )?;

        check_status(request.send().await?)
            .await
            .map_err(RemoteError::Api)?;
        Ok(())
    }
}

pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}
