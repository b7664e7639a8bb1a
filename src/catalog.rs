//! Client for the Internet Game Database (<https://www.igdb.com>).

use crate::repository::{Item, ItemType};
use anyhow::{Context, Result};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

const IGDB_URL: &str = "https://api.igdb.com/v4/";
const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const SEARCH_LIMIT: usize = 20;

#[derive(Debug)]
pub struct Catalog {
    http: reqwest::Client,
    igdb_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    access_token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CatalogEntry {
    id: u64,
    name: String,
    slug: Option<String>,
}

impl CatalogEntry {
    fn into_item(self, kind: ItemType) -> Item {
        Item {
            kind,
            id: self.id,
            name: self.name,
            slug: self.slug,
        }
    }
}

impl Catalog {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_urls(IGDB_URL, TWITCH_TOKEN_URL, client_id, client_secret)
    }

    fn with_urls(
        igdb_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            igdb_url: igdb_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            access_token: RwLock::new(None),
        }
    }

    pub async fn find_item_by_id(&self, kind: ItemType, id: u64) -> Result<Option<Item>> {
        let entries = self.query(kind, by_id_query(id)).await?;

        Ok(entries.into_iter().next().map(|entry| entry.into_item(kind)))
    }

    /// Most recent releases first.
    pub async fn find_items_by_name(&self, kind: ItemType, name: &str) -> Result<Vec<Item>> {
        let entries = self.query(kind, by_name_query(name)).await?;

        Ok(entries
            .into_iter()
            .map(|entry| entry.into_item(kind))
            .collect())
    }

    async fn query(&self, kind: ItemType, body: String) -> Result<Vec<CatalogEntry>> {
        let url = endpoint(&self.igdb_url, kind);

        let mut response = self.post(&url, &body).await?;
        // Tokens expire every few weeks, renew once and retry.
        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("IGDB rejected access token");
            self.renew_access_token().await?;
            response = self.post(&url, &body).await?;
        }

        response
            .error_for_status()
            .with_context(|| format!("IGDB request to {} failed", url))?
            .json::<Vec<CatalogEntry>>()
            .await
            .context("Unexpected IGDB response")
    }

    async fn post(&self, url: &str, body: &str) -> Result<reqwest::Response> {
        let token = self.access_token.read().await.clone().unwrap_or_default();

        self.http
            .post(url)
            .header("Client-ID", &self.client_id)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::ACCEPT, "application/json")
            .body(body.to_string())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))
    }

    async fn renew_access_token(&self) -> Result<()> {
        log::info!("Renewing IGDB access token");

        let response = self
            .http
            .post(&self.token_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("Failed to reach Twitch")?
            .error_for_status()
            .context("Twitch refused to hand out an access token")?
            .json::<TokenResponse>()
            .await
            .context("Unexpected Twitch token response")?;

        *self.access_token.write().await = Some(response.access_token);
        Ok(())
    }
}

fn endpoint(base: &str, kind: ItemType) -> String {
    format!("{}{}s/", base, kind)
}

fn by_id_query(id: u64) -> String {
    format!("fields id,name; where id = {};", id)
}

fn by_name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "fields id,name,slug; sort first_release_date desc; limit {}; where name ~ *\"{}\"*;",
        SEARCH_LIMIT, escaped
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_stub::HttpStub;

    const UNAUTHORIZED: (u16, &str) = (401, r#"{"message": "Authorization Failure"}"#);
    const FRESH_TOKEN: (u16, &str) = (
        200,
        r#"{"access_token": "fresh", "expires_in": 5184000, "token_type": "bearer"}"#,
    );

    fn catalog(stub: &HttpStub) -> Catalog {
        Catalog::with_urls(
            format!("{}/v4/", stub.url),
            format!("{}/oauth2/token", stub.url),
            "id",
            "secret",
        )
    }

    #[test]
    fn endpoints_follow_item_type() {
        assert_eq!(
            endpoint(IGDB_URL, ItemType::Game),
            "https://api.igdb.com/v4/games/"
        );
        assert_eq!(
            endpoint(IGDB_URL, ItemType::Platform),
            "https://api.igdb.com/v4/platforms/"
        );
    }

    #[tokio::test]
    async fn expired_token_is_renewed() {
        let stub = HttpStub::serve(&[
            UNAUTHORIZED,
            FRESH_TOKEN,
            (
                200,
                r#"[{"id": 80207, "name": "Guilty Gear Strive", "slug": "guilty-gear-strive"}]"#,
            ),
        ])
        .await;

        let item = catalog(&stub)
            .find_item_by_id(ItemType::Game, 80207)
            .await
            .expect("retried with a fresh token");

        assert_eq!(
            item.map(|item| item.name).as_deref(),
            Some("Guilty Gear Strive")
        );
        let requests = stub.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("POST /v4/games/ "));
        assert!(requests[1].starts_with(
            "POST /oauth2/token?client_id=id&client_secret=secret&grant_type=client_credentials "
        ));
        assert!(requests[2].starts_with("POST /v4/games/ "));
        assert!(requests[2].to_lowercase().contains("authorization: bearer fresh"));
    }

    #[tokio::test]
    async fn token_is_renewed_only_once() {
        let stub = HttpStub::serve(&[UNAUTHORIZED, FRESH_TOKEN, UNAUTHORIZED]).await;

        let result = catalog(&stub)
            .find_items_by_name(ItemType::Game, "strive")
            .await;

        assert!(result.is_err());
        assert_eq!(stub.requests().len(), 3);
    }

    #[tokio::test]
    async fn server_errors_keep_the_token() {
        let stub = HttpStub::serve(&[(500, "{}"), FRESH_TOKEN]).await;

        let result = catalog(&stub)
            .find_items_by_name(ItemType::Platform, "pc")
            .await;

        assert!(result.is_err());
        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /v4/platforms/ "));
    }

    #[test]
    fn id_query() {
        assert_eq!(by_id_query(80207), "fields id,name; where id = 80207;");
    }

    #[test]
    fn name_query_searches_substrings() {
        assert_eq!(
            by_name_query("puyo tetris"),
            "fields id,name,slug; sort first_release_date desc; limit 20; where name ~ *\"puyo tetris\"*;"
        );
    }

    #[test]
    fn name_query_escapes_quotes() {
        assert!(by_name_query(r#"the "best" \ game"#).ends_with(r#"*"the \"best\" \\ game"*;"#));
    }

    #[test]
    fn entries_without_slug_parse() {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(r#"[{"id": 6, "name": "PC (Microsoft Windows)"}]"#).unwrap();
        let item = entries.into_iter().next().unwrap().into_item(ItemType::Platform);

        assert_eq!(item, Item::new(ItemType::Platform, 6, "PC (Microsoft Windows)"));
    }
}
