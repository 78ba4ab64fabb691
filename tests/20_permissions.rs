mod common;

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use resource_rest::permission::StaticGrants;
use resource_rest::ApiConfig;
use serde_json::{json, Value};

#[tokio::test]
async fn denied_group_gets_403_and_no_write() -> Result<()> {
    // Author demands edit/staff, which is not granted here
    let grants = StaticGrants::new().grant("*", "view", "anybody");
    let server = common::spawn_server(ApiConfig::default(), Arc::new(grants)).await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/author", server.base_url))
        .json(&json!({"name": "Ada"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await?["code"], "FORBIDDEN");
    assert_eq!(server.db.len("author").await, 0);

    let res = client.get(format!("{}/article", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn granted_group_can_write() -> Result<()> {
    let server = common::default_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/author", server.base_url))
        .json(&json!({"name": "Ada", "email": "ada@example.com"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(server.db.len("author").await, 1);

    Ok(())
}

#[tokio::test]
async fn prefixed_links() -> Result<()> {
    let grants = StaticGrants::new().grant("*", "view", "anybody");
    let server = common::spawn_server(ApiConfig::with_prefix("/api/v1/"), Arc::new(grants)).await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/article", server.base_url))
        .json(&json!({"title": "t"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = client
        .get(format!("{}/api/v1/article", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["data"][0]["link"], "/api/v1/article/1");

    let health = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(health.status(), StatusCode::OK);

    Ok(())
}
