use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use resource_rest::database::MemoryDatabase;
use resource_rest::models::{Article, Author};
use resource_rest::permission::{Permission, PermissionEngine, StaticGrants};
use resource_rest::{ApiBuilder, ApiConfig, ViewContext};

pub struct TestServer {
    pub base_url: String,
    pub db: MemoryDatabase,
}

/// Serve Article (all methods) and Author (GET/POST, `edit`/`staff` permission)
/// on a free port for the lifetime of the calling test's runtime.
pub async fn spawn_server(config: ApiConfig, permissions: Arc<dyn PermissionEngine>) -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let db = MemoryDatabase::new();
    let ctx = ViewContext::new(config, Arc::new(db.clone()), permissions);
    let app = ApiBuilder::new(ctx)
        .resource::<Article>(|v| v.with_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]))
        .resource::<Author>(|v| {
            v.with_methods([Method::GET, Method::POST])
                .with_permission(Permission::new("edit", "staff"))
        })
        .build();

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test port")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer { base_url, db })
}

pub async fn default_server() -> Result<TestServer> {
    let grants = StaticGrants::new()
        .grant("*", "view", "anybody")
        .grant("Author", "edit", "staff");
    spawn_server(ApiConfig::default(), Arc::new(grants)).await
}
