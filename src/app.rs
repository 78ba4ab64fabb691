use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::resource::Resource;
use crate::view::{ResourceView, RouteSpec, ViewContext};

/// Object-safe face of a [`ResourceView`], so views of different resource
/// types can be mounted together.
pub trait ResourceRoutes: Send + Sync {
    fn resource_name(&self) -> &'static str;
    fn endpoint_name(&self) -> &str;
    fn routes(&self) -> Vec<RouteSpec>;
    fn router(self: Arc<Self>) -> Router;
}

impl<R: Resource> ResourceRoutes for ResourceView<R> {
    fn resource_name(&self) -> &'static str {
        R::NAME
    }

    fn endpoint_name(&self) -> &str {
        ResourceView::endpoint_name(self)
    }

    fn routes(&self) -> Vec<RouteSpec> {
        ResourceView::routes(self)
    }

    fn router(self: Arc<Self>) -> Router {
        ResourceView::router(&self)
    }
}

/// Collects resource views and assembles the application router.
pub struct ApiBuilder {
    ctx: ViewContext,
    views: Vec<Arc<dyn ResourceRoutes>>,
}

impl ApiBuilder {
    pub fn new(ctx: ViewContext) -> Self {
        Self { ctx, views: Vec::new() }
    }

    pub fn context(&self) -> &ViewContext {
        &self.ctx
    }

    pub fn views(&self) -> &[Arc<dyn ResourceRoutes>] {
        &self.views
    }

    /// Add a view, starting from its defaults and letting `configure` adjust it.
    pub fn resource<R: Resource>(
        mut self,
        configure: impl FnOnce(ResourceView<R>) -> ResourceView<R>,
    ) -> Self {
        let view = configure(ResourceView::new(&self.ctx));
        self.views.push(Arc::new(view));
        self
    }

    /// Resource routes plus `GET /` (index), nested under the configured
    /// prefix, and `GET /health` at the root.
    pub fn build(self) -> Router {
        let index = Arc::new(index_document(&self.views));
        let mut api = Router::new().route(
            "/",
            get(move || {
                let index = Arc::clone(&index);
                async move { Json((*index).clone()) }
            }),
        );
        for view in &self.views {
            api = api.merge(Arc::clone(view).router());
        }

        let db = Arc::clone(&self.ctx.db);
        let health_route = get(move || {
            let db = Arc::clone(&db);
            async move { health(db.as_ref()).await }
        });

        let mut app = match self.ctx.config.mount_path() {
            Some(mount) => Router::new().nest(&mount, api),
            None => api,
        }
        .route("/health", health_route)
        .layer(CorsLayer::permissive());

        if self.ctx.config.enable_request_logging {
            app = app.layer(TraceLayer::new_for_http());
        }
        app
    }
}

fn index_document(views: &[Arc<dyn ResourceRoutes>]) -> Value {
    let resources: Vec<Value> = views
        .iter()
        .map(|view| {
            json!({
                "resource": view.resource_name(),
                "endpoint": view.endpoint_name(),
                "routes": view.routes(),
            })
        })
        .collect();

    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "resources": resources,
    })
}

async fn health(db: &dyn crate::database::Database) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
