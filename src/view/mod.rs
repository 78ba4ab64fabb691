// view/mod.rs - Generic resource views
//
// A ResourceView binds one Resource type to a REST surface:
//   routes.rs   - endpoint name, route patterns, axum registration
//   dispatch.rs - request -> Operation, method and permission gates, session scope
//   handlers.rs - list/get/create/replace/delete against a session

pub mod dispatch;
pub mod handlers;
pub mod routes;

use axum::http::Method;
use once_cell::sync::OnceCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::database::Database;
use crate::permission::{Permission, PermissionEngine};
use crate::resource::Resource;

pub use dispatch::{Operation, ViewRequest};
pub use routes::RouteSpec;

/// Methods a view can be configured to serve.
pub const SUPPORTED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

/// Collaborators shared by every view of an application.
#[derive(Clone)]
pub struct ViewContext {
    pub config: ApiConfig,
    pub db: Arc<dyn Database>,
    pub permissions: Arc<dyn PermissionEngine>,
}

impl ViewContext {
    pub fn new(config: ApiConfig, db: Arc<dyn Database>, permissions: Arc<dyn PermissionEngine>) -> Self {
        Self { config, db, permissions }
    }
}

/// REST view over resource type `R`. Configure with the `with_*` methods, then
/// share it behind an `Arc`; it does not change after that.
pub struct ResourceView<R: Resource> {
    prefix: String,
    endpoint_override: Option<String>,
    endpoint: OnceCell<String>,
    allowed_methods: Vec<Method>,
    per_page: u64,
    permission: Permission,
    db: Arc<dyn Database>,
    permissions: Arc<dyn PermissionEngine>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> ResourceView<R> {
    /// GET only, the context's page size, `view`/`anybody` permission.
    pub fn new(ctx: &ViewContext) -> Self {
        Self {
            prefix: ctx.config.prefix.clone(),
            endpoint_override: None,
            endpoint: OnceCell::new(),
            allowed_methods: vec![Method::GET],
            per_page: ctx.config.per_page.max(1),
            permission: Permission::default(),
            db: Arc::clone(&ctx.db),
            permissions: Arc::clone(&ctx.permissions),
            _resource: PhantomData,
        }
    }

    /// Serve under `endpoint` instead of the lower-cased type name.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self.endpoint = OnceCell::new();
        self
    }

    /// Replace the allowed methods. Anything outside GET/POST/PUT/DELETE is dropped.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        let mut allowed = Vec::new();
        for method in methods {
            if !SUPPORTED_METHODS.contains(&method) {
                tracing::warn!("Ignoring unsupported method {} for {}", method, R::NAME);
                continue;
            }
            if !allowed.contains(&method) {
                allowed.push(method);
            }
        }
        self.allowed_methods = allowed;
        self
    }

    pub fn with_per_page(mut self, per_page: u64) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    /// Endpoint override, or the resource type name lower-cased.
    pub fn endpoint_name(&self) -> &str {
        self.endpoint.get_or_init(|| match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => R::NAME.to_lowercase(),
        })
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn permission(&self) -> &Permission {
        &self.permission
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
