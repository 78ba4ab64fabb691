use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query,
    },
    http::Method,
    routing::{MethodFilter, MethodRouter},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{ResourceView, ViewRequest};
use crate::error::ApiError;
use crate::resource::Resource;

/// One route pattern and the methods registered on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSpec {
    pub pattern: String,
    #[serde(serialize_with = "serialize_methods")]
    pub methods: Vec<Method>,
}

fn serialize_methods<S: serde::Serializer>(methods: &[Method], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(methods.iter().map(Method::as_str))
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    if *method == Method::GET {
        Some(MethodFilter::GET)
    } else if *method == Method::POST {
        Some(MethodFilter::POST)
    } else if *method == Method::PUT {
        Some(MethodFilter::PUT)
    } else if *method == Method::DELETE {
        Some(MethodFilter::DELETE)
    } else {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-indexed page number, parsed by the dispatcher
    pub page: Option<String>,
}

impl<R: Resource> ResourceView<R> {
    /// The collection route (GET, plus POST when allowed) and the item route
    /// (every allowed method but POST), in that order. Collection GET is
    /// always registered; the dispatcher answers it with 405 unless GET is
    /// in the allowed set.
    pub fn routes(&self) -> Vec<RouteSpec> {
        let endpoint = self.endpoint_name();

        let mut collection = vec![Method::GET];
        if self.allowed_methods.contains(&Method::POST) {
            collection.push(Method::POST);
        }

        let item = self
            .allowed_methods
            .iter()
            .filter(|m| **m != Method::POST)
            .cloned()
            .collect();

        vec![
            RouteSpec {
                pattern: format!("/{}", endpoint),
                methods: collection,
            },
            RouteSpec {
                pattern: format!("/{}/:id", endpoint),
                methods: item,
            },
        ]
    }

    /// Axum router serving both routes. Methods missing from a route still
    /// reach the dispatcher so they get a JSON 405, and extractor rejections
    /// become JSON 400s.
    pub fn router(self: &Arc<Self>) -> Router {
        let routes = self.routes();
        info!("Building routes for {}: {:?}", R::NAME, routes);

        let view = Arc::clone(self);
        let collection = move |method: Method, query: Result<Query<PageQuery>, QueryRejection>, body: Bytes| {
            let view = Arc::clone(&view);
            async move {
                let query = match query {
                    Ok(Query(query)) => query,
                    Err(rejection) => return Err(ApiError::bad_request(rejection.body_text())),
                };
                view.handle(ViewRequest {
                    method,
                    id: None,
                    page: query.page,
                    body,
                })
                .await
            }
        };

        let view = Arc::clone(self);
        let item = move |method: Method, id: Result<Path<String>, PathRejection>, body: Bytes| {
            let view = Arc::clone(&view);
            async move {
                let id = match id {
                    Ok(Path(id)) => id,
                    Err(rejection) => return Err(ApiError::bad_request(rejection.body_text())),
                };
                view.handle(ViewRequest {
                    method,
                    id: Some(id),
                    page: None,
                    body,
                })
                .await
            }
        };

        let mut router = Router::new();
        for (index, spec) in routes.into_iter().enumerate() {
            let mut method_router = MethodRouter::new();
            for method in spec.methods {
                let Some(filter) = method_filter(&method) else {
                    continue;
                };
                method_router = if index == 0 {
                    method_router.on(filter, collection.clone())
                } else {
                    method_router.on(filter, item.clone())
                };
            }
            method_router = if index == 0 {
                method_router.fallback(collection.clone())
            } else {
                method_router.fallback(item.clone())
            };
            router = router.route(&spec.pattern, method_router);
        }
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::database::MemoryDatabase;
    use crate::models::Article;
    use crate::permission::AllowAll;
    use crate::view::ViewContext;

    fn view(methods: Vec<Method>) -> ResourceView<Article> {
        let ctx = ViewContext::new(ApiConfig::default(), Arc::new(MemoryDatabase::new()), Arc::new(AllowAll));
        ResourceView::<Article>::new(&ctx).with_methods(methods)
    }

    #[test]
    fn get_only() {
        let routes = view(vec![Method::GET]).routes();
        assert_eq!(
            routes,
            vec![
                RouteSpec { pattern: "/article".into(), methods: vec![Method::GET] },
                RouteSpec { pattern: "/article/:id".into(), methods: vec![Method::GET] },
            ]
        );
    }

    #[test]
    fn post_is_collection_only() {
        let routes = view(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]).routes();
        assert_eq!(routes[0].methods, vec![Method::GET, Method::POST]);
        assert_eq!(routes[1].methods, vec![Method::GET, Method::PUT, Method::DELETE]);
    }

    #[test]
    fn collection_always_has_get() {
        let routes = view(vec![Method::POST]).routes();
        assert_eq!(routes[0].methods, vec![Method::GET, Method::POST]);
        assert!(routes[1].methods.is_empty());
    }

    #[test]
    fn override_flows_into_patterns() {
        let routes = view(vec![Method::GET]).with_endpoint("posts").routes();
        assert_eq!(routes[0].pattern, "/posts");
        assert_eq!(routes[1].pattern, "/posts/:id");
    }

    #[test]
    fn route_spec_serializes_method_names() {
        let spec = RouteSpec { pattern: "/a".into(), methods: vec![Method::GET, Method::POST] };
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            serde_json::json!({"pattern": "/a", "methods": ["GET", "POST"]})
        );
    }
}
