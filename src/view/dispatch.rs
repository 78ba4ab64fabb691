use axum::{body::Bytes, http::Method};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::ResourceView;
use crate::api::{ApiResponse, ApiResult, Envelope};
use crate::database::RecordId;
use crate::error::ApiError;
use crate::permission::PermissionCheck;
use crate::resource::Resource;

/// An inbound request as the router hands it to a view.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub method: Method,
    /// Path id on item routes
    pub id: Option<String>,
    /// Raw `page` query parameter
    pub page: Option<String>,
    pub body: Bytes,
}

impl ViewRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            id: None,
            page: None,
            body: Bytes::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }
}

/// What a request asks the view to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List { page: u64 },
    Get { id: RecordId },
    Create { fields: Map<String, Value> },
    Replace { id: RecordId, fields: Map<String, Value> },
    Delete { id: RecordId },
}

impl Operation {
    /// Parse the id, page or body a method needs. The method must already be
    /// known to fit the route.
    fn parse(method: &Method, request: &ViewRequest) -> Result<Self, ApiError> {
        match (method, request.id.as_deref()) {
            (m, None) if *m == Method::GET => Ok(Operation::List {
                page: parse_page(request.page.as_deref())?,
            }),
            (m, None) if *m == Method::POST => Ok(Operation::Create {
                fields: parse_fields(&request.body)?,
            }),
            (m, Some(id)) if *m == Method::GET => Ok(Operation::Get { id: parse_id(id)? }),
            (m, Some(id)) if *m == Method::PUT => Ok(Operation::Replace {
                id: parse_id(id)?,
                fields: parse_fields(&request.body)?,
            }),
            (m, Some(id)) if *m == Method::DELETE => Ok(Operation::Delete { id: parse_id(id)? }),
            _ => Err(ApiError::internal_server_error(format!(
                "no operation for {} on this route",
                method
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::List { .. } => "list",
            Operation::Get { .. } => "get",
            Operation::Create { .. } => "create",
            Operation::Replace { .. } => "replace",
            Operation::Delete { .. } => "delete",
        }
    }
}

fn parse_page(raw: Option<&str>) -> Result<u64, ApiError> {
    match raw {
        None => Ok(1),
        Some(s) => match s.trim().parse::<u64>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => Err(ApiError::bad_request(format!(
                "page must be a positive integer, got '{}'",
                s
            ))),
        },
    }
}

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    raw.parse::<RecordId>()
        .map_err(|_| ApiError::bad_request(format!("invalid id '{}'", raw)))
}

fn parse_fields(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::invalid_json("Request body is empty"));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::invalid_json("Expected JSON object")),
        Err(e) => Err(ApiError::invalid_json(format!("Invalid JSON body: {}", e))),
    }
}

impl<R: Resource> ResourceView<R> {
    /// Methods that succeed on the collection route (`item == false`) or the item route.
    pub fn allowed_on(&self, item: bool) -> Vec<Method> {
        self.allowed_methods
            .iter()
            .filter(|m| {
                if item {
                    **m != Method::POST
                } else {
                    **m == Method::GET || **m == Method::POST
                }
            })
            .cloned()
            .collect()
    }

    /// Authorize and run one request inside its own session.
    ///
    /// A method the view doesn't allow on this route is rejected with 405
    /// before permissions or the store are consulted; a denied permission
    /// returns before a session is opened. The session commits only when the
    /// operation succeeds.
    pub async fn handle(&self, request: ViewRequest) -> ApiResult<Envelope> {
        let method = if request.method == Method::HEAD {
            Method::GET
        } else {
            request.method.clone()
        };

        let allowed = self.allowed_on(request.id.is_some());
        if !allowed.contains(&method) {
            debug!("{} {} rejected: method not allowed", method, self.endpoint_name());
            return Err(ApiError::method_not_allowed(&method, allowed));
        }

        let operation = Operation::parse(&method, &request)?;

        let check = PermissionCheck {
            resource: R::NAME,
            mode: &self.permission.mode,
            group: &self.permission.group,
        };
        if let Err(e) = self.permissions.check(&check).await {
            warn!("{} on {} denied: {}", operation.name(), self.endpoint_name(), e);
            return Err(e.into());
        }

        debug!("{} {} -> {}", method, self.endpoint_name(), operation.name());

        let mut session = self.db.session().await?;
        let envelope = self.execute(session.as_mut(), operation.clone()).await?;
        session.commit().await?;

        Ok(match operation {
            Operation::Create { .. } => ApiResponse::created(envelope),
            _ => ApiResponse::success(envelope),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    use crate::config::ApiConfig;
    use crate::models::Article;
    use crate::permission::{AllowAll, Permission, PermissionEngine};
    use crate::testing::{DenyAll, SpyDatabase};
    use crate::view::ViewContext;

    fn view_with(
        db: SpyDatabase,
        permissions: Arc<dyn PermissionEngine>,
        methods: Vec<Method>,
    ) -> ResourceView<Article> {
        let ctx = ViewContext::new(ApiConfig::default(), Arc::new(db), permissions);
        ResourceView::<Article>::new(&ctx).with_methods(methods)
    }

    fn all_methods() -> Vec<Method> {
        vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]
    }

    fn article(title: &str) -> Value {
        json!({"title": title, "body": "text", "published": false})
    }

    #[test]
    fn page_parsing() {
        assert_eq!(parse_page(None).unwrap(), 1);
        assert_eq!(parse_page(Some("4")).unwrap(), 4);
        assert!(parse_page(Some("0")).is_err());
        assert!(parse_page(Some("-1")).is_err());
        assert!(parse_page(Some("two")).is_err());
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(matches!(parse_fields(&Bytes::new()), Err(ApiError::InvalidJson(_))));
        assert!(matches!(parse_fields(&Bytes::from("[1]")), Err(ApiError::InvalidJson(_))));
        assert!(matches!(parse_fields(&Bytes::from("{nope")), Err(ApiError::InvalidJson(_))));
        assert_eq!(parse_fields(&Bytes::from("{\"a\":1}")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disallowed_method_never_reaches_the_store() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), vec![Method::GET]);

        let err = view
            .handle(ViewRequest::new(Method::POST).with_json(&article("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MethodNotAllowed { .. }));

        let err = view
            .handle(ViewRequest::new(Method::DELETE).with_id("1"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 405);
        assert_eq!(db.calls(), 0);
    }

    #[tokio::test]
    async fn put_on_collection_is_not_allowed() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), all_methods());
        let err = view.handle(ViewRequest::new(Method::PUT)).await.unwrap_err();
        match err {
            ApiError::MethodNotAllowed { allowed, .. } => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(db.calls(), 0);
    }

    #[tokio::test]
    async fn collection_get_requires_get_in_allowed_set() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), vec![Method::POST]);
        let err = view.handle(ViewRequest::new(Method::GET)).await.unwrap_err();
        assert_eq!(err.status_code(), 405);
        assert_eq!(err.to_json()["allowed"], serde_json::json!(["POST"]));
        assert_eq!(db.calls(), 0);
    }

    #[tokio::test]
    async fn permission_denial_short_circuits() {
        let db = SpyDatabase::new();
        let denier = Arc::new(DenyAll::default());
        let view = view_with(db.clone(), denier.clone(), all_methods())
            .with_permission(Permission::new("edit", "staff"));

        for request in [
            ViewRequest::new(Method::GET),
            ViewRequest::new(Method::POST).with_json(&article("x")),
            ViewRequest::new(Method::GET).with_id("1"),
            ViewRequest::new(Method::PUT).with_id("1").with_json(&article("y")),
            ViewRequest::new(Method::DELETE).with_id("1"),
        ] {
            let err = view.handle(request).await.unwrap_err();
            assert!(matches!(err, ApiError::Forbidden(_)));
        }

        assert_eq!(db.calls(), 0);
        assert_eq!(
            denier.seen(),
            vec![("Article".to_string(), "edit".to_string(), "staff".to_string()); 5]
        );
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), all_methods());

        let created = view
            .handle(ViewRequest::new(Method::POST).with_json(&article("hello")))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let Envelope::Item { data: created } = created.data else {
            panic!("expected item envelope");
        };
        assert_eq!(created["title"], "hello");
        assert!(created.get("link").is_none());

        let id = created["id"].as_i64().unwrap();
        let fetched = view
            .handle(ViewRequest::new(Method::GET).with_id(id.to_string()))
            .await
            .unwrap();
        assert_eq!(fetched.data, Envelope::Item { data: created });
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), all_methods());
        let err = view
            .handle(ViewRequest::new(Method::DELETE).with_id("404"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_request_rolls_back() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), all_methods());
        // missing required `title`
        let err = view
            .handle(ViewRequest::new(Method::POST).with_json(&json!({"body": "b"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnprocessableEntity(_)));
        assert_eq!(db.inner().len("article").await, 0);
    }

    #[tokio::test]
    async fn head_is_served_as_get() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), vec![Method::GET]);
        let response = view.handle(ViewRequest::new(Method::HEAD)).await.unwrap();
        assert!(matches!(response.data, Envelope::Page(_)));
    }

    #[tokio::test]
    async fn bad_id_is_rejected_before_the_store() {
        let db = SpyDatabase::new();
        let view = view_with(db.clone(), Arc::new(AllowAll), vec![Method::GET]);
        let err = view
            .handle(ViewRequest::new(Method::GET).with_id("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(db.calls(), 0);
    }
}
