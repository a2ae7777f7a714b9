//! # JSON:API Surface
//!
//! Documents, error objects and request bodies in the JSON:API shape the
//! OnBase endpoints speak, plus the shared router state.
//!
//! ```text
//! { "links": { "self": ".../onbase/admissions/123456789" },
//!   "data":  { "id": "123456789", "type": "admissions",
//!              "attributes": { ... },
//!              "links": { "self": ".../onbase/admissions/123456789" } } }
//! ```

use std::sync::Arc;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use handled::Handle;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{OnBase, OnBaseError, ResourceKind};

/// Where developers can read about error codes.
pub const ERROR_REFERENCE_URL: &str =
    "https://developer.oregonstate.edu/documentation/error-reference";

//////////////////////////////////////////////// Documents /////////////////////////////////////////////

/// A `links` object with a single self link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    /// The self link.
    #[serde(rename = "self")]
    pub self_link: String,
}

/// A single resource object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource<T> {
    /// Resource identifier.
    pub id: String,
    /// Resource type name.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource attributes.
    pub attributes: T,
    /// Resource links.
    pub links: Links,
}

/// A top-level document holding one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    /// Top-level links.
    pub links: Links,
    /// The primary resource.
    pub data: Resource<T>,
}

impl ResourceKind {
    /// The JSON:API type name.
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceKind::Admission => "admissions",
            ResourceKind::FinancialAid => "financialAid",
            ResourceKind::Holds => "holds",
            ResourceKind::Document => "documents",
        }
    }

    /// The collection path below the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Admission => "onbase/admissions",
            ResourceKind::FinancialAid => "onbase/financial-aid",
            ResourceKind::Holds => "onbase/holds",
            ResourceKind::Document => "onbase/documents",
        }
    }
}

/// Builds self links and documents against an API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLinks {
    base_url: String,
}

impl ResourceLinks {
    /// Creates links rooted at `base_url` (trailing slashes are ignored).
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the collection for `kind`.
    pub fn collection(&self, kind: ResourceKind) -> String {
        format!("{}/{}", self.base_url, kind.path())
    }

    /// URL of the resource `id` of `kind`.
    pub fn resource(&self, kind: ResourceKind, id: &str) -> String {
        format!("{}/{}", self.collection(kind), id)
    }

    /// Serializes a person-scoped resource; the top-level self link is the resource.
    pub fn document<T>(&self, kind: ResourceKind, id: &str, attributes: T) -> Document<T> {
        let self_link = self.resource(kind, id);
        Document {
            links: Links {
                self_link: self_link.clone(),
            },
            data: Resource {
                id: id.to_string(),
                resource_type: kind.resource_type().to_string(),
                attributes,
                links: Links { self_link },
            },
        }
    }

    /// Serializes a newly created resource; the top-level self link is the collection.
    pub fn created<T>(&self, kind: ResourceKind, id: &str, attributes: T) -> Document<T> {
        let mut document = self.document(kind, id, attributes);
        document.links.self_link = self.collection(kind);
        document
    }
}

//////////////////////////////////////////////// Requests //////////////////////////////////////////////

/// The `data` member of a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData<T> {
    /// Resource identifier, required on PATCH.
    #[serde(default)]
    pub id: Option<String>,
    /// Resource type name.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Attributes to apply.
    pub attributes: T,
}

/// A JSON:API request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody<T> {
    /// The resource being sent.
    pub data: RequestData<T>,
}

/// Extracts a [`RequestBody`], rejecting malformed bodies with a JSON:API 400.
pub struct JsonApiBody<T>(pub RequestBody<T>);

#[async_trait]
impl<S, T> FromRequest<S> for JsonApiBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::bad_request(vec!["failed to read request body".to_string()]))?;
        let body = serde_json::from_slice::<RequestBody<T>>(&bytes)
            .map_err(|e| ApiError::bad_request(vec![format!("Invalid request body: {}", e)]))?;
        Ok(JsonApiBody(body))
    }
}

///////////////////////////////////////////////// Errors ///////////////////////////////////////////////

/// One JSON:API error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// HTTP status as a string.
    pub status: String,
    /// The status reason phrase.
    pub title: String,
    /// Application error code.
    pub code: String,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Link to the error reference.
    pub links: ErrorLinks,
}

/// Links of an error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLinks {
    /// Documentation for this error code.
    pub about: String,
}

/// A JSON:API error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    /// The errors.
    pub errors: Vec<ErrorObject>,
}

/// An error response: a status and the details shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code.
    pub status: StatusCode,
    /// One detail per reported reason.
    pub details: Vec<String>,
    /// Server-side context, logged but never returned.
    pub internal: Option<String>,
}

impl ApiError {
    /// 400 with every reason listed.
    pub fn bad_request(details: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            details,
            internal: None,
        }
    }

    /// 404 with a single reason.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            details: vec![detail.into()],
            internal: None,
        }
    }

    /// 409 with a single reason.
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            details: vec![detail.into()],
            internal: None,
        }
    }

    /// 500; `context` is logged only.
    pub fn internal(context: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            details: Vec::new(),
            internal: Some(context.into()),
        }
    }

    /// The error document for this error.
    pub fn document(&self) -> ErrorDocument {
        let code = format!("1{}", self.status.as_u16());
        let object = |detail: Option<String>| ErrorObject {
            status: self.status.as_u16().to_string(),
            title: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            code: code.clone(),
            detail,
            links: ErrorLinks {
                about: format!("{}#{}", ERROR_REFERENCE_URL, code),
            },
        };
        let errors = if self.details.is_empty() {
            vec![object(None)]
        } else {
            self.details.iter().cloned().map(Some).map(object).collect()
        };
        ErrorDocument { errors }
    }
}

impl From<OnBaseError> for ApiError {
    fn from(e: OnBaseError) -> Self {
        e.handle()
            .unwrap_or_else(|| ApiError::internal(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status.as_u16(),
                internal = ?self.internal,
                "server error response"
            );
        } else {
            tracing::warn!(
                status = %self.status.as_u16(),
                details = ?self.details,
                "client error response"
            );
        }
        (self.status, Json(self.document())).into_response()
    }
}

////////////////////////////////////////////////// State ///////////////////////////////////////////////

/// State shared by every OnBase route.
#[derive(Clone)]
pub struct AppState {
    /// The stored-procedure operations.
    pub onbase: Arc<OnBase>,
    /// Link builder for documents.
    pub links: ResourceLinks,
}

impl AppState {
    /// Creates router state.
    pub fn new(onbase: OnBase, links: ResourceLinks) -> Self {
        Self {
            onbase: Arc::new(onbase),
            links,
        }
    }
}

/// Rejects a body whose `data.id` disagrees with the path identifier.
pub fn ensure_matching_id<T>(path_id: &str, body: &RequestBody<T>) -> Result<(), ApiError> {
    if body.data.id.as_deref() == Some(path_id) {
        Ok(())
    } else {
        Err(ApiError::conflict(
            "OSU ID in path does not match the ID in body.",
        ))
    }
}
