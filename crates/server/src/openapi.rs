use std::collections::HashMap;

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

#[derive(ToSchema)]
pub struct StatusDoc {
    pub status: String,
}

#[derive(ToSchema)]
pub struct ErrorDoc {
    pub success: bool,
    pub error: String,
}

#[derive(ToSchema)]
pub struct SetRequestDoc {
    pub key: String,
    /// Any JSON value, `null` included.
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(ToSchema)]
pub struct KeyValueDoc {
    pub success: bool,
    pub key: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(ToSchema)]
pub struct ExportDoc {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: HashMap<String, serde_json::Value>,
    pub count: usize,
}

#[derive(ToSchema)]
pub struct ImportRequestDoc {
    #[schema(value_type = Object)]
    pub data: HashMap<String, serde_json::Value>,
    /// Clear the store before importing.
    pub replace: Option<bool>,
}

#[derive(ToSchema)]
pub struct ImportResponseDoc {
    pub success: bool,
    pub imported: usize,
    /// `merge` or `replace`.
    pub mode: String,
}

/// Registers the `Authorization` header scheme referenced by protected routes.
struct ApiKeyAuth;

impl Modify for ApiKeyAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("Authorization"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::system::status,
        crate::routes::kv::set,
        crate::routes::kv::get,
        crate::routes::kv::delete,
        crate::routes::kv::export,
        crate::routes::kv::import,
        crate::routes::kv::dbfile,
    ),
    components(
        schemas(
            StatusDoc,
            ErrorDoc,
            SetRequestDoc,
            KeyValueDoc,
            ExportDoc,
            ImportRequestDoc,
            ImportResponseDoc,
        )
    ),
    modifiers(&ApiKeyAuth),
    tags(
        (name = "system"),
        (name = "kv")
    )
)]
pub struct ApiDoc;
