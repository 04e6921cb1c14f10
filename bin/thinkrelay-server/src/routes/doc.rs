use utoipa::OpenApi;

use crate::routes::{auth, health, models, relay};

#[derive(OpenApi)]
#[openapi(info(
    title = "thinkrelay-server",
    description = "Authenticated streaming relay for reasoning chat models",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(auth::AuthApi::openapi());
    root.merge(models::ModelsApi::openapi());
    root.merge(relay::RelayApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = get_docs();
        let paths =
            ["/", "/health", "/register", "/login", "/getToken", "/api", "/models", "/relay"];
        for path in paths {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from OpenAPI document");
        }
    }
}
