use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use docker_update_mgr::ports::RegistryPort;
use docker_update_mgr::registry::{ImageReference, RegistryClient, RegistryError};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serve `router` on an ephemeral local port and return its origin.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

async fn lookup(client: &RegistryClient, image: &str) -> Result<String, RegistryError> {
    client.manifest_digest(&ImageReference::parse(image)).await
}

fn token_route(hits: Arc<AtomicUsize>) -> axum::routing::MethodRouter {
    get(move |Query(params): Query<HashMap<String, String>>| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            assert_eq!(
                params.get("service").map(String::as_str),
                Some("registry.docker.io")
            );
            let scope = params.get("scope").cloned().unwrap_or_default();
            axum::Json(json!({ "token": format!("tok-{scope}") }))
        }
    })
}

async fn nginx_manifest(headers: HeaderMap) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if auth != Some("Bearer tok-repository:library/nginx:pull") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !accept.contains("application/vnd.oci.image.index.v1+json")
        || !accept.contains("application/vnd.docker.distribution.manifest.list.v2+json")
    {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }
    ([("Docker-Content-Digest", "sha256:nginx125")], "{}").into_response()
}

#[tokio::test]
async fn hub_manifest_uses_pull_token_and_accept_header() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/token", token_route(Arc::clone(&hits)))
        .route("/v2/library/nginx/manifests/1.25", get(nginx_manifest));
    let client = RegistryClient::with_base_url(TIMEOUT, &serve(router).await).expect("client");

    let digest = client
        .manifest_digest(&ImageReference::parse("nginx:1.25"))
        .await
        .expect("digest");

    assert_eq!(digest, "sha256:nginx125");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn other_registries_are_queried_without_a_token() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/token", token_route(Arc::clone(&hits)))
        .route(
            "/v2/acme/app/manifests/2.0",
            get(|headers: HeaderMap| async move {
                assert!(headers.get(header::AUTHORIZATION).is_none());
                [("Docker-Content-Digest", "sha256:app20")]
            }),
        );
    let client = RegistryClient::with_base_url(TIMEOUT, &serve(router).await).expect("client");

    let digest = client
        .manifest_digest(&ImageReference::parse("ghcr.io/acme/app:2.0"))
        .await
        .expect("digest");

    assert_eq!(digest, "sha256:app20");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn manifest_statuses_map_to_errors() {
    let router = Router::new()
        .route(
            "/v2/acme/private/manifests/1",
            get(|| async { StatusCode::UNAUTHORIZED }),
        )
        .route("/v2/acme/nodigest/manifests/1", get(|| async { "{}" }))
        .route(
            "/v2/acme/broken/manifests/1",
            get(|| async { StatusCode::BAD_GATEWAY }),
        );
    let client = RegistryClient::with_base_url(TIMEOUT, &serve(router).await).expect("client");

    assert!(matches!(
        lookup(&client, "ghcr.io/acme/private:1").await,
        Err(RegistryError::Unauthorized)
    ));
    assert!(matches!(
        lookup(&client, "ghcr.io/acme/missing:1").await,
        Err(RegistryError::NotFound)
    ));
    assert!(matches!(
        lookup(&client, "ghcr.io/acme/nodigest:1").await,
        Err(RegistryError::MissingDigest)
    ));
    assert!(matches!(
        lookup(&client, "ghcr.io/acme/broken:1").await,
        Err(RegistryError::Fetch(StatusCode::BAD_GATEWAY))
    ));
}

#[tokio::test]
async fn token_endpoint_failure_is_a_token_error() {
    let router =
        Router::new().route("/token", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let client = RegistryClient::with_base_url(TIMEOUT, &serve(router).await).expect("client");

    let err = client
        .manifest_digest(&ImageReference::parse("nginx:1.25"))
        .await
        .expect_err("no token");

    assert!(matches!(err, RegistryError::Token(_)));
}

#[tokio::test]
async fn slow_registry_times_out() {
    let router = Router::new().route(
        "/v2/acme/slow/manifests/1",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            [("Docker-Content-Digest", "sha256:late")]
        }),
    );
    let client = RegistryClient::with_base_url(Duration::from_millis(200), &serve(router).await)
        .expect("client");

    let err = client
        .manifest_digest(&ImageReference::parse("ghcr.io/acme/slow:1"))
        .await
        .expect_err("timed out");

    assert!(matches!(err, RegistryError::Timeout));
}

#[tokio::test]
async fn tags_are_sorted_and_failures_are_empty() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/token", token_route(Arc::clone(&hits)))
        .route(
            "/v2/library/redis/tags/list",
            get(|| async {
                axum::Json(json!({
                    "name": "library/redis",
                    "tags": ["6", "latest", "7.2", "alpine", "7.10"],
                }))
            }),
        )
        .route(
            "/v2/library/postgres/tags/list",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
    let client = RegistryClient::with_base_url(TIMEOUT, &serve(router).await).expect("client");

    let tags = client.list_tags(&ImageReference::parse("redis")).await;
    assert_eq!(tags.first().map(String::as_str), Some("latest"));
    assert_eq!(tags.len(), 5);
    let position = |tag: &str| tags.iter().position(|t| t == tag);
    assert!(position("7.10") < position("7.2"));
    assert!(position("7.2") < position("6"));

    assert!(client.list_tags(&ImageReference::parse("postgres")).await.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
