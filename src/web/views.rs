use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use serde::Deserialize;
use url::Url;

use super::AppState;
use crate::constants::{CARD_HEIGHT, CARD_WIDTH};
use crate::error::CardError;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ShareQuery {
    title: Option<String>,
    date: Option<String>,
    dest: Option<String>,
    data: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "share.html")]
pub(crate) struct ShareTemplate {
    pub(crate) site_name: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) image_url: String,
    pub(crate) image_width: u32,
    pub(crate) image_height: u32,
    pub(crate) redirect_url: String,
}

/// handles GET /share
pub(crate) async fn share_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ShareQuery>,
) -> Result<ShareTemplate, CardError> {
    let title = match non_empty(query.title.as_deref()) {
        Some(title) => format!("Roteiro: {title}"),
        None => format!("Meu Roteiro {}", state.brand),
    };
    let description = format!(
        "Confira os detalhes da viagem para {}.",
        non_empty(query.dest.as_deref()).unwrap_or("um destino incrível")
    );

    let image_url = cover_url(
        &headers,
        query.dest.as_deref().unwrap_or_default(),
        query.date.as_deref().unwrap_or_default(),
    )?;
    let redirect_url = app_redirect_url(&state.app_url, query.data.as_deref().unwrap_or_default())?;

    Ok(ShareTemplate {
        site_name: state.brand.clone(),
        title,
        description,
        image_url: image_url.into(),
        image_width: CARD_WIDTH,
        image_height: CARD_HEIGHT,
        redirect_url: redirect_url.into(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Absolute URL of the card for this request, as seen by the client.
fn cover_url(headers: &HeaderMap, dest: &str, date: &str) -> Result<Url, CardError> {
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.trim().is_empty())
        .ok_or_else(|| CardError::BadRequest("Missing Host header".to_string()))?;
    let proto = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or("http");

    let mut url = Url::parse(&format!("{proto}://{}/dynamic-cover", host.trim()))
        .map_err(|err| CardError::BadRequest(format!("Invalid Host header: {err}")))?;
    url.query_pairs_mut()
        .append_pair("dest", dest)
        .append_pair("date", date);
    Ok(url)
}

fn app_redirect_url(app_url: &str, data: &str) -> Result<Url, CardError> {
    let mut url = Url::parse(app_url)?;
    url.query_pairs_mut().append_pair("data", data);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::card::{CardBranding, CardRenderer};
    use crate::constants::DEFAULT_APP_URL;
    use crate::pipeline::ImagePipeline;
    use crate::web::create_router;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let renderer = CardRenderer::new(CardBranding {
            brand: "ddripp".to_string(),
            footer: String::new(),
            diagnostics: false,
        })
        .expect("renderer");
        AppState::new(
            ImagePipeline::new(Vec::new(), Arc::new(MemoryCache::new())),
            renderer,
            DEFAULT_APP_URL,
            "ddripp",
            "v1",
        )
    }

    async fn get(uri: &str, headers: &[(&str, &str)]) -> (StatusCode, String) {
        let app = create_router().with_state(state());
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn share_page_carries_open_graph_tags() {
        let (status, body) = get(
            "/share?title=Europa&dest=Paris&date=12%2F03&data=abc123",
            &[("host", "cards.example.org"), ("x-forwarded-proto", "https")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<meta property="og:title" content="Roteiro: Europa">"#));
        assert!(body.contains("Confira os detalhes da viagem para Paris."));
        assert!(body.contains(
            "https://cards.example.org/dynamic-cover?dest=Paris&amp;date=12%2F03"
        ));
        assert!(body.contains(r#"<meta property="og:image:width" content="1200">"#));
        assert!(body.contains(r#"<meta name="twitter:card" content="summary_large_image">"#));
        assert!(body.contains("ddripp-server/?data=abc123"));
    }

    #[tokio::test]
    async fn share_page_defaults() {
        let (status, body) = get("/share", &[("host", "localhost:3000")]).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Meu Roteiro ddripp"));
        assert!(body.contains("um destino incrível"));
        assert!(body.contains("http://localhost:3000/dynamic-cover?dest=&amp;date="));
    }

    #[tokio::test]
    async fn share_page_escapes_user_input() {
        let (_, body) = get(
            "/share?title=%3Cscript%3Ealert(1)%3C%2Fscript%3E&dest=%22%3E%3Cb%3E",
            &[("host", "cards.example.org")],
        )
        .await;
        assert!(!body.contains("<script>alert(1)</script>"));
        assert!(!body.contains("\"><b>"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn missing_host_is_bad_request() {
        let (status, _) = get("/share?dest=Paris", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forwarded_proto_only_accepts_http_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("cards.example.org"));
        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("javascript"));
        let url = cover_url(&headers, "Rio", "").expect("url");
        assert_eq!(url.scheme(), "http");

        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        let url = cover_url(&headers, "Rio", "").expect("url");
        assert_eq!(url.as_str(), "https://cards.example.org/dynamic-cover?dest=Rio&date=");
    }

    #[test]
    fn redirect_keeps_existing_query() {
        let url = app_redirect_url("https://app.example.org/?lang=pt", "x y").expect("url");
        assert_eq!(url.as_str(), "https://app.example.org/?lang=pt&data=x+y");
    }
}
