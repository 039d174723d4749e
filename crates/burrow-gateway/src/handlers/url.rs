use crate::error::{AppError, Result};
use crate::extract::CreatorIp;
use crate::model::{OutputFormat, ShortenForm, ShortenResponse, XmlShortenResponse};
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use burrow_core::{ShortenRequest, UrlRecord};
use tracing::{info, warn};

pub async fn redirect_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let record = state.store().fetch(&id).await?;

    if let Err(e) = state.store().record_visit(&record).await {
        warn!(id = %record.id, error = %e, "Failed to register visit");
    }

    Ok((StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, record.url)]).into_response())
}

pub async fn shorten_form_handler(
    State(state): State<AppState>,
    CreatorIp(creator_ip): CreatorIp,
    headers: HeaderMap,
    Form(form): Form<ShortenForm>,
) -> Result<Response> {
    shorten(&state, &headers, &form.url, creator_ip).await
}

/// Shortens the URL given in the path. The request's query string belongs to
/// that URL and is put back on it.
pub async fn shorten_path_handler(
    State(state): State<AppState>,
    CreatorIp(creator_ip): CreatorIp,
    headers: HeaderMap,
    Path(url): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let url = match query {
        Some(query) if !query.is_empty() => format!("{}?{}", url, query),
        _ => url,
    };
    shorten(&state, &headers, &url, creator_ip).await
}

pub async fn lookup_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let record = state.store().fetch(&id).await?;
    render(&state, &headers, &record)
}

async fn shorten(
    state: &AppState,
    headers: &HeaderMap,
    url: &str,
    creator_ip: String,
) -> Result<Response> {
    let request = ShortenRequest::new(&with_scheme(url), creator_ip)?;
    let record = state.store().store(request).await?;
    info!(url = %record.url, id = %record.id, "Stored shortened url");
    render(state, headers, &record)
}

/// Schemeless input such as `example.com/a` is taken to be plain HTTP.
fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

fn render(state: &AppState, headers: &HeaderMap, record: &UrlRecord) -> Result<Response> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    let response = ShortenResponse::new(record, state.short_url(&record.id, host));

    match OutputFormat::negotiate(headers) {
        OutputFormat::Json => Ok(Json(response).into_response()),
        OutputFormat::Xml => {
            let body = quick_xml::se::to_string(&XmlShortenResponse::from(response))
                .map_err(|e| AppError::Render(e.to_string()))?;
            Ok(([(header::CONTENT_TYPE, "text/xml")], body).into_response())
        }
        OutputFormat::Plain => {
            Ok(([(header::CONTENT_TYPE, "text/plain")], response.short_url).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::with_scheme;

    #[test]
    fn prepends_http_to_schemeless_input() {
        assert_eq!(with_scheme("example.com/a"), "http://example.com/a");
        assert_eq!(with_scheme(" https://example.com "), "https://example.com");
        assert_eq!(with_scheme("http://example.com"), "http://example.com");
        assert_eq!(with_scheme(""), "");
    }
}
