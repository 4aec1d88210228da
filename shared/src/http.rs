//! Response building shared by every route: JSON bodies, redirects, the
//! session cookie and the `ShopError` → status code mapping.

use crate::error::ShopError;
use lambda_http::http::{header, HeaderMap, StatusCode};
use lambda_http::{Body, Error, Request, RequestPayloadExt, Response};
use serde::{de::DeserializeOwned, Serialize};

pub const SESSION_COOKIE: &str = "storefront_session";

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub fn body_str(body: &Body) -> &str {
    match body {
        Body::Text(text) => text,
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    }
}

/// Parses a JSON body. An empty body parses as `{}` so that missing fields
/// are reported by validation rather than as a malformed request.
pub fn parse_json<T: DeserializeOwned>(body: &Body) -> Result<T, ShopError> {
    let raw = body_str(body);
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| {
        tracing::error!("Failed to parse request body: {}", e);
        ShopError::BadRequest(e.to_string())
    })
}

/// Like [`parse_json`], but also accepts `application/x-www-form-urlencoded`
/// posts from plain HTML forms.
pub fn parse_payload<T: DeserializeOwned>(event: &Request) -> Result<T, ShopError> {
    if body_str(event.body()).trim().is_empty() {
        return parse_json(event.body());
    }
    match event.payload::<T>() {
        Ok(Some(parsed)) => Ok(parsed),
        // No recognised content type: treat the body as JSON
        Ok(None) => parse_json(event.body()),
        Err(e) => {
            tracing::error!("Failed to parse request payload: {}", e);
            Err(ShopError::BadRequest(e.to_string().trim_end().to_string()))
        }
    }
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn redirect(location: &str) -> Result<Response<Body>, Error> {
    redirect_with_cookie(location, None)
}

pub fn redirect_with_cookie(
    location: &str,
    cookie: Option<String>,
) -> Result<Response<Body>, Error> {
    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", location);
    if let Some(cookie) = cookie {
        builder = builder.header("Set-Cookie", cookie);
    }
    Ok(builder.body(Body::Empty).map_err(Box::new)?)
}

/// Attaches a `Set-Cookie` header to an already built response.
pub fn with_cookie(
    mut response: Response<Body>,
    cookie: String,
) -> Result<Response<Body>, Error> {
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cookie.parse().map_err(Box::new)?);
    Ok(response)
}

/// `Ok` becomes a JSON body with `status`, `Err` goes through [`error_response`].
pub fn api_response<T: Serialize>(
    status: StatusCode,
    result: Result<T, ShopError>,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(err) => error_response(&err),
    }
}

pub fn status_for(err: &ShopError) -> StatusCode {
    match err {
        ShopError::ValidationFailed(_) | ShopError::EmptyCart | ShopError::BadRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        ShopError::NotFound(_) => StatusCode::NOT_FOUND,
        ShopError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ShopError::Conflict(_) | ShopError::InvalidTransition { .. } => StatusCode::CONFLICT,
        ShopError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body for API routes. Storage details never leave the server.
pub fn error_response(err: &ShopError) -> Result<Response<Body>, Error> {
    let status = status_for(err);
    match err {
        ShopError::ValidationFailed(errors) => {
            json_response(status, &serde_json::json!({ "errors": errors }))
        }
        ShopError::EmptyCart => json_response(
            status,
            &ErrorResponse {
                error: "Cart is empty".to_string(),
                message: "Please add items to your cart before checkout".to_string(),
            },
        ),
        ShopError::BadRequest(detail) => json_response(
            status,
            &ErrorResponse {
                error: "InvalidRequest".to_string(),
                message: format!("Invalid request body: {}", detail),
            },
        ),
        ShopError::Unauthorized(message) => json_response(
            status,
            &ErrorResponse {
                error: "Access denied".to_string(),
                message: message.clone(),
            },
        ),
        ShopError::Storage(_) => json_response(
            status,
            &serde_json::json!({ "error": "Something went wrong, please try again" }),
        ),
        other => json_response(status, &serde_json::json!({ "error": other.to_string() })),
    }
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Reads the session token out of the `Cookie` header(s).
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `path?key=value`, with the pair form-encoded.
pub fn with_query(path: &str, key: &str, value: &str) -> String {
    let query = serde_urlencoded::to_string(&[(key, value)]).unwrap_or_default();
    format!("{}?{}", path, query)
}
