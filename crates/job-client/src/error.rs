//! Mapping of transport-level failures onto the client error taxonomy.

use reqwest::{Response, StatusCode};
use upres_job_client_interface::JobClientError;
use upres_utils::http_client::extract_http_error_text;

/// Classify a `reqwest` failure. Connect/timeout/body errors are transport
/// failures; anything carrying an HTTP status is a server error.
pub(crate) fn from_reqwest_error(operation: &str, source: reqwest::Error) -> JobClientError {
    if let Some(status) = source.status() {
        if status == StatusCode::UNAUTHORIZED {
            return JobClientError::unauthorized(operation);
        }
        return JobClientError::api(operation, status.as_u16(), source.to_string());
    }

    let message = if source.is_timeout() {
        "request timed out".to_string()
    } else if source.is_connect() {
        format!("connection failed: {}", source)
    } else {
        format!("request failed: {}", source)
    };
    JobClientError::transport(operation, message)
}

/// Turn a non-success response into the matching error, consuming the body
/// for diagnostics. A 401 is an authorization failure regardless of body.
pub(crate) async fn from_error_response(operation: &str, response: Response) -> JobClientError {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return JobClientError::unauthorized(operation);
    }
    let (message, status) = extract_http_error_text(response, operation).await;
    JobClientError::api(operation, status.as_u16(), message)
}
