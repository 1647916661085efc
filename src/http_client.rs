//! Transport seam: every outgoing call goes through [`HttpClient`], so tests can substitute
//! mocks or plain functions for the network.
use http::{Request, Response};
use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug)]
pub enum HttpClientError {
    /// Connection, TLS or timeout failure, no response was received.
    #[error("HTTP Transport error: `{0}`")]
    TransportError(String),
    /// Non 2xx response with its body.
    #[error("Status code: `{0}` Body: `{1}`")]
    UnsuccessfulResponse(u16, String),
    #[error("error decoding: `{0}`")]
    DecoderError(String),
    #[error("invalid http response: `{0}`")]
    InvalidResponse(String),
}

/// Synchronous HTTP client. Method, url, headers and body are all part of the request.
pub trait HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>;
}

impl<F> HttpClient for F
where
    F: Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>,
{
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        self(req)
    }
}

/// Passes 2xx responses through. Anything else becomes
/// [`HttpClientError::UnsuccessfulResponse`].
pub fn successful(response: Response<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HttpClientError::UnsuccessfulResponse(
            status.as_u16(),
            String::from_utf8_lossy(response.body()).into_owned(),
        ))
    }
}

/// Deserializes a JSON body.
pub fn json_body<T: DeserializeOwned>(
    response: &Response<Vec<u8>>,
) -> Result<T, HttpClientError> {
    serde_json::from_slice(response.body())
        .map_err(|e| HttpClientError::DecoderError(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use mockall::mock;
    use serde_json::Value;

    use super::*;

    mock! {
        pub HttpClient {}

        impl HttpClient for HttpClient {
            fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>;
        }
    }

    /// Builds a response with the given status and a UTF-8 body.
    pub(crate) fn response(status: u16, body: &str) -> Response<Vec<u8>> {
        Response::builder()
            .status(status)
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    #[test]
    fn unsuccessful_responses_keep_their_body() {
        assert!(successful(response(204, "")).is_ok());
        assert_matches!(
            successful(response(503, "try later")),
            Err(HttpClientError::UnsuccessfulResponse(503, body)) => assert_eq!(body, "try later")
        );
    }

    #[test]
    fn json_bodies() {
        let value: Value = json_body(&response(200, r#"{"ok":true}"#)).unwrap();
        assert_eq!(value["ok"], true);

        assert_matches!(
            json_body::<Value>(&response(200, "<html/>")),
            Err(HttpClientError::DecoderError(_))
        );
    }
}
