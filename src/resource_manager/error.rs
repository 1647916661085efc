use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum ResourceManagerError {
    #[error("building request: `{0}`")]
    Request(String),
    #[error("http transport error: `{0}`")]
    Transport(String),
    #[error("resource manager error: Status code: `{status}`, Reason: `{message}`")]
    Response { status: u16, message: String },
    #[error("decoding response: `{0}`")]
    Decoder(String),
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: String,
}

impl ResourceManagerError {
    /// Error for an unsuccessful response. Resource Manager answers with
    /// `{"error": {"code": ..., "message": ...}}`, any other body is kept as is.
    pub(crate) fn from_response(status: u16, body: &[u8]) -> Self {
        let message = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(ErrorResponse { error }) if error.message.is_empty() => error.code,
            Ok(ErrorResponse { error }) => format!("{}: {}", error.code, error.message),
            Err(_) => String::from_utf8_lossy(body).into_owned(),
        };
        Self::Response { status, message }
    }
}
