use std::net::IpAddr;

use crate::http::config::HttpConfig;
use crate::http_client::{HttpClient as OauthHttpClient, HttpClientError as OauthHttpClientError};
use http::{Request, Response, Uri};
use reqwest::blocking::{Client, ClientBuilder, Response as BlockingResponse};
use tracing::trace;

/// `reqwest` backed implementation of [`crate::http_client::HttpClient`].
///
/// Proxy settings from the environment (`HTTP_PROXY`, `HTTPS_PROXY`, `NO_PROXY`) apply to every
/// destination except link-local and loopback ones, where the instance metadata service and the
/// App Service identity endpoint live.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    direct: Client,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let builder = || {
            Client::builder()
                .use_rustls_tls()
                .tls_built_in_native_certs(true)
                .user_agent(config.user_agent.as_str())
                .timeout(config.timeout)
                .connect_timeout(config.conn_timeout)
        };
        let build = |builder: ClientBuilder| {
            builder
                .build()
                .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))
        };

        Ok(Self {
            client: build(builder())?,
            direct: build(builder().no_proxy())?,
        })
    }

    fn client_for(&self, uri: &Uri) -> &Client {
        if uri.host().is_some_and(bypasses_proxy) {
            &self.direct
        } else {
            &self.client
        }
    }

    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpResponseError> {
        trace!(method = %request.method(), uri = %request.uri(), "sending request");

        let (parts, body) = request.into_parts();
        let res = self
            .client_for(&parts.uri)
            .request(parts.method, parts.uri.to_string().as_str())
            .headers(parts.headers)
            .body(body)
            .send()
            .map_err(|err| HttpResponseError::TransportError(err.to_string()))?;

        try_build_response(res)
    }
}

fn bypasses_proxy(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host.trim_start_matches('[').trim_end_matches(']').parse() {
        Ok(IpAddr::V4(ip)) => ip.is_link_local() || ip.is_loopback(),
        Ok(IpAddr::V6(ip)) => ip.is_loopback(),
        Err(_) => false,
    }
}

fn try_build_response(res: BlockingResponse) -> Result<Response<Vec<u8>>, HttpResponseError> {
    let status = res.status();
    let version = res.version();

    let body: Vec<u8> = res
        .bytes()
        .map_err(|err| HttpResponseError::ReadingResponse(err.to_string()))?
        .into();

    http::Response::builder()
        .status(status)
        .version(version)
        .body(body)
        .map_err(|err| HttpResponseError::BuildingResponse(err.to_string()))
}

impl OauthHttpClient for HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, OauthHttpClientError> {
        let response = self.send(req)?;

        Ok(response)
    }
}

impl From<HttpResponseError> for OauthHttpClientError {
    fn from(err: HttpResponseError) -> Self {
        match err {
            HttpResponseError::TransportError(msg) => OauthHttpClientError::TransportError(msg),
            HttpResponseError::BuildingResponse(msg) | HttpResponseError::ReadingResponse(msg) => {
                OauthHttpClientError::InvalidResponse(msg)
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
}

#[derive(thiserror::Error, Debug)]
enum HttpResponseError {
    #[error("could not read response body: {0}")]
    ReadingResponse(String),
    #[error("could not build response: {0}")]
    BuildingResponse(String),
    #[error("http transport error: `{0}`")]
    TransportError(String),
}
