//! Managed identity tokens, issued by the platform the process runs on.
//!
//! Two sources are supported: the App Service / Functions identity endpoint, advertised through
//! `IDENTITY_ENDPOINT` and `IDENTITY_HEADER`, and the Instance Metadata Service (IMDS) reachable
//! from virtual machines, scale sets and AKS nodes. IMDS has no environment marker, so it is
//! considered available when it answers a probe request.
use std::fmt;

use http::Response;
use tracing::{debug, warn};
use url::Url;

use crate::credential::settings::EnvironmentSettings;
use crate::http_client::{HttpClient, HttpClientError, json_body, successful};
use crate::token::{Token, TokenResponse};
use crate::{ClientID, TokenRetriever, TokenRetrieverError};

const IMDS_DEFAULT_HOST: &str = "http://169.254.169.254";
const IMDS_TOKEN_PATH: &str = "/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const APP_SERVICE_IDENTITY_HEADER: &str = "X-IDENTITY-HEADER";

#[derive(Clone, PartialEq)]
pub enum ManagedIdentitySource {
    AppService { endpoint: Url, header: String },
    Imds { endpoint: Url },
}

impl fmt::Debug for ManagedIdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppService { endpoint, .. } => f
                .debug_struct("AppService")
                .field("endpoint", &endpoint.as_str())
                .field("header", &"<hidden>")
                .finish(),
            Self::Imds { endpoint } => f
                .debug_struct("Imds")
                .field("endpoint", &endpoint.as_str())
                .finish(),
        }
    }
}

impl ManagedIdentitySource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppService { .. } => "AppService",
            Self::Imds { .. } => "IMDS",
        }
    }
}

/// Looks for a managed identity endpoint usable from this process.
///
/// The App Service endpoint wins when advertised. Otherwise IMDS is probed with `probe_client`,
/// which should be configured with a short timeout: any HTTP answer means the service exists.
pub fn detect<P: HttpClient>(
    settings: &EnvironmentSettings,
    probe_client: &P,
) -> Option<ManagedIdentitySource> {
    if let (Some(endpoint), Some(header)) = (&settings.identity_endpoint, &settings.identity_header)
    {
        match Url::parse(endpoint) {
            Ok(endpoint) => {
                return Some(ManagedIdentitySource::AppService {
                    endpoint,
                    header: header.to_owned(),
                });
            }
            Err(err) => warn!("ignoring invalid IDENTITY_ENDPOINT `{endpoint}`: {err}"),
        }
    }

    let endpoint = imds_endpoint(settings.imds_host.as_deref())?;
    if probe_imds(probe_client, &endpoint) {
        Some(ManagedIdentitySource::Imds { endpoint })
    } else {
        None
    }
}

fn imds_endpoint(host: Option<&str>) -> Option<Url> {
    let host = host.unwrap_or(IMDS_DEFAULT_HOST);
    match Url::parse(host).and_then(|url| url.join(IMDS_TOKEN_PATH)) {
        Ok(url) => Some(url),
        Err(err) => {
            warn!("ignoring invalid IMDS host `{host}`: {err}");
            None
        }
    }
}

fn probe_imds<P: HttpClient>(probe_client: &P, endpoint: &Url) -> bool {
    // Without the `Metadata` header IMDS rejects the call, which is enough to know it is there.
    let request = match http::Request::builder()
        .method("GET")
        .uri(endpoint.as_str())
        .body(Vec::new())
    {
        Ok(request) => request,
        Err(err) => {
            debug!("unable to build IMDS probe request: {err}");
            return false;
        }
    };

    match probe_client.send(request) {
        Ok(response) => {
            debug!(status = response.status().as_u16(), "IMDS answered probe request");
            true
        }
        Err(err) => {
            debug!("IMDS not available: {err}");
            false
        }
    }
}

/// Retrieves managed identity tokens for `resource`.
pub struct ManagedIdentityRetriever<C: HttpClient> {
    http_client: C,
    source: ManagedIdentitySource,
    resource: String,
    /// Selects a user-assigned identity, the system-assigned one is used otherwise.
    client_id: Option<ClientID>,
}

impl<C: HttpClient> fmt::Debug for ManagedIdentityRetriever<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedIdentityRetriever")
            .field("source", &self.source)
            .field("resource", &self.resource)
            .field("client_id", &self.client_id)
            .field("http_client", &"impl HttpClient")
            .finish()
    }
}

impl<C: HttpClient> ManagedIdentityRetriever<C> {
    pub fn new(
        http_client: C,
        source: ManagedIdentitySource,
        resource: String,
        client_id: Option<ClientID>,
    ) -> Self {
        Self {
            http_client,
            source,
            resource,
            client_id,
        }
    }

    fn build_request(&self) -> Result<http::Request<Vec<u8>>, TokenRetrieverError> {
        let (mut url, api_version, header) = match &self.source {
            ManagedIdentitySource::AppService { endpoint, header } => (
                endpoint.clone(),
                APP_SERVICE_API_VERSION,
                (APP_SERVICE_IDENTITY_HEADER, header.as_str()),
            ),
            ManagedIdentitySource::Imds { endpoint } => {
                (endpoint.clone(), IMDS_API_VERSION, ("Metadata", "true"))
            }
        };

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api-version", api_version)
                .append_pair("resource", &self.resource);
            if let Some(client_id) = &self.client_id {
                query.append_pair("client_id", client_id);
            }
        }

        http::Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(header.0, header.1)
            .body(Vec::new())
            .map_err(|e| {
                TokenRetrieverError::TokenRetrieverError(format!("Failed to build request: {e}"))
            })
    }
}

impl<C: HttpClient> TokenRetriever for ManagedIdentityRetriever<C> {
    fn retrieve(&self) -> Result<Token, TokenRetrieverError> {
        let request = self.build_request()?;

        let response = self.http_client.send(request).map_err(|e| {
            TokenRetrieverError::TokenRetrieverError(format!("Failed to send HTTP request: {e}"))
        })?;

        debug!(source = self.source.name(), "managed identity token requested");
        evaluate_response(response)
    }
}

fn evaluate_response(res: Response<Vec<u8>>) -> Result<Token, TokenRetrieverError> {
    decode_token(res).map_err(|e| {
        TokenRetrieverError::TokenRetrieverError(format!("Failed to retrieve token: {e}"))
    })
}

fn decode_token(res: Response<Vec<u8>>) -> Result<Token, HttpClientError> {
    let body: TokenResponse = json_body(&successful(res)?)?;
    Token::try_from(body).map_err(|e| HttpClientError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use http::Request;
    use httpmock::{Method::GET, MockServer};

    use super::*;
    use crate::credential::settings::tests::settings_from as settings;
    use crate::http::client::HttpClient as ReqwestHttpClient;
    use crate::http::config::HttpConfig;
    use crate::http_client::tests::{MockHttpClient, response};

    const RESOURCE: &str = "https://management.azure.com/";

    fn unreachable(_: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        Err(HttpClientError::TransportError("connection refused".into()))
    }

    fn answering(_: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        Ok(response(400, r#"{"error":"invalid_request"}"#))
    }

    #[test]
    fn app_service_endpoint_is_preferred_without_probing() {
        let mut probe = MockHttpClient::new();
        probe.expect_send().never();

        let source = detect(
            &settings(&[
                ("IDENTITY_ENDPOINT", "http://localhost:8081/msi/token"),
                ("IDENTITY_HEADER", "secret-header"),
            ]),
            &probe,
        );

        assert_matches!(source, Some(ManagedIdentitySource::AppService { endpoint, header }) => {
            assert_eq!(endpoint.as_str(), "http://localhost:8081/msi/token");
            assert_eq!(header, "secret-header");
        });
    }

    #[test]
    fn imds_detected_when_probe_gets_any_answer() {
        let source = detect(&settings(&[]), &answering);

        assert_matches!(source, Some(ManagedIdentitySource::Imds { endpoint }) => {
            assert_eq!(endpoint.as_str(), "http://169.254.169.254/metadata/identity/oauth2/token");
        });
    }

    #[test]
    fn no_managed_identity_when_imds_unreachable() {
        assert_eq!(detect(&settings(&[]), &unreachable), None);
    }

    #[test]
    fn imds_host_can_be_overridden() {
        let source = detect(
            &settings(&[("AZURE_POD_IDENTITY_AUTHORITY_HOST", "http://10.0.0.1:2579")]),
            &answering,
        );

        assert_matches!(source, Some(ManagedIdentitySource::Imds { endpoint }) => {
            assert_eq!(endpoint.as_str(), "http://10.0.0.1:2579/metadata/identity/oauth2/token");
        });
    }

    #[test]
    fn imds_token_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(IMDS_TOKEN_PATH)
                .header("Metadata", "true")
                .query_param("api-version", IMDS_API_VERSION)
                .query_param("resource", RESOURCE)
                .query_param("client_id", "user-assigned");
            then.status(200).body(
                r#"{"access_token":"msi-token","expires_in":"86399","expires_on":"1700000000","resource":"https://management.azure.com/","token_type":"Bearer"}"#,
            );
        });

        let retriever = ManagedIdentityRetriever::new(
            ReqwestHttpClient::new(HttpConfig::default()).unwrap(),
            ManagedIdentitySource::Imds {
                endpoint: Url::parse(&server.url(IMDS_TOKEN_PATH)).unwrap(),
            },
            RESOURCE.into(),
            Some("user-assigned".into()),
        );

        let token = retriever.retrieve().unwrap();

        assert_eq!(token.access_token(), "msi-token");
        mock.assert();
    }

    #[test]
    fn app_service_token_request() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                let uri = req.uri().to_string();
                uri.starts_with("http://localhost:8081/msi/token?")
                    && uri.contains("api-version=2019-08-01")
                    && !uri.contains("client_id")
                    && req.headers().get(APP_SERVICE_IDENTITY_HEADER).unwrap() == "secret-header"
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"app-token","expires_on":"1700000000","token_type":"Bearer"}"#,
                ))
            });

        let retriever = ManagedIdentityRetriever::new(
            http_client,
            ManagedIdentitySource::AppService {
                endpoint: Url::parse("http://localhost:8081/msi/token").unwrap(),
                header: "secret-header".into(),
            },
            RESOURCE.into(),
            None,
        );

        assert_eq!(retriever.retrieve().unwrap().access_token(), "app-token");
    }

    #[test]
    fn unsuccessful_response_is_an_error() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(|_| Ok(response(400, "Identity not found")));

        let retriever = ManagedIdentityRetriever::new(
            http_client,
            ManagedIdentitySource::Imds {
                endpoint: Url::parse("http://169.254.169.254/metadata/identity/oauth2/token")
                    .unwrap(),
            },
            RESOURCE.into(),
            None,
        );

        let err = retriever.retrieve().unwrap_err();
        assert!(err.to_string().contains("Identity not found"));
    }
}
