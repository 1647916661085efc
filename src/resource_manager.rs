//! Read-only Azure Resource Manager listings.
pub mod error;

use http::header::{ACCEPT, AUTHORIZATION};
use http::{HeaderValue, Request};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;
use url::Url;

use crate::http_client::HttpClient;
pub use error::ResourceManagerError;

const SUBSCRIPTIONS_API_VERSION: &str = "2020-01-01";
const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

/// One page of a Resource Manager collection.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    next_link: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
pub trait ResourceManager {
    /// Every subscription visible to the caller.
    fn list_subscriptions(&self) -> Result<Vec<Subscription>, ResourceManagerError>;

    /// Every resource group of `subscription_id`.
    fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroup>, ResourceManagerError>;
}

/// [`ResourceManager`] over plain HTTP, authorized with a fixed bearer token.
///
/// Collections are followed through their `nextLink` until the last page.
pub struct HttpResourceManager<C: HttpClient> {
    http_client: C,
    endpoint: Url,
    authorization: HeaderValue,
}

impl<C: HttpClient> HttpResourceManager<C> {
    pub fn new(
        http_client: C,
        endpoint: Url,
        authorization: &str,
    ) -> Result<Self, ResourceManagerError> {
        let mut authorization = HeaderValue::from_str(authorization).map_err(|_| {
            ResourceManagerError::Request("invalid HTTP header value set for Authorization".into())
        })?;
        authorization.set_sensitive(true);

        Ok(Self {
            http_client,
            endpoint,
            authorization,
        })
    }

    fn collection_url(
        &self,
        segments: &[&str],
        api_version: &str,
    ) -> Result<Url, ResourceManagerError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ResourceManagerError::Request(format!("invalid endpoint `{}`", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn build_request(&self, url: &Url) -> Result<Request<Vec<u8>>, ResourceManagerError> {
        Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.authorization.clone())
            .body(Vec::new())
            .map_err(|e| ResourceManagerError::Request(e.to_string()))
    }

    fn get_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>, ResourceManagerError> {
        let response = self
            .http_client
            .send(self.build_request(url)?)
            .map_err(|e| ResourceManagerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceManagerError::from_response(
                status.as_u16(),
                response.body(),
            ));
        }

        serde_json::from_slice(response.body())
            .map_err(|e| ResourceManagerError::Decoder(e.to_string()))
    }

    fn list_all<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, ResourceManagerError> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            trace!(url = %url, "listing page");
            let page: Page<T> = self.get_page(&url)?;
            items.extend(page.value);

            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    ResourceManagerError::Decoder(format!("invalid nextLink `{link}`: {e}"))
                })?),
                None => None,
            };
        }

        Ok(items)
    }
}

impl<C: HttpClient> ResourceManager for HttpResourceManager<C> {
    fn list_subscriptions(&self) -> Result<Vec<Subscription>, ResourceManagerError> {
        let url = self.collection_url(&["subscriptions"], SUBSCRIPTIONS_API_VERSION)?;
        self.list_all(url)
    }

    fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroup>, ResourceManagerError> {
        let url = self.collection_url(
            &["subscriptions", subscription_id, "resourcegroups"],
            RESOURCE_GROUPS_API_VERSION,
        )?;
        self.list_all(url)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    use super::*;
    use crate::http::client::HttpClient as ReqwestHttpClient;
    use crate::http::config::HttpConfig;
    use crate::http_client::HttpClientError;
    use crate::http_client::tests::{MockHttpClient, response};

    const AUTHORIZATION_HEADER: &str = "Bearer arm-token";

    fn resource_manager(server: &MockServer) -> HttpResourceManager<ReqwestHttpClient> {
        let timeout = Duration::from_millis(500);
        let http_client = ReqwestHttpClient::new(HttpConfig::new(timeout, timeout)).unwrap();
        HttpResourceManager::new(
            http_client,
            Url::parse(&server.base_url()).unwrap(),
            AUTHORIZATION_HEADER,
        )
        .unwrap()
    }

    #[test]
    fn lists_subscriptions() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/subscriptions")
                .query_param("api-version", SUBSCRIPTIONS_API_VERSION)
                .header("authorization", AUTHORIZATION_HEADER);
            then.status(200).json_body(json!({
                "value": [
                    {"id": "/subscriptions/s1", "subscriptionId": "s1", "displayName": "Production", "state": "Enabled"},
                    {"id": "/subscriptions/s2", "subscriptionId": "s2", "displayName": "Staging", "state": "Enabled"}
                ]
            }));
        });

        let subscriptions = resource_manager(&server).list_subscriptions().unwrap();

        assert_eq!(
            subscriptions,
            vec![
                Subscription {
                    subscription_id: "s1".into(),
                    display_name: "Production".into()
                },
                Subscription {
                    subscription_id: "s2".into(),
                    display_name: "Staging".into()
                },
            ]
        );
        mock.assert();
    }

    #[test]
    fn follows_next_link_until_drained() {
        let server = MockServer::start();
        let second_page = server.url("/next/resourcegroups?api-version=2021-04-01&page=2");

        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/subscriptions/s1/resourcegroups")
                .query_param("api-version", RESOURCE_GROUPS_API_VERSION);
            then.status(200).json_body(json!({
                "value": [{"name": "rg-a", "location": "westeurope"}],
                "nextLink": second_page,
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/next/resourcegroups")
                .query_param("page", "2")
                .header("authorization", AUTHORIZATION_HEADER);
            then.status(200).json_body(json!({
                "value": [{"name": "rg-b", "location": "northeurope"}],
                "nextLink": "",
            }));
        });

        let groups = resource_manager(&server).list_resource_groups("s1").unwrap();

        let names: Vec<_> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, ["rg-a", "rg-b"]);
        first.assert();
        second.assert();
    }

    #[test]
    fn error_body_is_reported() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/subscriptions/s1/resourcegroups");
            then.status(403).json_body(json!({
                "error": {"code": "AuthorizationFailed", "message": "no read access"}
            }));
        });

        let error = resource_manager(&server)
            .list_resource_groups("s1")
            .unwrap_err();

        assert_matches!(error, ResourceManagerError::Response { status: 403, message } => {
            assert_eq!(message, "AuthorizationFailed: no read access");
        });
        mock.assert();
    }

    #[test]
    fn undecodable_body_is_an_error() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .returning(|_| Ok(response(200, "<html>maintenance</html>")));

        let resource_manager = HttpResourceManager::new(
            http_client,
            Url::parse("https://management.azure.com/").unwrap(),
            AUTHORIZATION_HEADER,
        )
        .unwrap();

        assert_matches!(
            resource_manager.list_subscriptions(),
            Err(ResourceManagerError::Decoder(_))
        );
    }

    #[test]
    fn authorization_header_is_sensitive() {
        let mut http_client = MockHttpClient::new();
        http_client
            .expect_send()
            .once()
            .withf(|req| {
                req.uri()
                    == "https://management.azure.com/subscriptions?api-version=2020-01-01"
                    && req
                        .headers()
                        .get(AUTHORIZATION)
                        .is_some_and(|value| value.is_sensitive() && value == AUTHORIZATION_HEADER)
            })
            .returning(|_| Ok(response(200, r#"{"value":[]}"#)));

        let resource_manager = HttpResourceManager::new(
            http_client,
            Url::parse("https://management.azure.com/").unwrap(),
            AUTHORIZATION_HEADER,
        )
        .unwrap();

        assert_eq!(resource_manager.list_subscriptions().unwrap(), vec![]);
    }

    #[test]
    fn transport_errors_are_reported() {
        let http_client =
            |_: Request<Vec<u8>>| -> Result<http::Response<Vec<u8>>, HttpClientError> {
                Err(HttpClientError::TransportError("connection reset".into()))
            };

        let resource_manager = HttpResourceManager::new(
            http_client,
            Url::parse("https://management.azure.com/").unwrap(),
            AUTHORIZATION_HEADER,
        )
        .unwrap();

        assert_matches!(
            resource_manager.list_subscriptions(),
            Err(ResourceManagerError::Transport(_))
        );
    }
}
