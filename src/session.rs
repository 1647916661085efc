use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::credential::settings::EnvironmentSettings;
use crate::credential::{Authorizer, CredentialError};
use crate::environment::{AzureEnvironment, EnvironmentError};
use crate::http_client::HttpClient;
use crate::identity::{self, ServicePrincipalInfo};
use crate::report::{self, ReportSummary};
use crate::resource_manager::{
    HttpResourceManager, ResourceManager, ResourceManagerError, Subscription,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Environment(#[from] EnvironmentError),
    #[error("{0}")]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    ResourceManager(#[from] ResourceManagerError),
}

/// Everything established while connecting to Azure, built once per run.
pub struct Session<R: ResourceManager> {
    environment: AzureEnvironment,
    authorizer: Authorizer,
    subscriptions: Vec<Subscription>,
    resource_manager: R,
}

impl<R: ResourceManager> fmt::Debug for Session<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("environment", &self.environment)
            .field("authorizer", &self.authorizer)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

/// Resolves the cloud, acquires the management token and lists the visible subscriptions.
pub fn connect<C, P>(
    environment_name: &str,
    settings: &EnvironmentSettings,
    http_client: C,
    probe_client: &P,
) -> Result<Session<HttpResourceManager<C>>, SessionError>
where
    C: HttpClient + Clone,
    P: HttpClient,
{
    let environment: AzureEnvironment = environment_name.parse()?;
    debug!(environment = %environment, "cloud environment resolved");

    let authorizer =
        Authorizer::from_environment(settings, &environment, http_client.clone(), probe_client)?;
    let resource_manager = HttpResourceManager::new(
        http_client,
        environment.resource_manager_endpoint(),
        &authorizer.authorization_header(),
    )?;

    Session::new(environment, authorizer, resource_manager)
}

impl<R: ResourceManager> Session<R> {
    pub fn new(
        environment: AzureEnvironment,
        authorizer: Authorizer,
        resource_manager: R,
    ) -> Result<Self, SessionError> {
        let subscriptions = resource_manager.list_subscriptions()?;
        debug!(count = subscriptions.len(), "subscriptions listed");

        Ok(Self {
            environment,
            authorizer,
            subscriptions,
            resource_manager,
        })
    }

    pub fn environment(&self) -> &AzureEnvironment {
        &self.environment
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Logs the identity in use, then the resource groups of every subscription.
    ///
    /// Only a managed identity that cannot provide a token makes the report fail.
    pub fn report<C, P>(
        &self,
        settings: &EnvironmentSettings,
        http_client: C,
        probe_client: &P,
    ) -> Result<ReportSummary, SessionError>
    where
        C: HttpClient,
        P: HttpClient,
    {
        info!("starting access report");
        info!("running in Azure environment \"{}\"", self.environment);

        info!("searching for ServicePrincipal information");
        let principal: ServicePrincipalInfo =
            identity::inspect(settings, &self.environment, http_client, probe_client)?;
        principal.log();

        Ok(report::run(&self.resource_manager, &self.subscriptions))
    }
}
