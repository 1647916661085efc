//! Per-subscription resource group inventory.
use tracing::{error, info};

use crate::resource_manager::{ResourceGroup, ResourceManager, Subscription};

/// What happened to one subscription during a report run.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionOutcome {
    Listed(Vec<ResourceGroup>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionReport {
    pub subscription: Subscription,
    pub outcome: SubscriptionOutcome,
}

/// Result of a report run, in the order the subscriptions were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub subscriptions: Vec<SubscriptionReport>,
}

impl ReportSummary {
    pub fn resource_group_count(&self) -> usize {
        self.subscriptions
            .iter()
            .map(|report| match &report.outcome {
                SubscriptionOutcome::Listed(groups) => groups.len(),
                SubscriptionOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions
            .iter()
            .filter(|report| matches!(report.outcome, SubscriptionOutcome::Failed(_)))
            .map(|report| &report.subscription)
    }
}

/// Lists and logs the resource groups of every subscription.
///
/// A subscription that cannot be listed is logged and skipped, the remaining ones are still
/// processed.
pub fn run<R: ResourceManager>(
    resource_manager: &R,
    subscriptions: &[Subscription],
) -> ReportSummary {
    info!("starting Azure access report");

    let subscriptions = subscriptions
        .iter()
        .map(|subscription| SubscriptionReport {
            subscription: subscription.clone(),
            outcome: report_subscription(resource_manager, subscription),
        })
        .collect();

    info!("report finished");
    ReportSummary { subscriptions }
}

fn report_subscription<R: ResourceManager>(
    resource_manager: &R,
    subscription: &Subscription,
) -> SubscriptionOutcome {
    info!(
        subscription = %subscription.subscription_id,
        "found subscription \"{}\"", subscription.display_name
    );

    match resource_manager.list_resource_groups(&subscription.subscription_id) {
        Ok(groups) => {
            for group in &groups {
                info!(
                    subscription = %subscription.subscription_id,
                    resourceGroup = %group.name,
                    "found resourceGroup"
                );
            }
            SubscriptionOutcome::Listed(groups)
        }
        Err(err) => {
            error!(
                subscription = %subscription.subscription_id,
                "unable to list resource groups: {err}"
            );
            SubscriptionOutcome::Failed(err.to_string())
        }
    }
}
