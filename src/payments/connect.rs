use crate::error::PortalError;
use crate::payments::PaymentService;
use crate::store::models::{Location, OnboardingStatus, LOCATIONS};
use crate::store::require_record;
use log::info;
use serde::Serialize;
use serde_json::json;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingLink {
    pub account_id: String,
    pub url: String,
    pub created: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub account_id: Option<String>,
    pub status: OnboardingStatus,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl PaymentService {
    /// Issues an onboarding link for the location's connected account,
    /// creating the account only if none was ever stored.
    pub async fn create_or_link_account(&self, location_id: &str) -> Result<OnboardingLink, PortalError> {
        let location: Location = require_record(self.db(), LOCATIONS, location_id).await?;

        let (account_id, created) = match location.stripe_account_id.as_deref() {
            Some(existing) if !existing.is_empty() => (existing.to_string(), false),
            _ => {
                let account = self
                    .provider
                    .create_account(location.email.as_deref(), location.country.as_deref())
                    .await?;
                self.db()
                    .update_document(
                        LOCATIONS,
                        location_id,
                        &json!({
                            "stripeAccountId": account.id,
                            "stripeOnboardingStatus": OnboardingStatus::PendingOnboarding,
                            "chargesEnabled": false,
                            "payoutsEnabled": false,
                        }),
                    )
                    .await?;
                info!("Created connected account {} for location {location_id}", account.id);
                (account.id, true)
            }
        };

        let link = self
            .provider
            .create_account_link(
                &account_id,
                self.config.onboarding_refresh_url.as_str(),
                self.config.onboarding_return_url.as_str(),
            )
            .await?;
        Ok(OnboardingLink {
            account_id,
            url: link.url,
            created,
        })
    }

    pub async fn refresh_account_status(&self, location_id: &str) -> Result<AccountStatus, PortalError> {
        let location: Location = require_record(self.db(), LOCATIONS, location_id).await?;
        let Some(account_id) = location.stripe_account_id.filter(|id| !id.is_empty()) else {
            return Ok(AccountStatus {
                account_id: None,
                status: OnboardingStatus::NoAccount,
                charges_enabled: false,
                payouts_enabled: false,
            });
        };

        let account = self.provider.retrieve_account(&account_id).await?;
        let status = if account.details_submitted && account.charges_enabled {
            OnboardingStatus::Onboarded
        } else {
            OnboardingStatus::PendingOnboarding
        };
        self.db()
            .update_document(
                LOCATIONS,
                location_id,
                &json!({
                    "stripeOnboardingStatus": status,
                    "chargesEnabled": account.charges_enabled,
                    "payoutsEnabled": account.payouts_enabled,
                }),
            )
            .await?;

        Ok(AccountStatus {
            account_id: Some(account_id),
            status,
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
        })
    }
}
