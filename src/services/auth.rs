//! Credential refresh for connected platform accounts

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::accounts::ConnectedAccount;
use crate::domain::store::AccountStore;
use super::platform::{PlatformClient, PlatformError};
use super::publisher::PublishError;

/// Ensures the account's access token is valid, refreshing through the
/// platform if expired. The refreshed credential pair is persisted before the
/// token is handed back.
pub async fn ensure_valid_access_token(
    accounts: &Arc<dyn AccountStore>,
    platform: &Arc<dyn PlatformClient>,
    account: &ConnectedAccount,
) -> Result<String, PublishError> {
    // Token still valid
    if account.token_expires_at >= Utc::now() {
        return Ok(account.access_token.clone());
    }

    // Need to refresh
    let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
        PublishError::Remote(PlatformError::Auth(format!(
            "credential expired and no refresh token for account {}",
            account.id
        )))
    })?;

    let new_tokens = platform
        .refresh_access_token(refresh_token)
        .await
        .map_err(PublishError::Remote)?;

    let expires_at = Utc::now() + Duration::seconds(new_tokens.expires_in);
    accounts
        .update_tokens(
            account.id,
            &new_tokens.access_token,
            new_tokens.refresh_token.as_deref(),
            expires_at,
        )
        .await?;

    Ok(new_tokens.access_token)
}
