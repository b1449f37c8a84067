//! Cognito sign-in glue.
//!
//! The authentication protocol itself belongs to an [`IdentityProvider`];
//! this module only gathers the login fields from a profile and stores the
//! credentials that come back.

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::session::SessionState;
use crate::storage::{AwsCredentials, Profile, ProfileStore};
use crate::utils::parsing::require_fields;

/// User-pool login plus the identity pool that exchanges it for AWS
/// credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CognitoLogin {
    pub username: String,
    pub password: String,
    pub user_pool_id: String,
    pub client_app_id: String,
    pub identity_pool_id: String,
    pub region: String,
}

impl std::fmt::Debug for CognitoLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoLogin")
            .field("username", &self.username)
            .field("password", &"***")
            .field("user_pool_id", &self.user_pool_id)
            .field("client_app_id", &self.client_app_id)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("region", &self.region)
            .finish()
    }
}

impl CognitoLogin {
    /// Collect the login fields from a profile. All six are required.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        require_fields(&[
            ("cognitoUsername", profile.cognito_username.as_deref()),
            ("cognitoPassword", profile.cognito_password.as_deref()),
            ("cognitoUserPoolId", profile.cognito_user_pool_id.as_deref()),
            ("cognitoClientAppId", profile.cognito_client_app_id.as_deref()),
            ("cognitoIdentityPoolId", profile.cognito_identity_pool_id.as_deref()),
            ("cognitoRegion", profile.cognito_region.as_deref()),
        ])?;

        let field = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
        Ok(Self {
            username: field(&profile.cognito_username),
            password: field(&profile.cognito_password),
            user_pool_id: field(&profile.cognito_user_pool_id),
            client_app_id: field(&profile.cognito_client_app_id),
            identity_pool_id: field(&profile.cognito_identity_pool_id),
            region: field(&profile.cognito_region),
        })
    }

    /// Key of the `Logins` map the identity pool expects for this user pool.
    pub fn login_provider(&self) -> String {
        format!(
            "cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }
}

/// Identity collaborator turning a login into short-lived credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, login: &CognitoLogin) -> Result<AwsCredentials>;
}

/// Sign in with the login stored in profile `name` and save the returned
/// credentials into it.
pub async fn sign_in_profile(
    provider: &dyn IdentityProvider,
    store: &ProfileStore,
    name: &str,
    session: &SessionState,
) -> Result<AwsCredentials> {
    let profile = store
        .load(name, session)
        .await?
        .ok_or_else(|| SyncError::validation(format!("Profile '{}' not found", name)))?;
    let login = CognitoLogin::from_profile(&profile)?;

    log::debug!("Signing in '{}' via {}", login.username, login.login_provider());
    let credentials = provider.sign_in(&login).await?;
    if !credentials.is_complete() {
        return Err(SyncError::Auth(
            "identity provider returned incomplete credentials".into(),
        ));
    }

    store
        .save_aws_credentials(name, credentials.clone(), session)
        .await?;
    log::info!("Stored Cognito credentials for profile '{}'", name);
    Ok(credentials)
}
