//! Connection setup shared by every command.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use tracing::debug;

use pit_api::http::HttpTransport;
use pit_api::models::{UserSummary, Viewer};
use pit_api::queries::users;
use pit_api::session::{RefreshEndpoint, Session, TokenRefresher};
use pit_api::transport::Transport;
use pit_core::WorkflowError;

use crate::config::PitConfig;

/// An authenticated connection plus the viewer it acts as.
pub struct Context {
    pub transport: Arc<dyn Transport>,
    pub user: UserSummary,
    pub viewer: Viewer,
}

impl Context {
    pub async fn connect(config: &PitConfig) -> Result<Self> {
        let Some(token) = config.token.clone() else {
            bail!("no access token; set PIT_TOKEN or run `pit init --token <token>`");
        };

        let refresher = config.refresh_token.as_ref().map(|refresh| {
            Arc::new(RefreshEndpoint::new(
                reqwest::Client::new(),
                &config.api.api_url,
                refresh.clone(),
            )) as Arc<dyn TokenRefresher>
        });
        let session = Arc::new(Session::new(Some(token), refresher));
        let transport = HttpTransport::new(config.api.clone(), session)
            .context("failed to build HTTP client")?;
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let user = users::current_user(transport.as_ref())
            .await
            .map_err(user_error)?;
        let Some(viewer) = Viewer::from_user(&user) else {
            bail!("account {} has no role on this platform", user.username);
        };
        debug!(user_id = viewer.id, role = %viewer.role, "connected");

        Ok(Self {
            transport,
            user,
            viewer,
        })
    }
}

/// Turn a workflow or API failure into the message shown to the user.
pub fn user_error(err: impl Into<WorkflowError>) -> anyhow::Error {
    anyhow::anyhow!(err.into().user_message())
}
