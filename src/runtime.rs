use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::action::ActionRegistry;
use crate::clients::google_calendar::GoogleConnector;
use crate::clients::google_oauth::{ClientSecrets, GoogleOAuthClient};
use crate::config::{GoogleCredentials, Settings};
use crate::error::OAuthError;
use crate::handlers::http;
use crate::service::dispatcher::Dispatcher;
use crate::service::openai_service::OpenAIService;
use crate::service::session::SessionStore;
use crate::service::token_store::{FileTokenStore, TokenStore};

/// Consent-flow collaborators, needed only by the OAuth callback and the
/// `authorize` command.
pub struct Authorization {
    pub oauth: GoogleOAuthClient,
    pub tokens: Arc<dyn TokenStore>,
}

/// Everything a front-end needs to serve chat turns.
pub struct App {
    pub dispatcher: Dispatcher,
    pub sessions: SessionStore,
    pub authorization: Option<Authorization>,
}

impl App {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            sessions: SessionStore::new(),
            authorization: None,
        }
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, OAuthError> {
        let secrets = match &settings.google {
            GoogleCredentials::Inline {
                client_id,
                client_secret,
            } => ClientSecrets::new(client_id.clone(), client_secret.clone()),
            GoogleCredentials::SecretsFile(path) => ClientSecrets::from_file(path)?,
        };
        let oauth = GoogleOAuthClient::new(secrets, settings.redirect_uri.clone());
        // Fail at startup rather than on the first request that needs consent.
        oauth.authorization_url()?;

        let tokens: Arc<dyn TokenStore> =
            Arc::new(FileTokenStore::new(&settings.token_path, oauth.clone()));
        let connector = GoogleConnector::new(tokens.clone(), oauth.clone());
        let model = OpenAIService::with_model(
            settings.openai_api_key.clone(),
            settings.openai_model.clone(),
            settings.openai_base_url.clone(),
        );

        let dispatcher = Dispatcher::with_timeout(
            Arc::new(ActionRegistry::calendar()),
            Arc::new(model),
            Arc::new(connector),
            settings.request_timeout,
        );

        Ok(Self::new(dispatcher)
            .with_sessions(SessionStore::with_idle_ttl(settings.session_idle_ttl))
            .with_authorization(Authorization { oauth, tokens }))
    }
}

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodically drops idle sessions so a long-running server does not keep
/// every conversation it has seen.
pub fn spawn_session_sweeper(app: Arc<App>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        loop {
            ticks.tick().await;
            app.sessions.evict_idle().await;
        }
    })
}

pub async fn run_api(app: Arc<App>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let sweeper = spawn_session_sweeper(app.clone(), SESSION_SWEEP_INTERVAL);
    let routes = http::routes(app);
    tracing::info!(%addr, "calendar chat api listening");
    warp::serve(routes).incoming(listener).run().await;
    sweeper.abort();
    Ok(())
}
