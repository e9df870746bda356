//! OAuth2 authorization-code flow for the Google Drive API
//!
//! Implements the web-application Authorization Code flow against Google's
//! OAuth endpoints. Tokens live in the configuration document and every
//! token response is merged into the stored record rather than replacing it,
//! so the long-lived refresh token survives routine refreshes.
//!
//! ## Components
//!
//! - [`DriveSession`] - OAuth client bound to the config store; builds
//!   authorization URLs, exchanges codes, refreshes access tokens
//! - [`CallbackListener`] - Minimal HTTP listener for the OAuth redirect

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use gds_core::config::AppConfig;
use gds_core::store::ConfigStore;
use gds_core::tokens::{TokenSet, TokenUpdate};
use gds_core::GdsError;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    ExtraTokenFields, RedirectUrl, RefreshToken, RequestTokenError, Scope, StandardRevocableToken,
    StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

/// Google OAuth2 authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth2 token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh the access token when it expires within this many seconds
const REFRESH_MARGIN_SECS: i64 = 60;

// ============================================================================
// Google token response
// ============================================================================

/// Token-response fields Google returns beyond RFC 6749
///
/// Google includes an `id_token` (an OpenID Connect JWT) in code exchanges;
/// refresh responses usually omit it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GoogleTokenFields {
    /// OpenID Connect identity token, when the scopes include identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for GoogleTokenFields {}

/// Token response shape returned by Google's token endpoint
pub type GoogleTokenResponse = StandardTokenResponse<GoogleTokenFields, BasicTokenType>;

/// OAuth2 client parameterized for Google token responses
type GoogleOAuthClient<
    HasAuthUrl = EndpointNotSet,
    HasDeviceAuthUrl = EndpointNotSet,
    HasIntrospectionUrl = EndpointNotSet,
    HasRevocationUrl = EndpointNotSet,
    HasTokenUrl = EndpointNotSet,
> = oauth2::Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    HasDeviceAuthUrl,
    HasIntrospectionUrl,
    HasRevocationUrl,
    HasTokenUrl,
>;

/// Converts a token response into the partial update persisted by the store
///
/// Fields the endpoint omitted stay `None`, so merging the update preserves
/// the stored values (most importantly the refresh token).
fn token_update_from(response: &GoogleTokenResponse) -> TokenUpdate {
    let expires_at = response
        .expires_in()
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1));

    let token_type = match response.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "Mac".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    };

    let scope = response.scopes().map(|scopes| {
        scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    });

    TokenUpdate {
        access_token: Some(response.access_token().secret().to_string()),
        refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
        scope,
        token_type: Some(token_type),
        id_token: response.extra_fields().id_token.clone(),
        expiry_date: Some(expires_at.timestamp_millis()),
    }
}

/// Flattens an oauth2 request error into the exchange-failure taxonomy
fn exchange_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> GdsError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            GdsError::AuthExchangeFailed(response.to_string())
        }
        other => GdsError::AuthExchangeFailed(other.to_string()),
    }
}

// ============================================================================
// DriveSession
// ============================================================================

/// OAuth session bound to the configuration store
///
/// Built from the stored client registration; exchanges and refreshes go
/// through Google's token endpoint and every response is merged into the
/// stored token record.
#[derive(Debug)]
pub struct DriveSession {
    client: GoogleOAuthClient<
        EndpointSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointSet,
    >,
    store: ConfigStore,
    scopes: Vec<String>,
}

impl DriveSession {
    /// Builds a session against Google's production OAuth endpoints
    ///
    /// # Errors
    /// Returns [`GdsError::ConfigInvalid`] when the stored registration is
    /// missing the port, client id, client secret, or a redirect URI
    pub async fn connect(store: ConfigStore) -> Result<Self> {
        let config = store.read().await?;
        Self::with_endpoints(store, &config, AUTH_URL, TOKEN_URL)
    }

    /// Builds a session against custom OAuth endpoints
    ///
    /// Exists so tests can point the session at a local mock token server.
    pub fn with_endpoints(
        store: ConfigStore,
        config: &AppConfig,
        auth_url: &str,
        token_url: &str,
    ) -> Result<Self> {
        let port = config.port()?;
        let credentials = config.credentials()?;
        let redirect_uri = credentials.redirect_uri(port)?;

        let client = GoogleOAuthClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(token_url.to_string()).context("Invalid token URL")?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri.clone()).map_err(|_| {
                GdsError::ConfigInvalid(format!(
                    "googleAuth.credentials.redirectUris[0] is not a valid URL: {redirect_uri}"
                ))
            })?);

        Ok(Self {
            client,
            store,
            scopes: config.google_auth.scopes.clone(),
        })
    }

    /// Builds the user-facing authorization URL
    ///
    /// Requests offline access with a forced consent screen so Google issues
    /// a refresh token even when the user has authorized before.
    pub fn authorize_url(&self) -> String {
        let mut auth_request = self.client.authorize_url(CsrfToken::new_random);

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _csrf_token) = auth_request
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        debug!("Generated authorization URL");
        auth_url.to_string()
    }

    /// Exchanges an authorization code for tokens and persists them
    ///
    /// # Arguments
    /// * `code` - The authorization code received on the callback
    ///
    /// # Returns
    /// The full stored token record after the merge
    ///
    /// # Errors
    /// Returns [`GdsError::AuthExchangeFailed`] when the token endpoint
    /// rejects the code
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        info!("Exchanging authorization code for tokens");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client)
            .await
            .map_err(exchange_error)?;

        let tokens = self.persist(token_update_from(&token_result)).await?;
        info!("Tokens saved");
        Ok(tokens)
    }

    /// Returns a valid access token, refreshing it first when the stored one
    /// is expired or about to expire
    ///
    /// Refreshed tokens are persisted before the token is returned.
    pub async fn access_token(&self) -> Result<String> {
        let config = self.store.read().await?;
        let tokens = config
            .google_auth
            .tokens
            .context("No stored tokens; run `gds auth` first")?;

        if !tokens.expires_within(Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(tokens.access_token);
        }

        info!("Access token expired, refreshing");
        let refresh_token = tokens
            .refresh_token
            .context("Stored tokens have no refresh token; run `gds auth` again")?;

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(&http_client)
            .await
            .map_err(exchange_error)?;

        let tokens = self.persist(token_update_from(&token_result)).await?;
        Ok(tokens.access_token)
    }

    /// Merges a token update into the stored record and persists it
    async fn persist(&self, update: TokenUpdate) -> Result<TokenSet> {
        let written = self
            .store
            .update(move |mut config| {
                let merged = update.merge_into(config.google_auth.tokens.as_ref());
                config.google_auth.tokens = Some(merged);
                config
            })
            .await?;

        written
            .google_auth
            .tokens
            .context("Token record missing after persist")
    }
}

// ============================================================================
// CallbackListener
// ============================================================================

/// Take-once slot for the callback outcome
type OutcomeSender = Arc<Mutex<Option<oneshot::Sender<Result<TokenSet>>>>>;

/// Outcome parked by the handler until its connection finishes writing
type ParkedOutcome = Arc<Mutex<Option<(oneshot::Sender<Result<TokenSet>>, Result<TokenSet>)>>>;

/// Minimal HTTP listener that waits on localhost for the OAuth2 redirect
///
/// Accepts connections until one of them delivers an authorization code.
/// The handler exchanges the received code before acknowledging, so the
/// browser sees the exchange outcome.
pub struct CallbackListener;

impl CallbackListener {
    /// Binds the listener and waits for the OAuth redirect
    ///
    /// Responses:
    ///
    /// - `200 Ok` - code received, exchanged, and tokens persisted
    /// - `400` - no authorization code in the request; keeps waiting
    /// - `409` - a code was already handled
    /// - `502` - the token endpoint rejected the exchange
    ///
    /// # Arguments
    /// * `port` - Local TCP port to bind on
    /// * `session` - Session the code is exchanged through
    ///
    /// # Returns
    /// The stored token record once a code has been exchanged
    pub async fn listen(port: u16, session: Arc<DriveSession>) -> Result<TokenSet> {
        info!("Listening for the OAuth callback on http://localhost:{}", port);

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("Failed to bind callback listener on port {}", port))?;

        let (tx, mut rx) = oneshot::channel::<Result<TokenSet>>();
        let tx: OutcomeSender = Arc::new(Mutex::new(Some(tx)));

        // Browsers open speculative sockets and fetch /favicon.ico on
        // connections of their own; keep accepting until a code has been
        // handled.
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _addr) =
                        accepted.context("Failed to accept connection on callback listener")?;
                    spawn_connection(stream, Arc::clone(&session), Arc::clone(&tx));
                }
                outcome = &mut rx => {
                    info!("Stopping callback listener");
                    return outcome
                        .context("Callback connection closed without delivering a code")?;
                }
            }
        }
    }
}

/// Serves one accepted connection on its own task
///
/// The handler parks the outcome with its sender instead of resolving the
/// channel directly; the parked pair fires once hyper is done with the
/// connection, so the browser has its reply before the listener returns.
fn spawn_connection(stream: TcpStream, session: Arc<DriveSession>, tx: OutcomeSender) {
    let io = TokioIo::new(stream);
    let parked: ParkedOutcome = Arc::new(Mutex::new(None));

    let parked_clone = Arc::clone(&parked);
    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let session = Arc::clone(&session);
        let tx = Arc::clone(&tx);
        let parked = Arc::clone(&parked_clone);
        async move { handle_callback(req, session, tx, parked).await }
    });

    tokio::spawn(async move {
        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            warn!("Callback connection error: {}", e);
        }
        if let Some((sender, outcome)) = parked.lock().await.take() {
            let _ = sender.send(outcome);
        }
    });
}

/// Handles one request on a callback connection
async fn handle_callback(
    req: Request<hyper::body::Incoming>,
    session: Arc<DriveSession>,
    tx: OutcomeSender,
    parked: ParkedOutcome,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let uri = req.uri().to_string();
    debug!("Callback listener received request: {}", uri);

    let code = match parse_callback_code(&uri) {
        Some(code) => code,
        None => {
            // Not the redirect; answer and keep the connection open
            return Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "text/plain")
                .body(Full::new(Bytes::from("Missing authorization code")))
                .unwrap());
        }
    };

    let sender = match tx.lock().await.take() {
        Some(sender) => sender,
        None => {
            return Ok(Response::builder()
                .status(StatusCode::CONFLICT)
                .header("Content-Type", "text/plain")
                .header("Connection", "close")
                .body(Full::new(Bytes::from("Callback already handled")))
                .unwrap());
        }
    };

    match session.exchange_code(&code).await {
        Ok(tokens) => {
            *parked.lock().await = Some((sender, Ok(tokens)));
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain")
                .header("Connection", "close")
                .body(Full::new(Bytes::from("Ok")))
                .unwrap())
        }
        Err(e) => {
            warn!("Authorization code exchange failed: {:#}", e);
            *parked.lock().await = Some((sender, Err(e)));
            Ok(Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .header("Content-Type", "text/plain")
                .header("Connection", "close")
                .body(Full::new(Bytes::from("Authorization exchange failed")))
                .unwrap())
        }
    }
}

/// Extracts the authorization code from a callback request URI
///
/// An empty `code` value counts as missing.
fn parse_callback_code(uri: &str) -> Option<String> {
    let url = url::Url::parse(&format!("http://localhost{}", uri)).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.to_string())
        .filter(|code| !code.is_empty())
}
