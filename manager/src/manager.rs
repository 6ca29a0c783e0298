use std::sync::Arc;

use sessionkit_core::{
    ManagerOptions, ProviderRef, Session, SessionConfig, SessionError, SessionResult,
};
use tracing::debug;

use crate::cookie::{unescape, CookieSink, CookieSource, SessionCookie};
use crate::expiry::ExpiryScheduler;
use crate::id::{IdGenerator, RandomIdGenerator};
use crate::registry::ProviderRegistry;

/// Binds request cookies to provider-backed sessions.
///
/// A missing, malformed, unknown or expired session cookie is never an error:
/// the caller simply gets a fresh session and the response gets a new cookie.
#[derive(Debug)]
pub struct Manager {
    provider: ProviderRef,
    options: ManagerOptions,
    ids: Arc<dyn IdGenerator>,
    expiry: ExpiryScheduler,
}

impl Manager {
    /// Build a Manager around the provider registered as `provider_name`.
    pub fn new(
        registry: &ProviderRegistry,
        provider_name: &str,
        options: ManagerOptions,
    ) -> SessionResult<Self> {
        let provider = registry
            .get(provider_name)
            .ok_or_else(|| SessionError::UnknownProvider(provider_name.to_string()))?;
        Self::with_provider(provider, options)
    }

    /// Build a Manager from a configuration document using the built-in
    /// providers.
    pub fn from_config(config: &SessionConfig) -> SessionResult<Self> {
        let registry = ProviderRegistry::with_builtin(&config.file);
        Self::new(&registry, &config.provider, config.manager.clone())
    }

    pub fn with_provider(provider: ProviderRef, options: ManagerOptions) -> SessionResult<Self> {
        let options = options.normalized();
        Ok(Self {
            ids: Arc::new(RandomIdGenerator::new(options.id_length)),
            expiry: ExpiryScheduler::new()?,
            provider,
            options,
        })
    }

    /// Replace the session id source
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn expiry(&self) -> &ExpiryScheduler {
        &self.expiry
    }

    /// Return the session named by the request cookie, or issue a new one.
    ///
    /// Only id generation and provider initialisation failures are reported.
    pub fn start<Req, Res>(&self, request: &Req, response: &mut Res) -> SessionResult<Session>
    where
        Req: CookieSource + ?Sized,
        Res: CookieSink + ?Sized,
    {
        match self.find_live(request) {
            Some(session) => {
                self.expiry.schedule(
                    session.id(),
                    session.time_to_live(),
                    Arc::clone(&self.provider),
                );
                Ok(session)
            }
            None => self.new_session(response),
        }
    }

    /// Remove `session` from the provider and forget its expiry timer.
    ///
    /// On a storage failure the timer stays armed so it can retry.
    pub fn destroy(&self, session: &Session) -> SessionResult<()> {
        let result = self.provider.destroy(session.id());
        if matches!(result, Ok(()) | Err(SessionError::NotFound(_))) {
            self.expiry.cancel(session.id());
        }
        result
    }

    /// Persist `session` through the provider.
    pub fn commit(&self, session: &Session) -> SessionResult<()> {
        self.provider.commit(session.id())
    }

    /// Sweep expired sessions from the provider.
    pub fn cleanup(&self) -> SessionResult<usize> {
        self.provider.cleanup()
    }

    fn find_live<Req: CookieSource + ?Sized>(&self, request: &Req) -> Option<Session> {
        let raw = request
            .cookie(&self.options.cookie_name)
            .filter(|value| !value.is_empty())?;

        let Some(id) = unescape(&raw) else {
            debug!("Ignoring malformed session cookie");
            return None;
        };

        let session = match self.provider.read(&id) {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "Session cookie does not name a live session");
                return None;
            }
        };

        if session.is_expired() {
            if let Err(e) = self.destroy(&session) {
                debug!(error = %e, "Failed to destroy expired session {}", session.id());
            }
            return None;
        }

        Some(session)
    }

    fn new_session<Res: CookieSink + ?Sized>(&self, response: &mut Res) -> SessionResult<Session> {
        let id = self.ids.generate()?;
        let session = Session::new(id, self.options.max_age_seconds);
        self.provider.init(&session)?;

        self.expiry.schedule(
            session.id(),
            session.time_to_live(),
            Arc::clone(&self.provider),
        );
        response.set_cookie(SessionCookie::for_session(&self.options, session.id()));

        debug!("Issued new session: {}", session.id());
        Ok(session)
    }
}
