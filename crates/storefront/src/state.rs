//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::crypto::{CipherError, SecretCipher};
use crate::payments::PaymentConfigResolver;
use crate::services::checkout::CheckoutService;
use crate::services::email::EmailService;
use crate::services::reconciliation::WebhookProcessor;

/// Timeout for calls to the payment gateway.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// How long generated SEO documents are served from cache.
const SEO_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("encryption key: {0}")]
    Cipher(#[from] CipherError),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    http: reqwest::Client,
    cipher: SecretCipher,
    email: Option<EmailService>,
    seo_cache: Cache<&'static str, String>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Derives the encryption key once and builds the shared gateway HTTP
    /// client. Email stays disabled unless SMTP is fully configured.
    ///
    /// # Errors
    ///
    /// Returns an error if key derivation, the HTTP client or the SMTP
    /// transport cannot be set up.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let cipher = SecretCipher::new(config.encryption_key.as_ref())?;
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .user_agent(concat!("ayurmart-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let email = match &config.email {
            Some(email_config) => Some(EmailService::new(email_config)?),
            None => {
                tracing::info!("SMTP not configured, transactional email disabled");
                None
            }
        };

        let seo_cache = Cache::builder()
            .max_capacity(8)
            .time_to_live(SEO_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                http,
                cipher,
                email,
                seo_cache,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Shared HTTP client for the payment gateway.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Cipher for secrets stored in the settings table.
    #[must_use]
    pub fn cipher(&self) -> &SecretCipher {
        &self.inner.cipher
    }

    /// The mailer, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Cache of rendered `robots.txt` and `sitemap.xml`.
    #[must_use]
    pub fn seo_cache(&self) -> &Cache<&'static str, String> {
        &self.inner.seo_cache
    }

    /// Payment credential resolver.
    #[must_use]
    pub fn payment_config(&self) -> PaymentConfigResolver<'_> {
        PaymentConfigResolver::new(self.pool(), &self.config().razorpay, self.cipher())
    }

    /// Checkout service bound to this state.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.pool(),
            self.http(),
            &self.config().razorpay,
            self.cipher(),
            &self.config().pricing,
        )
        .with_email(self.email())
    }

    /// Webhook processor bound to this state.
    #[must_use]
    pub fn webhooks(&self) -> WebhookProcessor<'_> {
        WebhookProcessor::new(self.pool(), self.payment_config(), self.checkout())
    }
}
