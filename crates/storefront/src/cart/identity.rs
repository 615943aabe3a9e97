//! Where a buyer's cart ID lives between requests.
//!
//! Only the trailing token of the global ID is persisted; it is expanded back
//! with [`CartId::from_token`] on read.

use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use tower_sessions::Session;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};
use tracing::debug;

use orchard_core::CartId;

use super::CartError;
use crate::config::CartCookieConfig;

/// Session key holding the cart token.
pub const SESSION_CART_KEY: &str = "cart_id";

/// Reads and writes the buyer's cart identity.
#[async_trait]
pub trait CartIdentityStore: Send + Sync {
    /// The current cart, if the buyer has one.
    async fn get(&self) -> Result<Option<CartId>, CartError>;

    /// Persist `id`, refreshing its lifetime.
    async fn set(&self, id: &CartId) -> Result<(), CartError>;
}

// =============================================================================
// Cookie
// =============================================================================

/// Cart identity carried in a dedicated cookie.
///
/// Built per request from the incoming headers; a write is held until the
/// response is assembled and read back with
/// [`set_cookie_header`](Self::set_cookie_header).
#[derive(Debug)]
pub struct CookieCartIdentity {
    current: Option<CartId>,
    config: CartCookieConfig,
    pending: Mutex<Option<Cookie<'static>>>,
}

impl CookieCartIdentity {
    /// Read the cart cookie from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, config: &CartCookieConfig) -> Self {
        let current = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == config.name)
            .map(|cookie| cookie.value().trim().to_string())
            .filter(|token| !token.is_empty())
            .map(|token| CartId::from_token(&token));

        Self {
            current,
            config: config.clone(),
            pending: Mutex::new(None),
        }
    }

    /// The cookie written by [`CartIdentityStore::set`], if any.
    #[must_use]
    pub fn pending_cookie(&self) -> Option<Cookie<'static>> {
        self.pending.lock().ok().and_then(|pending| pending.clone())
    }

    /// `Set-Cookie` header value for the pending write, if any.
    #[must_use]
    pub fn set_cookie_header(&self) -> Option<HeaderValue> {
        self.pending_cookie()
            .and_then(|cookie| HeaderValue::from_str(&cookie.to_string()).ok())
    }

    fn build_cookie(&self, id: &CartId) -> Cookie<'static> {
        Cookie::build((self.config.name.clone(), id.token().to_string()))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.config.secure)
            .max_age(Duration::days(self.config.max_age_days))
            .build()
    }
}

#[async_trait]
impl CartIdentityStore for CookieCartIdentity {
    async fn get(&self) -> Result<Option<CartId>, CartError> {
        Ok(self.current.clone())
    }

    async fn set(&self, id: &CartId) -> Result<(), CartError> {
        let cookie = self.build_cookie(id);
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| CartError::Identity("cart cookie state poisoned".to_string()))?;
        *pending = Some(cookie);
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

/// Cart identity stored in the server-side session.
#[derive(Debug, Clone)]
pub struct SessionCartIdentity {
    session: Session,
}

impl SessionCartIdentity {
    /// Use the request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CartIdentityStore for SessionCartIdentity {
    async fn get(&self) -> Result<Option<CartId>, CartError> {
        let token: Option<String> = self
            .session
            .get(SESSION_CART_KEY)
            .await
            .map_err(|e| CartError::Identity(e.to_string()))?;
        Ok(token
            .filter(|token| !token.is_empty())
            .map(|token| CartId::from_token(&token)))
    }

    async fn set(&self, id: &CartId) -> Result<(), CartError> {
        self.session
            .insert(SESSION_CART_KEY, id.token())
            .await
            .map_err(|e| CartError::Identity(e.to_string()))?;
        debug!(cart_id = %id, "Stored cart in session");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    fn config(secure: bool) -> CartCookieConfig {
        CartCookieConfig {
            name: "cart".to_string(),
            max_age_days: 30,
            secure,
        }
    }

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_cookie_read() {
        let identity = CookieCartIdentity::from_headers(
            &headers("theme=dark; cart=c1-abc; other=1"),
            &config(false),
        );
        assert_eq!(
            identity.get().await.unwrap(),
            Some(CartId::new("gid://shopify/Cart/c1-abc"))
        );
        assert!(identity.set_cookie_header().is_none());
    }

    #[tokio::test]
    async fn test_cookie_absent_or_empty() {
        let identity = CookieCartIdentity::from_headers(&HeaderMap::new(), &config(false));
        assert_eq!(identity.get().await.unwrap(), None);

        let identity = CookieCartIdentity::from_headers(&headers("cart="), &config(false));
        assert_eq!(identity.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cookie_write_attributes() {
        let identity = CookieCartIdentity::from_headers(&HeaderMap::new(), &config(true));
        identity
            .set(&CartId::new("gid://shopify/Cart/c2-xyz"))
            .await
            .unwrap();

        let cookie = identity.pending_cookie().unwrap();
        assert_eq!(cookie.name(), "cart");
        assert_eq!(cookie.value(), "c2-xyz");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(30)));

        let header = identity.set_cookie_header().unwrap();
        let header = header.to_str().unwrap();
        assert!(header.starts_with("cart=c2-xyz"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Max-Age=2592000"));
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let identity = SessionCartIdentity::new(session.clone());
        assert_eq!(identity.get().await.unwrap(), None);

        identity
            .set(&CartId::new("gid://shopify/Cart/c3"))
            .await
            .unwrap();

        let stored: Option<String> = session.get(SESSION_CART_KEY).await.unwrap();
        assert_eq!(stored.as_deref(), Some("c3"));
        assert_eq!(
            identity.get().await.unwrap(),
            Some(CartId::new("gid://shopify/Cart/c3"))
        );
    }
}
