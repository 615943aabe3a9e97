//! Cart route handlers.
//!
//! `POST /cart` runs one cart action from a form body and answers with the
//! action result as JSON. The buyer's cart ID lives in the `cart` cookie, or
//! in the session when the session identity strategy is configured.

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use orchard_core::{Cart, CartForm};

use crate::cart::{CartError, CookieCartIdentity, SessionCartIdentity};
use crate::config::CartIdentityStrategy;
use crate::error::{Result, add_breadcrumb};
use crate::state::AppState;

/// Locale for reading the current cart.
#[derive(Debug, Default, Deserialize)]
pub struct CartLocale {
    pub country: Option<String>,
    pub language: Option<String>,
}

/// Perform a cart action.
#[instrument(skip(state, headers, session, form), fields(action = %form.action))]
pub async fn perform(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
    Form(form): Form<CartForm>,
) -> Result<Response> {
    add_breadcrumb("cart", &form.action, None);
    let request = form.into_request().map_err(CartError::from)?;
    let cart = state.cart();

    match state.config().cart.identity {
        CartIdentityStrategy::Cookie => {
            let identity = CookieCartIdentity::from_headers(&headers, &state.config().cart.cookie);
            let outcome = cart.perform(&identity, request).await?;
            let mut response = Json(outcome.result).into_response();
            if let Some(cookie) = identity.set_cookie_header() {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Ok(response)
        }
        CartIdentityStrategy::Session => {
            let identity = SessionCartIdentity::new(session);
            let outcome = cart.perform(&identity, request).await?;
            Ok(Json(outcome.result).into_response())
        }
    }
}

/// Current cart as JSON, or `null` when the buyer has none.
#[instrument(skip(state, headers, session))]
pub async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
    Query(locale): Query<CartLocale>,
) -> Result<Json<Option<Cart>>> {
    let country = locale.country.as_deref().filter(|c| !c.is_empty());
    let language = locale.language.as_deref().filter(|l| !l.is_empty());
    let cart = state.cart();

    let current = match state.config().cart.identity {
        CartIdentityStrategy::Cookie => {
            let identity = CookieCartIdentity::from_headers(&headers, &state.config().cart.cookie);
            cart.get(&identity, country, language).await?
        }
        CartIdentityStrategy::Session => {
            cart.get(&SessionCartIdentity::new(session), country, language)
                .await?
        }
    };

    Ok(Json(current))
}
