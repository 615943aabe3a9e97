//! Cart action identifiers and submissions.
//!
//! A browser submits a cart mutation as a form with two required fields, the
//! action identifier and its JSON-encoded inputs:
//!
//! ```text
//! action=LinesAdd&inputs={"lines":[{"merchandiseId":"gid://shopify/ProductVariant/1","quantity":1}]}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::id::CartId;

/// Dispatch to an action identifier that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cart action: {0}")]
pub struct UnknownActionError(pub String);

/// One discrete cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CartAction {
    /// Add merchandise lines.
    #[serde(rename = "LinesAdd")]
    AddLines,
    /// Remove lines by ID.
    #[serde(rename = "LinesRemove")]
    RemoveLines,
    /// Change quantity, merchandise, or attributes of lines.
    #[serde(rename = "LinesUpdate")]
    UpdateLines,
    /// Replace cart attributes.
    #[serde(rename = "AttributesUpdate")]
    UpdateAttributes,
    /// Set buyer email, phone, country, or customer.
    #[serde(rename = "BuyerIdentityUpdate")]
    UpdateBuyerIdentity,
    /// Set the cart note.
    #[serde(rename = "NoteUpdate")]
    UpdateNote,
    /// Replace discount codes.
    #[serde(rename = "DiscountCodesUpdate")]
    UpdateDiscountCodes,
    /// Replace gift card codes.
    #[serde(rename = "GiftCardCodesUpdate")]
    UpdateGiftCardCodes,
    /// Add delivery addresses.
    #[serde(rename = "DeliveryAddressesAdd")]
    DeliveryAddressesAdd,
    /// Remove delivery addresses by ID.
    #[serde(rename = "DeliveryAddressesRemove")]
    DeliveryAddressesRemove,
    /// Update delivery addresses.
    #[serde(rename = "DeliveryAddressesUpdate")]
    DeliveryAddressesUpdate,
    /// Set cart metafields.
    #[serde(rename = "MetafieldsSet")]
    MetafieldsSet,
    /// Delete one cart metafield.
    #[serde(rename = "MetafieldDelete")]
    MetafieldDelete,
}

impl CartAction {
    /// Every action, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::AddLines,
        Self::RemoveLines,
        Self::UpdateLines,
        Self::UpdateAttributes,
        Self::UpdateBuyerIdentity,
        Self::UpdateNote,
        Self::UpdateDiscountCodes,
        Self::UpdateGiftCardCodes,
        Self::DeliveryAddressesAdd,
        Self::DeliveryAddressesRemove,
        Self::DeliveryAddressesUpdate,
        Self::MetafieldsSet,
        Self::MetafieldDelete,
    ];

    /// Wire identifier used in form submissions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddLines => "LinesAdd",
            Self::RemoveLines => "LinesRemove",
            Self::UpdateLines => "LinesUpdate",
            Self::UpdateAttributes => "AttributesUpdate",
            Self::UpdateBuyerIdentity => "BuyerIdentityUpdate",
            Self::UpdateNote => "NoteUpdate",
            Self::UpdateDiscountCodes => "DiscountCodesUpdate",
            Self::UpdateGiftCardCodes => "GiftCardCodesUpdate",
            Self::DeliveryAddressesAdd => "DeliveryAddressesAdd",
            Self::DeliveryAddressesRemove => "DeliveryAddressesRemove",
            Self::DeliveryAddressesUpdate => "DeliveryAddressesUpdate",
            Self::MetafieldsSet => "MetafieldsSet",
            Self::MetafieldDelete => "MetafieldDelete",
        }
    }

    /// Whether this action may create the cart when no identity exists yet.
    ///
    /// Actions that address existing lines, addresses, or metafields need a
    /// cart to already exist.
    #[must_use]
    pub const fn creates_cart(&self) -> bool {
        matches!(
            self,
            Self::AddLines
                | Self::UpdateAttributes
                | Self::UpdateBuyerIdentity
                | Self::UpdateNote
                | Self::UpdateDiscountCodes
                | Self::UpdateGiftCardCodes
                | Self::DeliveryAddressesAdd
                | Self::MetafieldsSet
        )
    }
}

impl fmt::Display for CartAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartAction {
    type Err = UnknownActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownActionError(s.to_string()))
    }
}

/// One user-initiated cart mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct CartActionRequest {
    /// Action to perform.
    pub action: CartAction,
    /// Action inputs, passed to the command untouched.
    pub inputs: Value,
    /// Cart to mutate instead of the persisted identity.
    pub cart_id_override: Option<CartId>,
    /// Country context (ISO 3166-1 alpha-2).
    pub country_override: Option<String>,
    /// Language context (ISO 639-1).
    pub language_override: Option<String>,
}

impl CartActionRequest {
    /// A request without overrides.
    #[must_use]
    pub const fn new(action: CartAction, inputs: Value) -> Self {
        Self {
            action,
            inputs,
            cart_id_override: None,
            country_override: None,
            language_override: None,
        }
    }

    /// Set the country context.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country_override = Some(country.into());
        self
    }

    /// Set the language context.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_override = Some(language.into());
        self
    }

    /// Target a specific cart.
    #[must_use]
    pub fn with_cart_id(mut self, cart_id: CartId) -> Self {
        self.cart_id_override = Some(cart_id);
        self
    }
}

/// Errors decoding a [`CartForm`].
#[derive(Debug, Error)]
pub enum CartFormError {
    /// The action identifier is not known.
    #[error(transparent)]
    UnknownAction(#[from] UnknownActionError),
    /// The inputs field is not valid JSON.
    #[error("invalid cart inputs: {0}")]
    Inputs(#[from] serde_json::Error),
}

/// Form-body encoding of a cart action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartForm {
    /// Action identifier (e.g. `LinesAdd`).
    pub action: String,
    /// JSON-encoded inputs; empty means `{}`.
    #[serde(default)]
    pub inputs: String,
    /// Optional cart to target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<String>,
    /// Optional country context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Optional language context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl CartForm {
    /// Encode a request as a form.
    #[must_use]
    pub fn from_request(request: &CartActionRequest) -> Self {
        Self {
            action: request.action.as_str().to_string(),
            inputs: request.inputs.to_string(),
            cart_id: request.cart_id_override.as_ref().map(ToString::to_string),
            country: request.country_override.clone(),
            language: request.language_override.clone(),
        }
    }

    /// Decode the form into a request.
    ///
    /// # Errors
    ///
    /// Returns [`CartFormError::UnknownAction`] for an unknown identifier and
    /// [`CartFormError::Inputs`] when `inputs` is not JSON.
    pub fn into_request(self) -> Result<CartActionRequest, CartFormError> {
        let action = self.action.parse::<CartAction>()?;
        let inputs = if self.inputs.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&self.inputs)?
        };

        Ok(CartActionRequest {
            action,
            inputs,
            cart_id_override: self
                .cart_id
                .filter(|id| !id.is_empty())
                .map(|id| CartId::from_token(&id)),
            country_override: self.country.filter(|c| !c.is_empty()),
            language_override: self.language.filter(|l| !l.is_empty()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifiers_round_trip() {
        for action in CartAction::ALL {
            assert_eq!(action.as_str().parse::<CartAction>().unwrap(), action);
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                Value::String(action.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let err = "CartBogusAction".parse::<CartAction>().unwrap_err();
        assert_eq!(err, UnknownActionError("CartBogusAction".to_string()));
        assert_eq!(err.to_string(), "unknown cart action: CartBogusAction");
    }

    #[test]
    fn test_creating_actions() {
        assert!(CartAction::AddLines.creates_cart());
        assert!(CartAction::UpdateNote.creates_cart());
        assert!(!CartAction::RemoveLines.creates_cart());
        assert!(!CartAction::UpdateLines.creates_cart());
        assert!(!CartAction::MetafieldDelete.creates_cart());
    }

    #[test]
    fn test_form_into_request() {
        let form = CartForm {
            action: "LinesAdd".to_string(),
            inputs: r#"{"lines":[{"merchandiseId":"v1","quantity":2}]}"#.to_string(),
            cart_id: Some("c1-abc".to_string()),
            country: Some("CA".to_string()),
            language: Some(String::new()),
        };
        let request = form.into_request().unwrap();

        assert_eq!(request.action, CartAction::AddLines);
        assert_eq!(request.inputs["lines"][0]["quantity"], json!(2));
        assert_eq!(
            request.cart_id_override,
            Some(CartId::new("gid://shopify/Cart/c1-abc"))
        );
        assert_eq!(request.country_override.as_deref(), Some("CA"));
        assert_eq!(request.language_override, None);
    }

    #[test]
    fn test_form_rejects_unknown_action_before_parsing_inputs() {
        let form = CartForm {
            action: "CartBogusAction".to_string(),
            inputs: "not json".to_string(),
            cart_id: None,
            country: None,
            language: None,
        };
        assert!(matches!(
            form.into_request(),
            Err(CartFormError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_form_rejects_malformed_inputs() {
        let form = CartForm {
            action: "NoteUpdate".to_string(),
            inputs: "{".to_string(),
            cart_id: None,
            country: None,
            language: None,
        };
        assert!(matches!(form.into_request(), Err(CartFormError::Inputs(_))));
    }

    #[test]
    fn test_form_encoding_of_request() {
        let request = CartActionRequest::new(CartAction::UpdateNote, json!({"note": "gift"}))
            .with_country("US");
        let form = CartForm::from_request(&request);
        assert_eq!(form.action, "NoteUpdate");
        assert_eq!(form.inputs, r#"{"note":"gift"}"#);
        assert_eq!(form.clone().into_request().unwrap(), request);
    }
}
