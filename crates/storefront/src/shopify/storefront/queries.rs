//! GraphQL documents for the Storefront API.
//!
//! The cart query and every cart mutation live in one document sharing the
//! `CartApiFields` fragment; each [`Document`] names the operation to run
//! within it, the same way `graphql_client` sends a multi-operation file.

use serde_json::Value;

use crate::shopify::{Operation, operation};

const CART_DOCUMENT: &str = include_str!("../../../graphql/storefront/cart.graphql");

/// One named operation of a GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document {
    /// Operation name (`operationName` in the request body).
    pub name: &'static str,
    /// Root field of the response `data` carrying the payload.
    pub root: &'static str,
    /// Full document text.
    pub query: &'static str,
}

impl Document {
    const fn cart(name: &'static str, root: &'static str) -> Self {
        Self {
            name,
            root,
            query: CART_DOCUMENT,
        }
    }

    /// Build the request for this operation.
    #[must_use]
    pub fn operation(&self, variables: Value) -> Operation {
        operation(self.name, self.query, variables)
    }
}

pub const CART_QUERY: Document = Document::cart("CartQuery", "cart");
pub const CART_CREATE: Document = Document::cart("CartCreate", "cartCreate");
pub const CART_LINES_ADD: Document = Document::cart("CartLinesAdd", "cartLinesAdd");
pub const CART_LINES_REMOVE: Document = Document::cart("CartLinesRemove", "cartLinesRemove");
pub const CART_LINES_UPDATE: Document = Document::cart("CartLinesUpdate", "cartLinesUpdate");
pub const CART_ATTRIBUTES_UPDATE: Document =
    Document::cart("CartAttributesUpdate", "cartAttributesUpdate");
pub const CART_BUYER_IDENTITY_UPDATE: Document =
    Document::cart("CartBuyerIdentityUpdate", "cartBuyerIdentityUpdate");
pub const CART_NOTE_UPDATE: Document = Document::cart("CartNoteUpdate", "cartNoteUpdate");
pub const CART_DISCOUNT_CODES_UPDATE: Document =
    Document::cart("CartDiscountCodesUpdate", "cartDiscountCodesUpdate");
pub const CART_GIFT_CARD_CODES_UPDATE: Document =
    Document::cart("CartGiftCardCodesUpdate", "cartGiftCardCodesUpdate");
pub const CART_DELIVERY_ADDRESSES_ADD: Document =
    Document::cart("CartDeliveryAddressesAdd", "cartDeliveryAddressesAdd");
pub const CART_DELIVERY_ADDRESSES_REMOVE: Document =
    Document::cart("CartDeliveryAddressesRemove", "cartDeliveryAddressesRemove");
pub const CART_DELIVERY_ADDRESSES_UPDATE: Document =
    Document::cart("CartDeliveryAddressesUpdate", "cartDeliveryAddressesUpdate");
pub const CART_METAFIELDS_SET: Document = Document::cart("CartMetafieldsSet", "cartMetafieldsSet");
pub const CART_METAFIELD_DELETE: Document =
    Document::cart("CartMetafieldDelete", "cartMetafieldDelete");
