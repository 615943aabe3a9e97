//! Built-in commands: one Storefront API mutation per cart action.
//!
//! Without a cart, a creating action runs `cartCreate` with its input folded
//! into the `CartInput`; every other action runs its own mutation against the
//! cart in context.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use orchard_core::{Cart, CartAction, CartActionResult, CartId, CartUserError, CartWarning};

use super::{CartCommand, CartError, CommandContext, cart_id_required};
use crate::shopify::ShopifyError;
use crate::shopify::queries::{self, Document};

/// Expected JSON type of an action's input field.
#[derive(Debug, Clone, Copy)]
enum Shape {
    Array,
    Object,
    String,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::String => value.is_string(),
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Array => "an array",
            Self::Object => "an object",
            Self::String => "a string",
        }
    }
}

/// Input field each action requires, and its shape.
const fn input_field(action: CartAction) -> (&'static str, Shape) {
    match action {
        CartAction::AddLines | CartAction::UpdateLines => ("lines", Shape::Array),
        CartAction::RemoveLines => ("lineIds", Shape::Array),
        CartAction::UpdateAttributes => ("attributes", Shape::Array),
        CartAction::UpdateBuyerIdentity => ("buyerIdentity", Shape::Object),
        CartAction::UpdateNote => ("note", Shape::String),
        CartAction::UpdateDiscountCodes => ("discountCodes", Shape::Array),
        CartAction::UpdateGiftCardCodes => ("giftCardCodes", Shape::Array),
        CartAction::DeliveryAddressesAdd | CartAction::DeliveryAddressesUpdate => {
            ("addresses", Shape::Array)
        }
        CartAction::DeliveryAddressesRemove => ("addressIds", Shape::Array),
        CartAction::MetafieldsSet => ("metafields", Shape::Array),
        CartAction::MetafieldDelete => ("key", Shape::String),
    }
}

/// Mutation run against an existing cart.
const fn mutation(action: CartAction) -> Document {
    match action {
        CartAction::AddLines => queries::CART_LINES_ADD,
        CartAction::RemoveLines => queries::CART_LINES_REMOVE,
        CartAction::UpdateLines => queries::CART_LINES_UPDATE,
        CartAction::UpdateAttributes => queries::CART_ATTRIBUTES_UPDATE,
        CartAction::UpdateBuyerIdentity => queries::CART_BUYER_IDENTITY_UPDATE,
        CartAction::UpdateNote => queries::CART_NOTE_UPDATE,
        CartAction::UpdateDiscountCodes => queries::CART_DISCOUNT_CODES_UPDATE,
        CartAction::UpdateGiftCardCodes => queries::CART_GIFT_CARD_CODES_UPDATE,
        CartAction::DeliveryAddressesAdd => queries::CART_DELIVERY_ADDRESSES_ADD,
        CartAction::DeliveryAddressesRemove => queries::CART_DELIVERY_ADDRESSES_REMOVE,
        CartAction::DeliveryAddressesUpdate => queries::CART_DELIVERY_ADDRESSES_UPDATE,
        CartAction::MetafieldsSet => queries::CART_METAFIELDS_SET,
        CartAction::MetafieldDelete => queries::CART_METAFIELD_DELETE,
    }
}

/// Common shape of a cart mutation payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationPayload {
    #[serde(default)]
    cart: Option<Cart>,
    #[serde(default)]
    user_errors: Vec<CartUserError>,
    #[serde(default)]
    warnings: Vec<CartWarning>,
}

impl From<MutationPayload> for CartActionResult {
    fn from(payload: MutationPayload) -> Self {
        Self {
            cart: payload.cart,
            errors: payload.user_errors,
            warnings: payload.warnings,
        }
    }
}

/// The built-in command for one action.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCommand {
    action: CartAction,
}

impl DefaultCommand {
    /// The built-in command for `action`.
    #[must_use]
    pub const fn new(action: CartAction) -> Self {
        Self { action }
    }

    fn required_input(&self, inputs: &Value) -> Result<Value, CartError> {
        let (field, shape) = input_field(self.action);
        let value = inputs
            .get(field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| CartError::InvalidInput {
                action: self.action,
                reason: format!("missing `{field}`"),
            })?;

        if !shape.matches(value) {
            return Err(CartError::InvalidInput {
                action: self.action,
                reason: format!("`{field}` must be {}", shape.describe()),
            });
        }
        Ok(value.clone())
    }

    /// `CartInput` for creating a cart that already reflects this action.
    fn cart_input(&self, value: Value, country: Option<&str>) -> Value {
        let mut input = Map::new();
        match self.action {
            CartAction::DeliveryAddressesAdd => {
                input.insert("delivery".to_string(), json!({ "addresses": value }));
            }
            CartAction::MetafieldsSet => {
                // `CartInput` metafields belong to the cart being created
                let metafields = map_objects(value, |metafield| {
                    metafield.remove("ownerId");
                });
                input.insert("metafields".to_string(), metafields);
            }
            _ => {
                input.insert(input_field(self.action).0.to_string(), value);
            }
        }

        if let Some(country) = country {
            let buyer = input
                .entry("buyerIdentity")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(buyer) = buyer {
                buyer
                    .entry("countryCode")
                    .or_insert_with(|| Value::String(country.to_string()));
            }
        }

        Value::Object(input)
    }

    /// Variables for this action's own mutation.
    fn mutation_variables(&self, cart_id: &CartId, value: Value) -> Map<String, Value> {
        let mut variables = Map::new();
        match self.action {
            CartAction::MetafieldsSet => {
                let metafields = map_objects(value, |metafield| {
                    metafield.insert("ownerId".to_string(), json!(cart_id));
                });
                variables.insert("metafields".to_string(), metafields);
            }
            CartAction::MetafieldDelete => {
                variables.insert(
                    "input".to_string(),
                    json!({ "ownerId": cart_id, "key": value }),
                );
            }
            _ => {
                variables.insert("cartId".to_string(), json!(cart_id));
                variables.insert(input_field(self.action).0.to_string(), value);
            }
        }
        variables
    }

    async fn run(
        &self,
        document: Document,
        mut variables: Map<String, Value>,
        ctx: &CommandContext,
    ) -> Result<MutationPayload, CartError> {
        if let Some(country) = &ctx.country {
            variables.insert("country".to_string(), json!(country));
        }
        if let Some(language) = &ctx.language {
            variables.insert("language".to_string(), json!(language));
        }

        let data = ctx
            .api
            .mutate(&document.operation(Value::Object(variables)))
            .await?;

        let payload = data
            .get(document.root)
            .filter(|payload| !payload.is_null())
            .ok_or_else(|| ShopifyError::MissingPayload(document.root.to_string()))?;

        let payload: MutationPayload =
            serde_json::from_value(payload.clone()).map_err(ShopifyError::from)?;
        debug!(
            operation = document.name,
            user_errors = payload.user_errors.len(),
            warnings = payload.warnings.len(),
            "Cart mutation completed"
        );
        Ok(payload)
    }
}

#[async_trait]
impl CartCommand for DefaultCommand {
    #[instrument(skip(self, inputs, ctx), fields(action = %self.action, cart_id = ?ctx.cart_id))]
    async fn execute(
        &self,
        inputs: &Value,
        ctx: &CommandContext,
    ) -> Result<CartActionResult, CartError> {
        let value = self.required_input(inputs)?;

        let Some(cart_id) = &ctx.cart_id else {
            if !self.action.creates_cart() {
                return Ok(CartActionResult::from_error(cart_id_required(self.action)));
            }
            let mut variables = Map::new();
            variables.insert(
                "input".to_string(),
                self.cart_input(value, ctx.country.as_deref()),
            );
            return Ok(self.run(queries::CART_CREATE, variables, ctx).await?.into());
        };

        let variables = self.mutation_variables(cart_id, value);
        let payload = self.run(mutation(self.action), variables, ctx).await?;

        let mut result = CartActionResult::from(payload);
        if matches!(
            self.action,
            CartAction::MetafieldsSet | CartAction::MetafieldDelete
        ) {
            // Metafield mutations return no cart
            result.cart = Some(Cart::with_id(cart_id.clone()));
        }
        Ok(result)
    }
}

/// Apply `f` to every object in a JSON array.
fn map_objects(value: Value, f: impl Fn(&mut Map<String, Value>)) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|mut item| {
                    if let Value::Object(object) = &mut item {
                        f(object);
                    }
                    item
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::cart::CART_ID_REQUIRED;
    use crate::cart::testing::FakeApi;
    use crate::shopify::GraphQLError;

    fn ctx(api: &Arc<FakeApi>, cart: Option<&str>) -> CommandContext {
        CommandContext {
            cart_id: cart.map(CartId::from_token),
            ..CommandContext::new(Arc::clone(api) as _)
        }
    }

    async fn run(
        action: CartAction,
        inputs: Value,
        ctx: &CommandContext,
    ) -> Result<CartActionResult, CartError> {
        DefaultCommand::new(action).execute(&inputs, ctx).await
    }

    #[tokio::test]
    async fn test_add_lines_without_cart_creates_one() {
        let api = Arc::new(FakeApi::with_cart("new"));
        let ctx = CommandContext {
            country: Some("CA".to_string()),
            ..ctx(&api, None)
        };
        let lines = json!([{"merchandiseId": "gid://shopify/ProductVariant/1", "quantity": 1}]);

        let result = run(CartAction::AddLines, json!({ "lines": lines }), &ctx)
            .await
            .unwrap();

        assert_eq!(result.cart.unwrap().id.token(), "new");
        let (operation, variables) = api.last_call().unwrap();
        assert_eq!(operation, "CartCreate");
        assert_eq!(variables["input"]["lines"], lines);
        assert_eq!(variables["input"]["buyerIdentity"]["countryCode"], "CA");
        assert_eq!(variables["country"], "CA");
    }

    #[tokio::test]
    async fn test_add_lines_with_cart_uses_lines_add() {
        let api = Arc::new(FakeApi::with_cart("c1"));
        let ctx = ctx(&api, Some("c1"));

        run(CartAction::AddLines, json!({"lines": []}), &ctx)
            .await
            .unwrap();

        let (operation, variables) = api.last_call().unwrap();
        assert_eq!(operation, "CartLinesAdd");
        assert_eq!(variables["cartId"], "gid://shopify/Cart/c1");
        assert!(variables.get("country").is_none());
    }

    #[tokio::test]
    async fn test_non_creating_action_without_cart_is_a_user_error() {
        let api = Arc::new(FakeApi::with_cart("c1"));
        let ctx = ctx(&api, None);

        let result = run(CartAction::RemoveLines, json!({"lineIds": ["l1"]}), &ctx)
            .await
            .unwrap();

        assert!(result.cart.is_none());
        assert_eq!(result.errors[0].code.as_deref(), Some(CART_ID_REQUIRED));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_or_mistyped_input_is_rejected_before_io() {
        let api = Arc::new(FakeApi::with_cart("c1"));
        let ctx = ctx(&api, Some("c1"));

        let missing = run(CartAction::UpdateNote, json!({}), &ctx).await.unwrap_err();
        assert!(matches!(
            missing,
            CartError::InvalidInput { action: CartAction::UpdateNote, ref reason } if reason == "missing `note`"
        ));

        let mistyped = run(CartAction::AddLines, json!({"lines": {"quantity": 1}}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(
            mistyped.to_string(),
            "invalid inputs for LinesAdd: `lines` must be an array"
        );
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_user_errors_and_warnings_are_data() {
        let api = Arc::new(FakeApi::responding(|_| {
            Ok(json!({
                "cartLinesUpdate": {
                    "cart": {"id": "gid://shopify/Cart/c1", "totalQuantity": 2},
                    "userErrors": [{"code": "INVALID", "field": ["lines", "0", "quantity"], "message": "Too many"}],
                    "warnings": [{"code": "MERCHANDISE_NOT_ENOUGH_STOCK", "message": "Only 2 left", "target": "gid://shopify/CartLine/1"}],
                }
            }))
        }));
        let ctx = ctx(&api, Some("c1"));

        let result = run(
            CartAction::UpdateLines,
            json!({"lines": [{"id": "gid://shopify/CartLine/1", "quantity": 9}]}),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(result.cart.unwrap().total_quantity(), Some(2));
        assert_eq!(result.errors[0].message, "Too many");
        assert_eq!(result.warnings[0].target.as_deref(), Some("gid://shopify/CartLine/1"));
    }

    #[tokio::test]
    async fn test_missing_payload_is_a_transport_failure() {
        let api = Arc::new(FakeApi::responding(|_| Ok(json!({"somethingElse": {}}))));
        let ctx = ctx(&api, Some("c1"));

        let err = run(CartAction::UpdateNote, json!({"note": "hi"}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CartError::Api(ShopifyError::MissingPayload(ref root)) if root == "cartNoteUpdate"
        ));
    }

    #[tokio::test]
    async fn test_api_failure_propagates() {
        let api = Arc::new(FakeApi::responding(|_| {
            Err(ShopifyError::GraphQL(vec![GraphQLError::message("Throttled")]))
        }));
        let ctx = ctx(&api, Some("c1"));

        let err = run(CartAction::UpdateNote, json!({"note": "hi"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Api(ShopifyError::GraphQL(_))));
    }

    #[tokio::test]
    async fn test_metafields_set_targets_the_cart() {
        let api = Arc::new(FakeApi::responding(|_| {
            Ok(json!({"cartMetafieldsSet": {"metafields": [], "userErrors": []}}))
        }));
        let ctx = ctx(&api, Some("c1"));

        let result = run(
            CartAction::MetafieldsSet,
            json!({"metafields": [{"key": "custom.gift", "type": "boolean", "value": "true"}]}),
            &ctx,
        )
        .await
        .unwrap();

        assert_eq!(result.cart, Some(Cart::with_id(CartId::from_token("c1"))));
        let (_, variables) = api.last_call().unwrap();
        assert_eq!(variables["metafields"][0]["ownerId"], "gid://shopify/Cart/c1");
        assert!(variables.get("cartId").is_none());
    }

    #[tokio::test]
    async fn test_metafields_set_without_cart_creates_one() {
        let api = Arc::new(FakeApi::with_cart("new"));
        let ctx = ctx(&api, None);

        run(
            CartAction::MetafieldsSet,
            json!({"metafields": [{"key": "k", "type": "single_line_text_field", "value": "v", "ownerId": "x"}]}),
            &ctx,
        )
        .await
        .unwrap();

        let (operation, variables) = api.last_call().unwrap();
        assert_eq!(operation, "CartCreate");
        assert!(variables["input"]["metafields"][0].get("ownerId").is_none());
    }

    #[tokio::test]
    async fn test_metafield_delete_input() {
        let api = Arc::new(FakeApi::responding(|_| {
            Ok(json!({"cartMetafieldDelete": {"deletedId": "gid://shopify/Metafield/1", "userErrors": []}}))
        }));
        let ctx = ctx(&api, Some("c1"));

        let result = run(CartAction::MetafieldDelete, json!({"key": "custom.gift"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result.cart.unwrap().id.token(), "c1");
        let (operation, variables) = api.last_call().unwrap();
        assert_eq!(operation, "CartMetafieldDelete");
        assert_eq!(
            variables["input"],
            json!({"ownerId": "gid://shopify/Cart/c1", "key": "custom.gift"})
        );
    }

    #[tokio::test]
    async fn test_delivery_address_on_create() {
        let api = Arc::new(FakeApi::with_cart("new"));
        let ctx = ctx(&api, None);
        let addresses = json!([{"address": {"deliveryAddress": {"countryCode": "CA"}}, "selected": true}]);

        run(
            CartAction::DeliveryAddressesAdd,
            json!({ "addresses": addresses }),
            &ctx,
        )
        .await
        .unwrap();

        let (_, variables) = api.last_call().unwrap();
        assert_eq!(variables["input"]["delivery"]["addresses"], addresses);
    }

    #[tokio::test]
    async fn test_buyer_country_is_not_overridden() {
        let api = Arc::new(FakeApi::with_cart("new"));
        let ctx = CommandContext {
            country: Some("CA".to_string()),
            ..ctx(&api, None)
        };

        run(
            CartAction::UpdateBuyerIdentity,
            json!({"buyerIdentity": {"countryCode": "US", "email": "a@b.c"}}),
            &ctx,
        )
        .await
        .unwrap();

        let (_, variables) = api.last_call().unwrap();
        assert_eq!(variables["input"]["buyerIdentity"]["countryCode"], "US");
        assert_eq!(variables["input"]["buyerIdentity"]["email"], "a@b.c");
    }
}
