//! Optimistic cart state.
//!
//! While a cart mutation is in flight, the UI shows the cart as if the
//! mutation had already succeeded. [`OptimisticReconciler`] keeps the pending
//! mutations and overlays them on the last confirmed cart; once the real
//! result arrives (or the mutation fails), the entry is resolved and the
//! projection falls back to confirmed data.
//!
//! Payloads are shallow: each top-level key of a pending payload replaces the
//! same key of the cart. The cart `id` is never overridden.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use orchard_core::Cart;

/// A mutation that has been submitted but not confirmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    /// Caller-chosen identifier (usually the form or line being edited).
    pub identifier: String,
    /// Fields the cart is expected to have once the mutation succeeds.
    pub payload: Map<String, Value>,
    /// When the mutation was recorded.
    pub submitted_at: DateTime<Utc>,
}

/// A cart with pending mutations applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimisticCart {
    /// Confirmed cart with the overlay applied.
    pub cart: Cart,
    /// Whether anything is still pending.
    pub is_optimistic: bool,
}

/// Pending mutations in submission order.
#[derive(Debug, Clone, Default)]
pub struct OptimisticReconciler {
    pending: Vec<PendingMutation>,
}

impl OptimisticReconciler {
    /// An empty reconciler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Record a pending mutation now.
    ///
    /// Recording an identifier that is already pending replaces its payload
    /// and keeps its position.
    pub fn record(&mut self, identifier: impl Into<String>, payload: Map<String, Value>) {
        self.record_at(identifier, payload, Utc::now());
    }

    /// Record a pending mutation submitted at `submitted_at`.
    pub fn record_at(
        &mut self,
        identifier: impl Into<String>,
        payload: Map<String, Value>,
        submitted_at: DateTime<Utc>,
    ) {
        let identifier = identifier.into();
        let mutation = PendingMutation {
            identifier,
            payload,
            submitted_at,
        };

        match self
            .pending
            .iter_mut()
            .find(|p| p.identifier == mutation.identifier)
        {
            Some(existing) => *existing = mutation,
            None => self.pending.push(mutation),
        }
    }

    /// Drop a pending mutation once its outcome is known.
    pub fn resolve(&mut self, identifier: &str) -> Option<PendingMutation> {
        let index = self
            .pending
            .iter()
            .position(|p| p.identifier == identifier)?;
        Some(self.pending.remove(index))
    }

    /// Overlay pending mutations on `cart`, oldest first.
    #[must_use]
    pub fn project(&self, cart: &Cart) -> OptimisticCart {
        let mut projected = cart.clone();
        for mutation in &self.pending {
            for (key, value) in &mutation.payload {
                if key == "id" {
                    continue;
                }
                projected.fields.insert(key.clone(), value.clone());
            }
        }

        OptimisticCart {
            cart: projected,
            is_optimistic: !self.pending.is_empty(),
        }
    }

    /// Drop mutations submitted more than `timeout` before `now`.
    ///
    /// Returns the identifiers of the dropped mutations.
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: chrono::Duration) -> Vec<String> {
        let mut expired = Vec::new();
        self.pending.retain(|p| {
            let keep = now.signed_duration_since(p.submitted_at) <= timeout;
            if !keep {
                expired.push(p.identifier.clone());
            }
            keep
        });

        if !expired.is_empty() {
            debug!(expired = ?expired, "Expired pending cart mutations");
        }
        expired
    }

    /// Number of pending mutations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether `identifier` is pending.
    #[must_use]
    pub fn is_pending(&self, identifier: &str) -> bool {
        self.pending.iter().any(|p| p.identifier == identifier)
    }

    /// Pending mutations in submission order.
    #[must_use]
    pub fn pending(&self) -> &[PendingMutation] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeDelta;
    use orchard_core::CartId;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn cart() -> Cart {
        let mut cart = Cart::with_id(CartId::from_token("c1"));
        cart.fields.insert("totalQuantity".to_string(), json!(1));
        cart.fields.insert("note".to_string(), json!("old"));
        cart
    }

    #[test]
    fn test_project_overlays_pending_payloads() {
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record("qty", payload(json!({"totalQuantity": 3})));

        let projected = reconciler.project(&cart());
        assert!(projected.is_optimistic);
        assert_eq!(projected.cart.total_quantity(), Some(3));
        assert_eq!(projected.cart.get("note"), Some(&json!("old")));
    }

    #[test]
    fn test_later_mutations_win() {
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record("a", payload(json!({"note": "first"})));
        reconciler.record("b", payload(json!({"note": "second"})));

        assert_eq!(
            reconciler.project(&cart()).cart.get("note"),
            Some(&json!("second"))
        );
    }

    #[test]
    fn test_rerecord_replaces_in_place() {
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record("a", payload(json!({"note": "first"})));
        reconciler.record("b", payload(json!({"note": "second"})));
        reconciler.record("a", payload(json!({"note": "third"})));

        assert_eq!(reconciler.pending_count(), 2);
        assert_eq!(reconciler.pending()[0].identifier, "a");
        // "b" is still later, so it still wins
        assert_eq!(
            reconciler.project(&cart()).cart.get("note"),
            Some(&json!("second"))
        );
    }

    #[test]
    fn test_id_is_never_overridden() {
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record("evil", payload(json!({"id": "gid://shopify/Cart/other", "note": "x"})));

        let projected = reconciler.project(&cart());
        assert_eq!(projected.cart.id.token(), "c1");
        assert!(!projected.cart.fields.contains_key("id"));
    }

    #[test]
    fn test_resolve_returns_to_confirmed_state() {
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record("qty", payload(json!({"totalQuantity": 3})));

        let resolved = reconciler.resolve("qty");
        assert_eq!(resolved.map(|p| p.identifier), Some("qty".to_string()));
        assert!(reconciler.resolve("qty").is_none());

        let projected = reconciler.project(&cart());
        assert!(!projected.is_optimistic);
        assert_eq!(projected.cart, cart());
    }

    #[test]
    fn test_resolving_one_line_keeps_the_other_pending() {
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record("line-1", payload(json!({"quantity": 2})));
        reconciler.record("line-2", payload(json!({"removed": true})));

        let both = reconciler.project(&cart());
        assert_eq!(both.cart.get("quantity"), Some(&json!(2)));
        assert_eq!(both.cart.get("removed"), Some(&json!(true)));

        let resolved = reconciler.resolve("line-1");
        assert_eq!(resolved.map(|p| p.payload), Some(payload(json!({"quantity": 2}))));

        assert!(!reconciler.is_pending("line-1"));
        assert!(reconciler.is_pending("line-2"));
        assert_eq!(reconciler.pending_count(), 1);

        let projected = reconciler.project(&cart());
        assert!(projected.is_optimistic);
        assert_eq!(projected.cart.get("quantity"), None);
        assert_eq!(projected.cart.get("removed"), Some(&json!(true)));
        assert_eq!(projected.cart.get("note"), Some(&json!("old")));
        assert_eq!(projected.cart.id.token(), "c1");
    }

    #[test]
    fn test_expire_drops_only_old_entries() {
        let now = Utc::now();
        let mut reconciler = OptimisticReconciler::new();
        reconciler.record_at("old", payload(json!({"note": "a"})), now - TimeDelta::seconds(30));
        reconciler.record_at("edge", payload(json!({"note": "b"})), now - TimeDelta::seconds(10));
        reconciler.record_at("new", payload(json!({"note": "c"})), now);

        let expired = reconciler.expire(now, TimeDelta::seconds(10));

        assert_eq!(expired, vec!["old".to_string()]);
        assert!(!reconciler.is_pending("old"));
        assert!(reconciler.is_pending("edge"));
        assert!(reconciler.is_pending("new"));
    }
}
