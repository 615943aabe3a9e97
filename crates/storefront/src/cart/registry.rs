//! Registry mapping cart actions to their commands.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use orchard_core::{CartAction, CartActionResult, UnknownActionError};

use super::commands::DefaultCommand;
use super::{CartError, CommandContext};

/// Future returned by [`CartActionRegistry::dispatch`].
pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CartActionResult, CartError>> + Send + 'a>>;

/// One cart mutation.
#[async_trait]
pub trait CartCommand: Send + Sync {
    /// Run the mutation with the submitted inputs.
    async fn execute(
        &self,
        inputs: &Value,
        ctx: &CommandContext,
    ) -> Result<CartActionResult, CartError>;
}

/// Adapts an async closure into a [`CartCommand`].
pub struct FnCommand<F>(F);

impl<F> FnCommand<F> {
    /// Wrap a closure taking owned inputs and context.
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> CartCommand for FnCommand<F>
where
    F: Fn(Value, CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CartActionResult, CartError>> + Send + 'static,
{
    async fn execute(
        &self,
        inputs: &Value,
        ctx: &CommandContext,
    ) -> Result<CartActionResult, CartError> {
        (self.0)(inputs.clone(), ctx.clone()).await
    }
}

/// Maps each [`CartAction`] to the command that performs it.
#[derive(Clone, Default)]
pub struct CartActionRegistry {
    commands: HashMap<CartAction, Arc<dyn CartCommand>>,
}

impl std::fmt::Debug for CartActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<_> = self.commands.keys().map(CartAction::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("CartActionRegistry")
            .field("actions", &actions)
            .finish()
    }
}

impl CartActionRegistry {
    /// A registry with no commands.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the built-in command for every action.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for action in CartAction::ALL {
            registry.register(action, default_command(action));
        }
        registry
    }

    /// Register a command, returning the one it replaces.
    pub fn register(
        &mut self,
        action: CartAction,
        command: Arc<dyn CartCommand>,
    ) -> Option<Arc<dyn CartCommand>> {
        self.commands.insert(action, command)
    }

    /// Register an async closure as a command.
    pub fn register_fn<F, Fut>(&mut self, action: CartAction, f: F) -> Option<Arc<dyn CartCommand>>
    where
        F: Fn(Value, CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CartActionResult, CartError>> + Send + 'static,
    {
        self.register(action, Arc::new(FnCommand::new(f)))
    }

    /// The command registered for `action`.
    #[must_use]
    pub fn command(&self, action: CartAction) -> Option<&Arc<dyn CartCommand>> {
        self.commands.get(&action)
    }

    /// Whether a command is registered for `action`.
    #[must_use]
    pub fn contains(&self, action: CartAction) -> bool {
        self.commands.contains_key(&action)
    }

    /// Look up the command for `action` and start it.
    ///
    /// The lookup happens before any future exists, so an unregistered
    /// action fails without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownAction`] if no command is registered.
    pub fn dispatch<'a>(
        &'a self,
        action: CartAction,
        inputs: &'a Value,
        ctx: &'a CommandContext,
    ) -> Result<CommandFuture<'a>, CartError> {
        let command = self
            .command(action)
            .ok_or_else(|| UnknownActionError(action.as_str().to_string()))?;
        Ok(command.execute(inputs, ctx))
    }

    /// [`dispatch`](Self::dispatch) by wire identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownAction`] if the identifier is not a known
    /// action or no command is registered for it.
    pub fn dispatch_named<'a>(
        &'a self,
        identifier: &str,
        inputs: &'a Value,
        ctx: &'a CommandContext,
    ) -> Result<CommandFuture<'a>, CartError> {
        let action = identifier.parse::<CartAction>()?;
        self.dispatch(action, inputs, ctx)
    }
}

fn default_command(action: CartAction) -> Arc<dyn CartCommand> {
    // Exhaustive so a new action cannot ship without a command
    match action {
        CartAction::AddLines
        | CartAction::RemoveLines
        | CartAction::UpdateLines
        | CartAction::UpdateAttributes
        | CartAction::UpdateBuyerIdentity
        | CartAction::UpdateNote
        | CartAction::UpdateDiscountCodes
        | CartAction::UpdateGiftCardCodes
        | CartAction::DeliveryAddressesAdd
        | CartAction::DeliveryAddressesRemove
        | CartAction::DeliveryAddressesUpdate
        | CartAction::MetafieldsSet
        | CartAction::MetafieldDelete => Arc::new(DefaultCommand::new(action)),
    }
}
