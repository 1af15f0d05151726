//! Command registry.
//!
//! Registration is a setup phase: the registry is filled, then moved into a
//! `Dispatcher`, which only ever reads it. No locking is needed on the
//! serving path.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::context::Context;
use crate::dispatch::HandlerResult;

pub(crate) type HandlerFn = Arc<dyn Fn(&mut Context) -> HandlerResult + Send + Sync>;
pub(crate) type MiddlewareFn = Arc<dyn Fn(&mut Context) -> HandlerResult + Send + Sync>;

/// A method bound to its handler and command-specific middleware.
#[derive(Clone)]
pub struct Command {
    pub(crate) handler: HandlerFn,
    pub(crate) middleware: Vec<MiddlewareFn>,
}

impl Command {
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }
}

/// Method name → command, plus the global middleware list.
#[derive(Clone, Default)]
pub struct Registry {
    commands: HashMap<String, Command>,
    global: Vec<MiddlewareFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `name`.
    ///
    /// The returned builder attaches command-specific middleware:
    /// `registry.register("multiply", multiply).with(require_positive_a);`
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> CommandBuilder<'_>
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        let command = Command {
            handler: Arc::new(handler),
            middleware: Vec::new(),
        };
        let command = match self.commands.entry(name.into()) {
            Entry::Occupied(mut slot) => {
                tracing::debug!(method = %slot.key(), "replacing previously registered command");
                slot.insert(command);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(command),
        };
        CommandBuilder { command }
    }

    /// Append a middleware that runs before every command's own middleware.
    pub fn use_global<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.global.push(Arc::new(middleware));
        self
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Lookup that also lends out the registry's own copy of the name.
    pub(crate) fn get_key_value(&self, name: &str) -> Option<(&str, &Command)> {
        self.commands
            .get_key_value(name)
            .map(|(key, command)| (key.as_str(), command))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn global(&self) -> &[MiddlewareFn] {
        &self.global
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("methods", &self.methods())
            .field("global_middleware", &self.global.len())
            .finish()
    }
}

/// Attaches command-specific middleware right after `register`.
pub struct CommandBuilder<'a> {
    command: &'a mut Command,
}

impl CommandBuilder<'_> {
    /// Append a middleware; runs in the order added, after all global middleware.
    pub fn with<F>(self, middleware: F) -> Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.command.middleware.push(Arc::new(middleware));
        self
    }
}
