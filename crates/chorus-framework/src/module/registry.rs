//! Explicit list of module constructors.

use std::any::type_name;

use super::lifecycle::Module;

pub(crate) type Constructor = Box<dyn FnOnce() -> anyhow::Result<Box<dyn Module>> + Send>;

/// Constructors handed to [`ModuleManager::enable_all`](super::ModuleManager::enable_all).
///
/// ```rust,ignore
/// let mut registry = ModuleRegistry::new();
/// registry
///     .register(|| Ok(EchoModule))
///     .register_default::<FactoidModule>();
/// ```
#[derive(Default)]
pub struct ModuleRegistry {
    constructors: Vec<(&'static str, Constructor)>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constructor.  It runs during the first pass of `enable_all`;
    /// an error or panic excludes the module.
    pub fn register<M, F>(&mut self, constructor: F) -> &mut Self
    where
        M: Module,
        F: FnOnce() -> anyhow::Result<M> + Send + 'static,
    {
        self.constructors.push((
            type_name::<M>(),
            Box::new(move || constructor().map(|m| Box::new(m) as Box<dyn Module>)),
        ));
        self
    }

    /// Adds a module built with `Default`.
    pub fn register_default<M: Module + Default>(&mut self) -> &mut Self {
        self.register(|| Ok(M::default()))
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    pub(crate) fn into_constructors(self) -> Vec<(&'static str, Constructor)> {
        self.constructors
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.constructors.iter().map(|(name, _)| name))
            .finish()
    }
}
