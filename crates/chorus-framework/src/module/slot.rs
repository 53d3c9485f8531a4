//! Typed dependency slots and the capability map that fills them.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A capability as stored by the manager: an `Arc<T>` erased to `Any`.
pub type CapabilityArc = Arc<dyn Any + Send + Sync>;

/// Capabilities published by one module, keyed by `TypeId::of::<T>()`.
#[derive(Clone, Default)]
pub struct Capabilities {
    map: HashMap<TypeId, CapabilityArc>,
}

impl Capabilities {
    /// Publishes `capability` under `T`.  Returns `true` if it replaced one.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, capability: Arc<T>) -> bool {
        self.map
            .insert(TypeId::of::<T>(), Arc::new(capability) as CapabilityArc)
            .is_some()
    }

    /// Looks up the capability published under `T`.
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|arc| arc.downcast_ref::<Arc<T>>().map(Arc::clone))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("len", &self.map.len())
            .finish()
    }
}

/// A handle to another module's capability.
///
/// Declared during `load` with
/// [`LoadContext::depend_module`](super::LoadContext::depend_module).  The
/// manager fills the slot when the target is enabled and empties it again
/// when the target is disabled.
///
/// ```rust,ignore
/// struct Greeter { factoids: ModuleSlot<dyn FactoidApi> }
///
/// async fn load(&self, ctx: &LoadContext<'_>) -> anyhow::Result<()> {
///     ctx.depend_module("factoid", &self.factoids);
///     Ok(())
/// }
/// ```
pub struct ModuleSlot<T: ?Sized> {
    inner: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T: ?Sized> ModuleSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// The capability, if the target is currently enabled.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.read().clone()
    }

    pub fn is_filled(&self) -> bool {
        self.inner.read().is_some()
    }

    pub(crate) fn fill(&self, value: Option<Arc<T>>) {
        *self.inner.write() = value;
    }
}

impl<T: ?Sized> Clone for ModuleSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> Default for ModuleSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for ModuleSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSlot")
            .field("filled", &self.is_filled())
            .finish()
    }
}
