//! Content-addressed compilation cache
//!
//! Values are *pending* compilations, stored as shared futures, so that every
//! caller asking for the same hash awaits the same compilation even while it
//! is still in flight. Entries are never evicted automatically.
//!
//! Instances use the thread's shared cache unless given their own, so every
//! dynamic instance on the event loop compiles a given template at most once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use log::debug;

use crate::compiler::CompiledArtifact;
use crate::error::CompileError;

/// A compilation that any number of callers can await
pub type PendingCompilation =
    Shared<LocalBoxFuture<'static, Result<Rc<CompiledArtifact>, CompileError>>>;

/// Wrap a compiler future so it can be stored and shared
pub fn share(
    compilation: LocalBoxFuture<'static, Result<CompiledArtifact, CompileError>>,
) -> PendingCompilation {
    compilation.map(|result| result.map(Rc::new)).boxed_local().shared()
}

/// Cache handle; clones share the same entries
#[derive(Clone, Default)]
pub struct CompilationCache {
    entries: Rc<RefCell<HashMap<String, PendingCompilation>>>,
}

thread_local! {
    static GLOBAL_CACHE: CompilationCache = CompilationCache::new();
}

impl CompilationCache {
    /// A fresh cache shared only by clones of the returned handle
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every instance on this thread
    pub fn global() -> Self {
        GLOBAL_CACHE.with(|cache| cache.clone())
    }

    /// Whether both handles point at the same entries
    pub fn ptr_eq(&self, other: &CompilationCache) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub fn get(&self, hash: &str) -> Option<PendingCompilation> {
        self.entries.borrow().get(hash).cloned()
    }

    pub fn set(&self, hash: impl Into<String>, compilation: PendingCompilation) {
        self.entries.borrow_mut().insert(hash.into(), compilation);
    }

    /// Lookup-then-insert as one step
    ///
    /// `compile` runs only on a miss, and its pending result is stored before
    /// this returns.
    pub fn get_or_insert_with(
        &self,
        hash: &str,
        compile: impl FnOnce() -> PendingCompilation,
    ) -> PendingCompilation {
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.get(hash) {
            debug!("compilation cache hit for {}", hash);
            return existing.clone();
        }
        debug!("compilation cache miss for {}", hash);
        let pending = compile();
        entries.insert(hash.to_string(), pending.clone());
        pending
    }

    pub fn remove(&self, hash: &str) -> Option<PendingCompilation> {
        self.entries.borrow_mut().remove(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.borrow().contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use futures_util::future;

    use crate::compiler::{ComponentFactory, CompiledArtifact, ModuleFactory, ModuleInstance};
    use crate::mount::Injector;

    struct NoopModule;

    impl ModuleInstance for NoopModule {
        fn destroy(&self) {}
    }

    impl ModuleFactory for NoopModule {
        fn create(&self, _injector: &Rc<Injector>) -> Rc<dyn ModuleInstance> {
            Rc::new(NoopModule)
        }
    }

    fn empty_compiled() -> CompiledArtifact {
        CompiledArtifact {
            module_factory: Rc::new(NoopModule),
            component_factories: Vec::<Rc<dyn ComponentFactory>>::new(),
        }
    }

    #[test]
    fn test_get_or_insert_compiles_once_per_hash() {
        let cache = CompilationCache::new();
        let calls = Cell::new(0);
        let compile = || {
            calls.set(calls.get() + 1);
            share(future::ready(Ok(empty_compiled())).boxed_local())
        };

        let _ = cache.get_or_insert_with("abc", compile);
        let _ = cache.get_or_insert_with("abc", compile);
        let _ = cache.get_or_insert_with("def", compile);

        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_pending_entry_is_visible_before_resolution() {
        let cache = CompilationCache::new();
        let _ = cache.get_or_insert_with("abc", || share(future::pending().boxed_local()));
        assert!(cache.contains("abc"));
        assert!(cache.get("abc").is_some());
    }

    #[tokio::test]
    async fn test_shared_result_is_same_artifact() {
        let cache = CompilationCache::new();
        let first = cache.get_or_insert_with("abc", || {
            share(future::ready(Ok(empty_compiled())).boxed_local())
        });
        let second = cache.get("abc").expect("entry stored");

        let (a, b) = future::join(first, second).await;
        let (a, b) = (a.expect("compiles"), b.expect("compiles"));
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_explicit_removal() {
        let cache = CompilationCache::new();
        cache.set("abc", share(future::pending().boxed_local()));
        assert!(cache.remove("abc").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_global_handles_share_entries() {
        let a = CompilationCache::global();
        let b = CompilationCache::global();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&CompilationCache::new()));

        a.set("global-entry", share(future::pending().boxed_local()));
        assert!(b.contains("global-entry"));
        let _ = a.remove("global-entry");
    }
}
