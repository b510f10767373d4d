//! The dynamic instance: turns changing inputs into a mounted component
//!
//! Every input change synchronously tears down what is mounted, emits
//! `before_ready`, and starts a new build:
//!
//! ```text
//! resolve source -> build artifact -> cache lookup / compile -> mount -> bind context
//! ```
//!
//! Builds are not cancelled. Each one carries an id, and a build that is no
//! longer the latest when it resumes is discarded instead of mounted.

use std::cell::RefCell;
use std::rc::Rc;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::future::{self, FutureExt, LocalBoxFuture};
use log::{debug, warn};

use crate::artifact::{ArtifactBuilder, ContainerArtifact, ImportLists, ModuleRef};
use crate::cache::{share, CompilationCache};
use crate::compiler::{Compiler, DynamicInstance};
use crate::config::DynamicInputs;
use crate::context::ContextBinder;
use crate::events::EventEmitter;
use crate::hash::{ContentHasher, Fnv1a32};
use crate::lifecycle::{Lifecycle, LifecycleEvent, LifecycleState};
use crate::mount::{BuiltArtifacts, Injector, MountRequest, MountedInstance, Mounter, ViewContainer};
use crate::resolver::{HttpClient, ModuleLoader, TemplateResolver};
use crate::selector::{next_selector, DEFAULT_SELECTOR_PREFIX};
use crate::DynamicError;

/// Collaborators shared by dynamic instances of one host
#[derive(Clone)]
pub struct HostServices {
    pub compiler: Rc<dyn Compiler>,
    pub cache: CompilationCache,
    pub loader: Rc<dyn ModuleLoader>,
    pub http: Rc<dyn HttpClient>,
    pub hasher: Rc<dyn ContentHasher>,
    pub injector: Rc<Injector>,
    /// Imported by every artifact, ahead of per-instance modules
    pub static_modules: Vec<ModuleRef>,
}

impl HostServices {
    pub fn new(
        compiler: Rc<dyn Compiler>,
        loader: Rc<dyn ModuleLoader>,
        http: Rc<dyn HttpClient>,
    ) -> Self {
        Self {
            compiler,
            cache: CompilationCache::global(),
            loader,
            http,
            hasher: Rc::new(Fnv1a32),
            injector: Injector::root(),
            static_modules: Vec::new(),
        }
    }

    /// Use `cache` instead of the thread's shared cache
    pub fn with_cache(mut self, cache: CompilationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_hasher(mut self, hasher: Rc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_injector(mut self, injector: Rc<Injector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn with_static_modules(mut self, modules: Vec<ModuleRef>) -> Self {
        self.static_modules = modules;
        self
    }
}

struct State {
    lifecycle: Lifecycle,
    inputs: DynamicInputs,
    mounted: Option<MountedInstance>,
    built: Option<BuiltArtifacts>,
    latest_build: u64,
}

struct Inner {
    selector: String,
    compiler: Rc<dyn Compiler>,
    cache: CompilationCache,
    hasher: Rc<dyn ContentHasher>,
    static_modules: Vec<ModuleRef>,
    resolver: TemplateResolver,
    mounter: Mounter,
    state: RefCell<State>,
    before_ready: EventEmitter<()>,
    ready: EventEmitter<DynamicInstance>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let mounted = state.mounted.take();
        let built = state.built.take();
        self.mounter.unmount(mounted, built);
    }
}

/// A host slot whose component is supplied at runtime
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct DynamicBase {
    inner: Rc<Inner>,
}

impl DynamicBase {
    pub fn new(services: HostServices, container: Rc<dyn ViewContainer>) -> Self {
        Self::with_selector_prefix(services, container, DEFAULT_SELECTOR_PREFIX)
    }

    pub fn with_selector_prefix(
        services: HostServices,
        container: Rc<dyn ViewContainer>,
        prefix: &str,
    ) -> Self {
        let resolver = TemplateResolver::new(services.loader.clone(), services.http.clone());
        let mounter = Mounter::new(container, services.injector.clone(), services.compiler.clone());
        Self {
            inner: Rc::new(Inner {
                selector: next_selector(prefix),
                compiler: services.compiler,
                cache: services.cache,
                hasher: services.hasher,
                static_modules: services.static_modules,
                resolver,
                mounter,
                state: RefCell::new(State {
                    lifecycle: Lifecycle::new(),
                    inputs: DynamicInputs::default(),
                    mounted: None,
                    built: None,
                    latest_build: 0,
                }),
                before_ready: EventEmitter::new(),
                ready: EventEmitter::new(),
            }),
        }
    }

    pub fn selector(&self) -> &str {
        &self.inner.selector
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.borrow().lifecycle.state()
    }

    pub fn inputs(&self) -> DynamicInputs {
        self.inner.state.borrow().inputs.clone()
    }

    /// The currently mounted component, if any
    pub fn instance(&self) -> Option<DynamicInstance> {
        self.inner
            .state
            .borrow()
            .mounted
            .as_ref()
            .map(|mounted| mounted.component.clone())
    }

    /// Fires at the start of every input change
    pub fn subscribe_before_ready(&self) -> UnboundedReceiver<()> {
        self.inner.before_ready.subscribe()
    }

    /// Fires once per successful mount with the mounted instance
    pub fn subscribe_ready(&self) -> UnboundedReceiver<DynamicInstance> {
        self.inner.ready.subscribe()
    }

    /// Apply new inputs
    ///
    /// Teardown and `before_ready` happen before this returns. The returned
    /// future drives the build and resolves to the mounted instance, or to
    /// `None` when a newer change made this build stale.
    pub fn on_changes(
        &self,
        inputs: DynamicInputs,
    ) -> LocalBoxFuture<'static, Result<Option<DynamicInstance>, DynamicError>> {
        let (build, mounted, built) = {
            let mut state = self.inner.state.borrow_mut();
            if let Err(err) = state.lifecycle.apply(LifecycleEvent::Change) {
                return future::ready(Err(err.into())).boxed_local();
            }
            state.latest_build += 1;
            state.inputs = inputs.clone();
            (state.latest_build, state.mounted.take(), state.built.take())
        };

        self.inner.mounter.unmount(mounted, built);
        if let Err(err) = self.apply(LifecycleEvent::TornDown) {
            return future::ready(Err(err.into())).boxed_local();
        }
        self.inner.before_ready.emit(());
        debug!("{}: starting build {}", self.inner.selector, build);

        let this = self.clone();
        async move {
            let result = this.run_build(build, &inputs).await;
            if result.is_err() && this.is_current(build) {
                let _ = this.apply(LifecycleEvent::Failed);
            }
            result
        }
        .boxed_local()
    }

    /// Tear down and return to idle; in-flight builds become stale
    pub fn dispose(&self) {
        let (mounted, built) = {
            let mut state = self.inner.state.borrow_mut();
            state.latest_build += 1;
            let _ = state.lifecycle.apply(LifecycleEvent::Dispose);
            (state.mounted.take(), state.built.take())
        };
        self.inner.mounter.unmount(mounted, built);
    }

    async fn run_build(
        &self,
        build: u64,
        inputs: &DynamicInputs,
    ) -> Result<Option<DynamicInstance>, DynamicError> {
        let inner = &self.inner;

        let resolved = inner.resolver.resolve_source(inputs).await?;
        if !self.advance(build, LifecycleEvent::Resolved)? {
            return Ok(None);
        }

        let builder = ArtifactBuilder::new(&inner.selector, &inputs.styles, inner.hasher.as_ref());
        let artifact = builder.build(
            &resolved.source,
            ImportLists {
                static_modules: &inner.static_modules,
                instance_modules: &inputs.modules,
                lazy_modules: &resolved.lazy_modules,
            },
        );
        inner.state.borrow_mut().built = Some(BuiltArtifacts {
            container: artifact.id,
            component: artifact.component.id,
        });
        self.apply(LifecycleEvent::Built)?;

        let pending = match artifact.content_hash() {
            Some(hash) => inner
                .cache
                .get_or_insert_with(hash, || share(inner.compiler.compile(&artifact))),
            None => share(inner.compiler.compile(&artifact)),
        };
        let compiled = pending.await?;
        if !self.advance(build, LifecycleEvent::Compiled)? {
            self.forget(&artifact);
            return Ok(None);
        }

        let request = MountRequest {
            selector: inner.selector.clone(),
            content_hash: artifact.content_hash().map(str::to_string),
        };
        let mounted = inner.mounter.mount(&compiled, &request)?;
        let instance = mounted.component.clone();
        {
            let mut state = inner.state.borrow_mut();
            state.mounted = Some(mounted);
            state.lifecycle.apply(LifecycleEvent::Instantiated)?;
        }

        ContextBinder::bind(inputs.context.as_ref(), instance.properties());
        self.apply(LifecycleEvent::Bound)?;

        inner.ready.emit(instance.clone());
        Ok(Some(instance))
    }

    fn is_current(&self, build: u64) -> bool {
        self.inner.state.borrow().latest_build == build
    }

    fn apply(&self, event: LifecycleEvent) -> Result<LifecycleState, crate::lifecycle::LifecycleError> {
        self.inner.state.borrow_mut().lifecycle.apply(event)
    }

    /// Apply `event` for `build`, or report that the build went stale
    fn advance(&self, build: u64, event: LifecycleEvent) -> Result<bool, DynamicError> {
        if !self.is_current(build) {
            warn!(
                "{}: discarding stale build {} before {:?}",
                self.inner.selector, build, event
            );
            return Ok(false);
        }
        self.apply(event)?;
        Ok(true)
    }

    /// Clear compiler state for an artifact that will never be mounted
    fn forget(&self, artifact: &ContainerArtifact) {
        self.inner.compiler.clear_cache(artifact.id);
        self.inner.compiler.clear_cache(artifact.component.id);
    }
}
