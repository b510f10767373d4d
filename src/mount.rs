//! Mounting compiled artifacts into the host view
//!
//! The mounter instantiates a compiled module, picks the component factory
//! belonging to the current build, instantiates the component and inserts its
//! view at the front of the host container. Teardown reverses all of it and
//! asks the compiler to forget the artifacts it was handed.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::artifact::ArtifactId;
use crate::compiler::{CompiledArtifact, ComponentFactory, Compiler, DynamicInstance, ModuleInstance};
use crate::context::Value;

/// Errors that can occur while mounting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    /// No component factory matched the selector or the content hash
    #[error("no component factory matches selector {selector} (content hash: {})", .content_hash.as_deref().unwrap_or("none"))]
    NoMatchingFactory {
        selector: String,
        content_hash: Option<String>,
    },
}

/// Upstream-provided injector scope that modules and components are created in
#[derive(Debug, Default)]
pub struct Injector {
    parent: Option<Rc<Injector>>,
    providers: BTreeMap<String, Value>,
}

impl Injector {
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A child scope that falls back to `parent` for unknown tokens
    pub fn child(parent: &Rc<Injector>, providers: BTreeMap<String, Value>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            providers,
        })
    }

    pub fn get(&self, token: &str) -> Option<Value> {
        match self.providers.get(token) {
            Some(value) => Some(value.clone()),
            None => self.parent.as_ref().and_then(|p| p.get(token)),
        }
    }
}

/// A view that can be attached to the host tree
pub trait HostView {
    fn render(&self) -> String;
}

/// The host's view-insertion primitive
pub trait ViewContainer {
    fn insert(&self, view: Rc<dyn HostView>, index: usize);
    fn remove(&self, view: &Rc<dyn HostView>);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory view container; renders its views in order
#[derive(Default)]
pub struct MemoryViewContainer {
    views: RefCell<Vec<Rc<dyn HostView>>>,
}

impl MemoryViewContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self) -> String {
        self.views
            .borrow()
            .iter()
            .map(|view| view.render())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ViewContainer for MemoryViewContainer {
    fn insert(&self, view: Rc<dyn HostView>, index: usize) {
        let mut views = self.views.borrow_mut();
        let index = index.min(views.len());
        views.insert(index, view);
    }

    fn remove(&self, view: &Rc<dyn HostView>) {
        self.views.borrow_mut().retain(|v| !Rc::ptr_eq(v, view));
    }

    fn len(&self) -> usize {
        self.views.borrow().len()
    }
}

/// What the current build expects to find among the compiled factories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub selector: String,
    pub content_hash: Option<String>,
}

/// The module, component and view alive for one dynamic instance
pub struct MountedInstance {
    pub module: Rc<dyn ModuleInstance>,
    pub component: DynamicInstance,
    pub view: Rc<dyn HostView>,
}

/// Identities of the artifacts handed to the compiler by the last build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltArtifacts {
    pub container: ArtifactId,
    pub component: ArtifactId,
}

pub struct Mounter {
    container: Rc<dyn ViewContainer>,
    injector: Rc<Injector>,
    compiler: Rc<dyn Compiler>,
}

impl Mounter {
    pub fn new(
        container: Rc<dyn ViewContainer>,
        injector: Rc<Injector>,
        compiler: Rc<dyn Compiler>,
    ) -> Self {
        Self {
            container,
            injector,
            compiler,
        }
    }

    pub fn mount(
        &self,
        compiled: &CompiledArtifact,
        request: &MountRequest,
    ) -> Result<MountedInstance, MountError> {
        let module = compiled.module_factory.create(&self.injector);

        let factory = match select_factory(&compiled.component_factories, request) {
            Some(factory) => factory,
            None => {
                module.destroy();
                return Err(MountError::NoMatchingFactory {
                    selector: request.selector.clone(),
                    content_hash: request.content_hash.clone(),
                });
            }
        };

        let component = factory.create(&self.injector, &module);
        let view = component.host_view();
        self.container.insert(view.clone(), 0);
        info!("mounted {} using factory {}", request.selector, factory.selector());

        Ok(MountedInstance {
            module,
            component,
            view,
        })
    }

    /// Destroy what is mounted and clear compiler entries for the last build
    ///
    /// Both arguments are taken by value so a second call has nothing to do.
    pub fn unmount(&self, mounted: Option<MountedInstance>, built: Option<BuiltArtifacts>) {
        if let Some(mounted) = mounted {
            debug!("destroying {}", mounted.component.selector());
            self.container.remove(&mounted.view);
            mounted.module.destroy();
            mounted.component.destroy();
        }
        if let Some(built) = built {
            self.compiler.clear_cache(built.container);
            self.compiler.clear_cache(built.component);
        }
    }
}

/// First factory, in declaration order, matching the selector or the hash
fn select_factory<'a>(
    factories: &'a [Rc<dyn ComponentFactory>],
    request: &MountRequest,
) -> Option<&'a Rc<dyn ComponentFactory>> {
    factories.iter().find(|factory| {
        factory.selector() == request.selector
            || (request.content_hash.is_some()
                && factory.content_hash() == request.content_hash.as_deref())
    })
}
