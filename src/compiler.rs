//! Compiler service interface
//!
//! A compiler turns a [`ContainerArtifact`] into a [`CompiledArtifact`]: one
//! module factory plus the component factories the module declares. The
//! factories produce the live module and component instances that the
//! mounter attaches to the host view.

use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::artifact::{ArtifactId, ContainerArtifact};
use crate::context::PropertyTable;
use crate::error::CompileError;
use crate::mount::{HostView, Injector};

/// Compiles artifacts and owns any identity-keyed bookkeeping for them
pub trait Compiler {
    fn compile(
        &self,
        artifact: &ContainerArtifact,
    ) -> LocalBoxFuture<'static, Result<CompiledArtifact, CompileError>>;

    /// Drop compiler-internal state kept for the artifact with `id`
    fn clear_cache(&self, id: ArtifactId);
}

impl<C: Compiler + ?Sized> Compiler for Rc<C> {
    fn compile(
        &self,
        artifact: &ContainerArtifact,
    ) -> LocalBoxFuture<'static, Result<CompiledArtifact, CompileError>> {
        (**self).compile(artifact)
    }

    fn clear_cache(&self, id: ArtifactId) {
        (**self).clear_cache(id)
    }
}

/// Executable factory set produced from one artifact
#[derive(Clone)]
pub struct CompiledArtifact {
    pub module_factory: Rc<dyn ModuleFactory>,
    pub component_factories: Vec<Rc<dyn ComponentFactory>>,
}

impl fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selectors: Vec<&str> = self
            .component_factories
            .iter()
            .map(|factory| factory.selector())
            .collect();
        f.debug_struct("CompiledArtifact")
            .field("component_factories", &selectors)
            .finish()
    }
}

pub trait ModuleFactory {
    fn create(&self, injector: &Rc<Injector>) -> Rc<dyn ModuleInstance>;
}

pub trait ModuleInstance {
    fn destroy(&self);
}

pub trait ComponentFactory {
    fn selector(&self) -> &str;

    /// Content hash stored on the declared component, if it had inline text
    fn content_hash(&self) -> Option<&str>;

    fn create(
        &self,
        injector: &Rc<Injector>,
        module: &Rc<dyn ModuleInstance>,
    ) -> Rc<dyn ComponentInstance>;
}

/// A live component: exposes its property table and its host view
pub trait ComponentInstance {
    fn selector(&self) -> &str;
    fn properties(&self) -> &PropertyTable;
    fn host_view(&self) -> Rc<dyn HostView>;
    fn destroy(&self);
    fn is_destroyed(&self) -> bool;
}

/// Handle to a mounted component, as delivered by the `ready` notification
pub type DynamicInstance = Rc<dyn ComponentInstance>;
