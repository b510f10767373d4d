//! Lazy module loading

use std::cell::RefCell;
use std::collections::HashMap;

use futures_util::future::{self, FutureExt, LocalBoxFuture};
use thiserror::Error;

use crate::artifact::ModuleRef;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("lazy module not found: {name}")]
    NotFound { name: String },

    #[error("failed to load lazy module {name}: {message}")]
    Failed { name: String, message: String },
}

/// Resolves a module name to a loadable module
pub trait ModuleLoader {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Result<ModuleRef, LoadError>>;
}

/// Loader backed by a fixed table of known modules
///
/// Names use the `path#Export` form; when no entry is registered and the
/// loader is permissive, the export part (or the whole name) becomes the
/// module reference.
#[derive(Debug, Default)]
pub struct StaticModuleLoader {
    modules: RefCell<HashMap<String, ModuleRef>>,
    permissive: bool,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader that accepts any name
    pub fn permissive() -> Self {
        Self {
            modules: RefCell::default(),
            permissive: true,
        }
    }

    pub fn register(&self, name: impl Into<String>, module: ModuleRef) {
        self.modules.borrow_mut().insert(name.into(), module);
    }

    pub fn with_module(self, name: impl Into<String>, module: ModuleRef) -> Self {
        self.register(name, module);
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Result<ModuleRef, LoadError>> {
        let result = match self.modules.borrow().get(name) {
            Some(module) => Ok(module.clone()),
            None if self.permissive => Ok(module_from_name(name)),
            None => Err(LoadError::NotFound {
                name: name.to_string(),
            }),
        };
        future::ready(result).boxed_local()
    }
}

fn module_from_name(name: &str) -> ModuleRef {
    match name.split_once('#') {
        Some((_, export)) if !export.is_empty() => ModuleRef::new(export),
        _ => ModuleRef::new(name),
    }
}
