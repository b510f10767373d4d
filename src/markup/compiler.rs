//! In-process compiler for markup templates

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use futures_util::future::{self, FutureExt, LocalBoxFuture};
use log::debug;

use super::ast::Template;
use super::grammar::parse;
use super::view::{MarkupComponentFactory, MarkupModuleFactory};
use crate::artifact::{ArtifactId, ComponentTemplate, ContainerArtifact};
use crate::compiler::{CompiledArtifact, Compiler};
use crate::error::CompileError;

/// Compiles artifacts whose templates use the markup syntax
///
/// Results are remembered per artifact identity until `clear_cache` is
/// called for that identity.
#[derive(Debug, Default)]
pub struct MarkupCompiler {
    /// Base path for resolving relative template paths
    base_path: Option<PathBuf>,
    compiled: RefCell<HashMap<ArtifactId, CompiledArtifact>>,
    compilations: Cell<usize>,
}

impl MarkupCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler with a base path for template files
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
            ..Self::default()
        }
    }

    /// Resolve a relative path against the base path
    pub fn resolve_path(&self, relative: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) => base.join(relative),
            None => relative.to_path_buf(),
        }
    }

    /// Number of templates actually parsed so far
    pub fn compilations(&self) -> usize {
        self.compilations.get()
    }

    /// Whether compiler state is held for `id`
    pub fn is_cached(&self, id: ArtifactId) -> bool {
        self.compiled.borrow().contains_key(&id)
    }

    fn compile_now(&self, artifact: &ContainerArtifact) -> Result<CompiledArtifact, CompileError> {
        if let Some(compiled) = self.compiled.borrow().get(&artifact.id) {
            return Ok(compiled.clone());
        }

        let component = &artifact.component;
        let template = match &component.template {
            ComponentTemplate::Text(text) => parse(text)?,
            ComponentTemplate::Path(path) => {
                let full_path = self.resolve_path(path);
                let text = std::fs::read_to_string(&full_path).map_err(|e| {
                    CompileError::TemplateFile {
                        path: full_path.clone(),
                        message: e.to_string(),
                    }
                })?;
                parse(&text)?
            }
            ComponentTemplate::Empty => Template::default(),
        };
        self.compilations.set(self.compilations.get() + 1);
        debug!(
            "compiled {} ({} nodes, {} imports)",
            component.selector,
            template.nodes.len(),
            artifact.imports.len()
        );

        let compiled = CompiledArtifact {
            module_factory: Rc::new(MarkupModuleFactory {
                imports: artifact.imports.clone(),
            }),
            component_factories: vec![Rc::new(MarkupComponentFactory {
                selector: component.selector.clone(),
                content_hash: component.content_hash.clone(),
                template: Rc::new(template),
                styles: Rc::from(component.styles.clone()),
            })],
        };

        let mut cache = self.compiled.borrow_mut();
        cache.insert(artifact.id, compiled.clone());
        cache.insert(component.id, compiled.clone());
        Ok(compiled)
    }
}

impl Compiler for MarkupCompiler {
    fn compile(
        &self,
        artifact: &ContainerArtifact,
    ) -> LocalBoxFuture<'static, Result<CompiledArtifact, CompileError>> {
        future::ready(self.compile_now(artifact)).boxed_local()
    }

    fn clear_cache(&self, id: ArtifactId) {
        self.compiled.borrow_mut().remove(&id);
    }
}
