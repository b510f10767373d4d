//! Artifact descriptors and the builder that produces them
//!
//! An artifact is a plain descriptor record: a component (selector, template,
//! styles) wrapped in a container that lists the modules it imports. It is
//! what the compiler service consumes.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::hash::ContentHasher;

/// Where the template for one build comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateSource {
    /// Template text supplied directly (or fetched remotely)
    Inline(String),
    /// Reference to a template file, resolved by the compiler
    PathRef(PathBuf),
    /// Remote URL; must be resolved to `Inline` before building
    RemoteRef(String),
    #[default]
    None,
}

/// Reference to an importable module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    pub name: String,
}

impl ModuleRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Identity of one built artifact, used by the compiler's own bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(u64);

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

impl ArtifactId {
    fn next() -> Self {
        Self(NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Template carried by a component artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentTemplate {
    Text(String),
    Path(PathBuf),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentArtifact {
    pub id: ArtifactId,
    pub selector: String,
    pub template: ComponentTemplate,
    pub styles: Vec<String>,
    /// Set iff the template is inline text
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerArtifact {
    pub id: ArtifactId,
    pub component: ComponentArtifact,
    pub imports: Vec<ModuleRef>,
}

impl ContainerArtifact {
    /// Inherited from the component
    pub fn content_hash(&self) -> Option<&str> {
        self.component.content_hash.as_deref()
    }
}

/// The three import lists merged into a container, in merge order
#[derive(Debug, Clone, Default)]
pub struct ImportLists<'a> {
    pub static_modules: &'a [ModuleRef],
    pub instance_modules: &'a [ModuleRef],
    pub lazy_modules: &'a [ModuleRef],
}

/// Builds container artifacts for one dynamic instance
pub struct ArtifactBuilder<'a> {
    selector: &'a str,
    styles: &'a [String],
    hasher: &'a dyn ContentHasher,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(selector: &'a str, styles: &'a [String], hasher: &'a dyn ContentHasher) -> Self {
        Self {
            selector,
            styles,
            hasher,
        }
    }

    /// Wrap `source` into a container artifact
    ///
    /// A `RemoteRef` source is treated like `None`; the resolver is expected
    /// to have replaced it with the fetched text.
    pub fn build(&self, source: &TemplateSource, imports: ImportLists<'_>) -> ContainerArtifact {
        let (template, content_hash) = match source {
            TemplateSource::Inline(text) => (
                ComponentTemplate::Text(text.clone()),
                Some(self.hasher.hash(text)),
            ),
            TemplateSource::PathRef(path) => (ComponentTemplate::Path(path.clone()), None),
            TemplateSource::RemoteRef(_) | TemplateSource::None => (ComponentTemplate::Empty, None),
        };

        let component = ComponentArtifact {
            id: ArtifactId::next(),
            selector: self.selector.to_string(),
            template,
            styles: self.styles.to_vec(),
            content_hash,
        };

        ContainerArtifact {
            id: ArtifactId::next(),
            component,
            imports: merge_imports(imports),
        }
    }
}

/// Ordered union: first occurrence wins
fn merge_imports(lists: ImportLists<'_>) -> Vec<ModuleRef> {
    let mut merged: Vec<ModuleRef> = Vec::new();
    let all = lists
        .static_modules
        .iter()
        .chain(lists.instance_modules)
        .chain(lists.lazy_modules);
    for module in all {
        if !merged.contains(module) {
            merged.push(module.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_fnv32a, Fnv1a32};
    use pretty_assertions::assert_eq;

    fn modules(names: &[&str]) -> Vec<ModuleRef> {
        names.iter().map(|n| ModuleRef::new(*n)).collect()
    }

    #[test]
    fn test_inline_source_sets_hash() {
        let styles = vec!["p { color: red }".to_string()];
        let builder = ArtifactBuilder::new("dyn-1", &styles, &Fnv1a32);
        let artifact = builder.build(
            &TemplateSource::Inline("<p>hi</p>".into()),
            ImportLists::default(),
        );

        assert_eq!(artifact.component.selector, "dyn-1");
        assert_eq!(
            artifact.component.template,
            ComponentTemplate::Text("<p>hi</p>".into())
        );
        assert_eq!(artifact.component.styles, styles);
        assert_eq!(artifact.content_hash(), Some(hash_fnv32a("<p>hi</p>").as_str()));
    }

    #[test]
    fn test_path_and_empty_sources_have_no_hash() {
        let builder = ArtifactBuilder::new("dyn-2", &[], &Fnv1a32);

        let path = builder.build(
            &TemplateSource::PathRef("views/a.html".into()),
            ImportLists::default(),
        );
        assert_eq!(
            path.component.template,
            ComponentTemplate::Path("views/a.html".into())
        );
        assert_eq!(path.content_hash(), None);

        let empty = builder.build(&TemplateSource::None, ImportLists::default());
        assert_eq!(empty.component.template, ComponentTemplate::Empty);
        assert_eq!(empty.content_hash(), None);
    }

    #[test]
    fn test_imports_merge_in_order_without_duplicates() {
        let builder = ArtifactBuilder::new("dyn-3", &[], &Fnv1a32);
        let static_modules = modules(&["common", "forms"]);
        let instance_modules = modules(&["charts", "common"]);
        let lazy_modules = modules(&["admin"]);

        let artifact = builder.build(
            &TemplateSource::None,
            ImportLists {
                static_modules: &static_modules,
                instance_modules: &instance_modules,
                lazy_modules: &lazy_modules,
            },
        );

        assert_eq!(
            artifact.imports,
            modules(&["common", "forms", "charts", "admin"])
        );
    }

    #[test]
    fn test_each_build_gets_fresh_identities() {
        let builder = ArtifactBuilder::new("dyn-4", &[], &Fnv1a32);
        let a = builder.build(&TemplateSource::None, ImportLists::default());
        let b = builder.build(&TemplateSource::None, ImportLists::default());
        assert_ne!(a.id, b.id);
        assert_ne!(a.component.id, b.component.id);
        assert_ne!(a.id, a.component.id);
    }
}
