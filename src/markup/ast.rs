//! Syntax tree of a markup template

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

/// A node with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

/// Expression inside `{{ ... }}`
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `name`
    Property(Spanned<Identifier>),
    /// `name(arg, ...)`
    Call {
        name: Spanned<Identifier>,
        args: Vec<Spanned<Literal>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Interpolation(Spanned<Expr>),
}

/// Root node - a parsed template
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}

impl Template {
    /// Names referenced by interpolations, in order of first use
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for node in &self.nodes {
            let Node::Interpolation(expr) = node else {
                continue;
            };
            let name = match &expr.node {
                Expr::Property(name) => name.node.as_str(),
                Expr::Call { name, .. } => name.node.as_str(),
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}
