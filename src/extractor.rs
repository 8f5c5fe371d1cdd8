//! [`SyntaxTree`] → ordered [`FunctionSignature`]s.

use serde::Serialize;

use crate::error::StructuralExtractionError;
use crate::parser::{SyntaxNode, SyntaxTree};

/// A declared function. Identity is `name`; the rest is attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generics: Vec<String>,
    pub source_file: String,
    /// 1-indexed declaration line.
    pub line: usize,
    /// Innermost enclosing scope label (`impl Graph` → `Graph`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl FunctionSignature {
    /// `container::name<T, U>`, for diagnostics.
    pub fn display_name(&self) -> String {
        let mut out = String::new();
        if let Some(c) = &self.container {
            out.push_str(c);
            out.push_str("::");
        }
        out.push_str(&self.name);
        if !self.generics.is_empty() {
            out.push('<');
            out.push_str(&self.generics.join(", "));
            out.push('>');
        }
        out
    }
}

/// Lazy depth-first walk yielding signatures in declaration order.
pub struct Signatures<'t> {
    file: &'t str,
    stack: Vec<(&'t SyntaxNode, Option<&'t str>)>,
}

/// Walk `tree` lazily.
pub fn signatures(tree: &SyntaxTree) -> Signatures<'_> {
    Signatures {
        file: &tree.file,
        stack: vec![(&tree.root, None)],
    }
}

/// Collect every signature of `tree`, failing on the first structural mismatch.
pub fn extract(tree: &SyntaxTree) -> Result<Vec<FunctionSignature>, StructuralExtractionError> {
    signatures(tree).collect()
}

impl<'t> Signatures<'t> {
    // Reverse push keeps pops in source order.
    fn push_children(&mut self, children: &'t [SyntaxNode], container: Option<&'t str>) {
        self.stack.extend(children.iter().rev().map(|c| (c, container)));
    }
}

impl<'t> Iterator for Signatures<'t> {
    type Item = Result<FunctionSignature, StructuralExtractionError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, container)) = self.stack.pop() {
            match node {
                SyntaxNode::Function(decl) => {
                    self.push_children(&decl.children, container);
                    let Some(name) = decl.name.as_deref().filter(|n| !n.is_empty()) else {
                        // Unrecoverable: drain so the error is the last item.
                        self.stack.clear();
                        return Some(Err(StructuralExtractionError {
                            file: self.file.to_string(),
                            line: decl.position.line,
                            column: decl.position.column,
                            kind: decl.kind.to_string(),
                        }));
                    };
                    return Some(Ok(FunctionSignature {
                        name: name.to_string(),
                        generics: decl.generics.clone(),
                        source_file: self.file.to_string(),
                        line: decl.position.line,
                        container: container.map(str::to_string),
                    }));
                }
                SyntaxNode::Scope(scope) => {
                    let label = scope.label.as_deref().or(container);
                    self.push_children(&scope.children, label);
                }
                SyntaxNode::Group(children) => self.push_children(children, container),
            }
        }
        None
    }
}
