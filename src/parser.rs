//! Source text → [`SyntaxTree`].
//!
//! tree-sitter produces the concrete tree; it is then lowered into a small
//! tagged tree holding only the productions the grammar marks as relevant.
//! Subtrees without any function declaration are dropped while lowering.

use tree_sitter::{Node, Parser};

use crate::error::ParseError;
use crate::grammar::{Grammar, Production};

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    fn of(node: Node) -> Self {
        let p = node.start_position();
        Self {
            line: p.row + 1,
            column: p.column + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// `None` only when the tree disagrees with the grammar (no name token).
    pub name: Option<String>,
    pub generics: Vec<String>,
    /// Grammar node kind, e.g. `function_item`.
    pub kind: &'static str,
    pub position: Position,
    /// Declarations nested inside the function.
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDecl {
    pub label: Option<String>,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxNode {
    Function(FunctionDecl),
    Scope(ScopeDecl),
    /// Any other node that has declarations somewhere below it.
    Group(Vec<SyntaxNode>),
}

/// Parse result for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    pub file: String,
    pub root: SyntaxNode,
}

/// Deepest nesting of function and scope declarations accepted in one file.
/// Lowered trees are recursive values; this keeps dropping and comparing them
/// within the stack.
pub const MAX_DECLARATION_DEPTH: usize = 256;

/// Parse `source_text` with `grammar`. Pure function of its inputs.
pub fn parse(grammar: &Grammar, file: &str, source_text: &str) -> Result<SyntaxTree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar.language())
        .map_err(|e| parse_error(file, 1, 1, format!("failed to set tree-sitter language: {e}")))?;

    let tree = parser
        .parse(source_text, None)
        .ok_or_else(|| parse_error(file, 1, 1, "parser produced no tree"))?;
    let root = tree.root_node();

    if root.has_error() {
        let (position, detail) = first_error(root).unwrap_or((Position::of(root), "syntax error".to_string()));
        return Err(parse_error(file, position.line, position.column, detail));
    }

    let children = lower_tree(grammar, source_text.as_bytes(), root).map_err(|position| {
        parse_error(
            file,
            position.line,
            position.column,
            format!("declarations nested deeper than {MAX_DECLARATION_DEPTH} levels"),
        )
    })?;
    Ok(SyntaxTree {
        file: file.to_string(),
        root: SyntaxNode::Group(children),
    })
}

fn parse_error(file: &str, line: usize, column: usize, detail: impl Into<String>) -> ParseError {
    ParseError {
        file: file.to_string(),
        line,
        column,
        detail: detail.into(),
    }
}

/// First ERROR or MISSING node in document order.
fn first_error(root: Node) -> Option<(Position, String)> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return Some((Position::of(node), format!("missing `{}`", node.kind())));
        }
        if node.is_error() {
            // An inner MISSING node is more precise than the ERROR wrapper.
            let mut cursor = node.walk();
            let missing = node.children(&mut cursor).find(|c| c.is_missing());
            return Some(match missing {
                Some(m) => (Position::of(m), format!("missing `{}`", m.kind())),
                None => (Position::of(node), "unexpected syntax".to_string()),
            });
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

/// A concrete node whose named children are being lowered.
struct Frame<'t> {
    node: Node<'t>,
    production: Option<Production>,
    pending: Vec<Node<'t>>,
    next: usize,
    /// Function and scope declarations on the path to here, this one included.
    depth: usize,
    lowered: Vec<SyntaxNode>,
}

impl<'t> Frame<'t> {
    fn new(grammar: &Grammar, node: Node<'t>, parent_depth: usize) -> Self {
        let production = grammar.production(node.kind());
        let depth = match production {
            Some(Production::Function | Production::Scope) => parent_depth + 1,
            _ => parent_depth,
        };
        let mut cursor = node.walk();
        let pending: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        Self {
            node,
            production,
            pending,
            next: 0,
            depth,
            lowered: Vec::new(),
        }
    }

    fn finish(self, grammar: &Grammar, source: &[u8]) -> Option<SyntaxNode> {
        let node = self.node;
        match self.production {
            Some(Production::Opaque) => None,
            Some(Production::Function) => Some(SyntaxNode::Function(FunctionDecl {
                name: field_text(source, node, grammar.name_field()),
                generics: generic_params(grammar, source, node),
                kind: node.kind(),
                position: Position::of(node),
                children: self.lowered,
            })),
            Some(Production::Scope) => {
                if self.lowered.is_empty() {
                    return None;
                }
                let label = grammar
                    .label_fields()
                    .iter()
                    .find_map(|f| field_text(source, node, f));
                Some(SyntaxNode::Scope(ScopeDecl {
                    label,
                    children: self.lowered,
                }))
            }
            None => {
                let mut lowered = self.lowered;
                match lowered.len() {
                    0 => None,
                    // Collapse single-child chains; nesting of plain nodes carries no meaning.
                    1 => lowered.pop(),
                    _ => Some(SyntaxNode::Group(lowered)),
                }
            }
        }
    }
}

/// Lower the named children of `root`, post-order on an explicit stack so
/// arbitrarily deep expressions do not grow the call stack. Fails with the
/// position of the first declaration past [`MAX_DECLARATION_DEPTH`].
fn lower_tree(grammar: &Grammar, source: &[u8], root: Node) -> Result<Vec<SyntaxNode>, Position> {
    let mut stack = vec![Frame::new(grammar, root, 0)];
    loop {
        let Some(top) = stack.last_mut() else {
            return Ok(Vec::new());
        };
        if let Some(&child) = top.pending.get(top.next) {
            top.next += 1;
            if grammar.production(child.kind()) == Some(Production::Opaque) {
                continue;
            }
            let frame = Frame::new(grammar, child, top.depth);
            if frame.depth > MAX_DECLARATION_DEPTH {
                return Err(Position::of(child));
            }
            stack.push(frame);
            continue;
        }

        let Some(done) = stack.pop() else {
            return Ok(Vec::new());
        };
        match stack.last_mut() {
            Some(parent) => {
                if let Some(lowered) = done.finish(grammar, source) {
                    parent.lowered.push(lowered);
                }
            }
            None => return Ok(done.lowered),
        }
    }
}

fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    node.utf8_text(source).unwrap_or("").trim()
}

fn field_text(source: &[u8], node: Node, field: &str) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    let text = node_text(source, child);
    (!text.is_empty()).then(|| text.to_string())
}

fn generic_params(grammar: &Grammar, source: &[u8], node: Node) -> Vec<String> {
    let Some(kind) = grammar.generics_kind() else {
        return vec![];
    };

    let mut cursor = node.walk();
    let Some(list) = node.named_children(&mut cursor).find(|c| c.kind() == kind) else {
        return vec![];
    };

    let mut cursor = list.walk();
    let params: Vec<Node> = list.named_children(&mut cursor).collect();
    params
        .into_iter()
        .filter(|p| !p.is_extra() && !p.kind().starts_with("attribute"))
        .filter(|p| grammar.production(p.kind()) != Some(Production::Opaque))
        .filter_map(|p| {
            let name_node = p
                .child_by_field_name("name")
                .or_else(|| p.child_by_field_name("left"))
                .or_else(|| is_identifier(p).then_some(p))
                .or_else(|| first_identifier(p))
                .unwrap_or(p);
            let text = node_text(source, name_node);
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}

fn is_identifier(node: Node) -> bool {
    node.kind().ends_with("identifier") || node.kind() == "lifetime"
}

fn first_identifier(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| is_identifier(*c));
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rust() -> Grammar {
        Grammar::builtin("rust").unwrap()
    }

    fn functions(node: &SyntaxNode, out: &mut Vec<FunctionDecl>) {
        match node {
            SyntaxNode::Function(f) => {
                out.push(f.clone());
                f.children.iter().for_each(|c| functions(c, out));
            }
            SyntaxNode::Scope(s) => s.children.iter().for_each(|c| functions(c, out)),
            SyntaxNode::Group(children) => children.iter().for_each(|c| functions(c, out)),
        }
    }

    #[test]
    fn lowers_functions_with_generics_and_positions() {
        let src = "use std::fmt;\n\nfn plain() {}\n\npub fn typed<'a, T: Clone, const N: usize>(x: &'a T) -> T { x.clone() }\n";
        let tree = parse(&rust(), "lib.rs", src).unwrap();
        let mut out = Vec::new();
        functions(&tree.root, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name.as_deref(), Some("plain"));
        assert!(out[0].generics.is_empty());
        assert_eq!(out[0].position, Position { line: 3, column: 1 });
        assert_eq!(out[1].name.as_deref(), Some("typed"));
        assert_eq!(out[1].generics, vec!["'a", "T", "N"]);
        assert_eq!(out[1].kind, "function_item");
    }

    #[test]
    fn impl_blocks_become_labelled_scopes() {
        let src = "struct Graph;\nimpl Graph {\n    pub fn get_node_id(&self) -> u32 { 0 }\n}\n";
        let tree = parse(&rust(), "graph.rs", src).unwrap();
        let SyntaxNode::Group(items) = &tree.root else {
            panic!("root is always a group, got {:?}", tree.root);
        };
        assert_eq!(items.len(), 1, "struct_item has no declarations and is pruned");
        let SyntaxNode::Scope(scope) = &items[0] else {
            panic!("expected the impl scope, got {:?}", items[0]);
        };
        assert_eq!(scope.label.as_deref(), Some("Graph"));
        assert_eq!(scope.children.len(), 1);
    }

    #[test]
    fn comments_and_strings_are_not_searched() {
        let src = "// fn commented_out() {}\nconst S: &str = \"fn in_string() {}\";\n";
        let tree = parse(&rust(), "x.rs", src).unwrap();
        assert_eq!(tree.root, SyntaxNode::Group(vec![]));
    }

    #[test]
    fn malformed_source_reports_position() {
        let src = "fn ok() {}\n\nfn broken( {\n";
        let err = parse(&rust(), "bad.rs", src).unwrap_err();
        assert_eq!(err.file, "bad.rs");
        assert!(err.line >= 3, "{err}");
        assert!(err.column >= 1);
    }

    #[test]
    fn deeply_nested_expression_is_lowered_without_recursion() {
        let depth = 100_000;
        let src = format!(
            "fn get_x_id() {{\n    let v = {}1{};\n}}\nfn get_x_name() {{}}\n",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let tree = parse(&rust(), "deep.rs", &src).unwrap();
        let mut out = Vec::new();
        functions(&tree.root, &mut out);
        let names: Vec<Option<&str>> = out.iter().map(|f| f.name.as_deref()).collect();
        assert_eq!(names, [Some("get_x_id"), Some("get_x_name")]);
    }

    #[test]
    fn too_deeply_nested_declarations_are_a_parse_error() {
        let depth = MAX_DECLARATION_DEPTH + 1;
        let src = format!("{}fn leaf() {{}}{}\n", "mod m { ".repeat(depth), "}".repeat(depth));
        let err = parse(&rust(), "nest.rs", &src).unwrap_err();
        assert_eq!(err.file, "nest.rs");
        assert!(err.detail.contains("nested deeper"), "{err}");

        let ok = format!("{}fn leaf() {{}}{}\n", "mod m { ".repeat(8), "}".repeat(8));
        assert!(parse(&rust(), "nest.rs", &ok).is_ok());
    }

    #[test]
    fn parse_is_pure() {
        let g = rust();
        let src = "mod a { fn f() { fn g() {} } }\ntrait T { fn h(&self); }\n";
        assert_eq!(parse(&g, "a.rs", src).unwrap(), parse(&g, "a.rs", src).unwrap());
    }
}
