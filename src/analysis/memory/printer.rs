//! Rendering of alias trees.
//!
//! [`AliasTreePrinter`] is a read-only consumer of a finished [`AliasTree`]. It produces a
//! Graphviz DOT graph (see [`AliasTreePrinter::to_dot`]) or an indented text dump (see
//! [`AliasTreePrinter::to_text`]).
//!
//! Two label modes exist. [`LabelMode::Full`] prints every pointer of every cluster as IR and
//! every instruction of unknown nodes. [`LabelMode::Simple`] prints one source-level name per
//! cluster and only callee names for unknown nodes.

use std::fmt::Write;

use strum::{Display, EnumIter};

use crate::{
    analysis::memory::{AliasNode, AliasNodeKind, AliasTree, Relation},
    ir::{Function, Opcode, ValueId},
    utils::escape_dot,
};

/// How much detail node labels carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LabelMode {
    /// IR of every pointer and instruction.
    #[default]
    Full,
    /// Source-level names only.
    Simple,
}

/// Renders an [`AliasTree`] with the IR names of its function.
pub struct AliasTreePrinter<'a> {
    tree: &'a AliasTree,
    function: &'a Function,
    mode: LabelMode,
}

impl<'a> AliasTreePrinter<'a> {
    /// Creates a printer using [`LabelMode::Full`].
    #[must_use]
    pub fn new(tree: &'a AliasTree, function: &'a Function) -> Self {
        debug_assert_eq!(
            tree.function_name(),
            function.name(),
            "alias tree rendered with another function"
        );
        Self {
            tree,
            function,
            mode: LabelMode::Full,
        }
    }

    /// Switches the label mode.
    #[must_use]
    pub fn with_mode(mut self, mode: LabelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Source-level description of the memory a pointer refers to.
    fn location_source(&self, ptr: ValueId) -> String {
        let object = self.underlying(ptr);
        let debug = self
            .function
            .value(ptr)
            .and_then(|v| v.debug.as_ref())
            .or_else(|| self.function.value(object).and_then(|v| v.debug.as_ref()));
        match debug {
            Some(debug) => debug.to_string(),
            None => self.function.operand_name(ptr),
        }
    }

    fn underlying(&self, ptr: ValueId) -> ValueId {
        let mut current = ptr;
        while let Some(inst) = self.function.instruction(current) {
            match inst.op {
                Opcode::Cast { operand } => current = operand,
                Opcode::ElementPtr { base, .. } => current = base,
                _ => break,
            }
        }
        current
    }

    /// Label lines of a node, unescaped.
    fn label_lines(&self, node: &AliasNode) -> Vec<String> {
        match (node.kind(), self.mode) {
            (AliasNodeKind::Top, _) => vec!["Whole Memory".to_string()],
            (AliasNodeKind::Estimate(estimate), LabelMode::Simple) => vec![estimate
                .clusters()
                .iter()
                .map(|c| format!("<{}, {}>", self.location_source(c.front()), c.size()))
                .collect::<Vec<_>>()
                .join(" ")],
            (AliasNodeKind::Estimate(estimate), LabelMode::Full) => {
                let mut lines = Vec::new();
                for cluster in estimate.clusters() {
                    if cluster.is_ambiguous() {
                        lines.push(format!("Ambiguous, size {}", cluster.size()));
                        for &ptr in cluster.pointers() {
                            lines.push(format!("  {}", self.function.display_value(ptr)));
                        }
                    } else {
                        lines.push(format!(
                            "{}, size {}",
                            self.function.display_value(cluster.front()),
                            cluster.size()
                        ));
                    }
                }
                lines
            }
            (AliasNodeKind::Unknown(unknown), LabelMode::Simple) => vec![
                "Unknown Memory".to_string(),
                unknown
                    .instructions()
                    .iter()
                    .map(|&inst| self.callee_name(inst))
                    .collect::<Vec<_>>()
                    .join(" "),
            ],
            (AliasNodeKind::Unknown(unknown), LabelMode::Full) => {
                let mut lines = vec!["Unknown Memory".to_string()];
                lines.extend(
                    unknown
                        .instructions()
                        .iter()
                        .map(|&inst| self.function.display_value(inst).to_string()),
                );
                lines
            }
        }
    }

    /// Name of the function an opaque instruction calls, or the instruction itself.
    fn callee_name(&self, inst: ValueId) -> String {
        if let Some(Opcode::Call { target, .. }) = self.function.instruction(inst).map(|i| &i.op)
        {
            let callee = self.function.strip_casts(target.callee());
            if self.function.is_function_symbol(callee) {
                return self.function.operand_name(callee);
            }
        }
        self.function.operand_name(inst)
    }

    /// Returns the label of node `node` as it appears in the DOT output.
    #[must_use]
    pub fn node_label(&self, node: &AliasNode) -> String {
        let mut label = String::new();
        for line in self.label_lines(node) {
            label.push_str(&escape_dot(&line));
            label.push_str("\\l");
        }
        label
    }

    /// Generates a DOT representation of the tree.
    ///
    /// Edges whose containment is only assumed (from or to unknown nodes) are dashed.
    ///
    /// # Returns
    ///
    /// A string containing the DOT graph, renderable with `dot -Tpng`.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();

        dot.push_str("digraph \"Alias Tree\" {\n");
        let _ = writeln!(
            dot,
            "    label=\"Alias tree for '{}'\";",
            escape_dot(self.tree.function_name())
        );
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for node in self.tree.nodes() {
            let style = match node.kind() {
                AliasNodeKind::Top => ", style=filled, fillcolor=lightgray",
                AliasNodeKind::Unknown(_) => ", style=dashed",
                AliasNodeKind::Estimate(e) if e.is_ambiguous() => ", color=orange",
                AliasNodeKind::Estimate(_) => "",
            };
            let _ = writeln!(
                dot,
                "    {} [label=\"{}\"{}];",
                node.id(),
                self.node_label(node),
                style
            );
        }
        dot.push('\n');

        for node in self.tree.nodes() {
            for &child in node.children() {
                let assumed = self
                    .tree
                    .node(child)
                    .is_some_and(|c| c.relation() == Relation::Assumed);
                let attrs = if assumed { " [style=dashed]" } else { "" };
                let _ = writeln!(dot, "    {} -> {}{};", node.id(), child, attrs);
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Generates an indented text dump, one node per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Alias tree of '{}'", self.tree.function_name());
        let mut stack = vec![(self.tree.top(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.tree.node(id) else {
                continue;
            };
            let mut line = self.label_lines(node).join("; ");
            match node.kind() {
                AliasNodeKind::Estimate(e) => {
                    let _ = write!(line, " [{}]", e.access());
                }
                AliasNodeKind::Unknown(u) => {
                    let _ = write!(line, " [{}]", u.access());
                }
                AliasNodeKind::Top => {}
            }
            if node.relation() == Relation::Assumed {
                line.push_str(" (assumed)");
            }
            let _ = writeln!(out, "{:indent$}{} {}", "", id, line, indent = depth * 2);
            for &child in node.children().iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AliasTreeConfig,
        ir::{CallEffect, CallTarget, DebugVariable, FunctionBuilder, Type},
    };

    fn sample() -> Function {
        let mut b = FunctionBuilder::new("f");
        let p = b.argument("p", Type::Ptr);
        let q = b.argument("q", Type::Ptr);
        let x = b.alloca("x", 4);
        b.set_debug(x, DebugVariable::new(3, "x", "int")).unwrap();
        let work = b.function_symbol("work");
        let fp = b.cast(work, Type::Ptr).unwrap();
        let v = b.load(p, 4).unwrap();
        b.store(q, v, 4).unwrap();
        b.store(x, v, 4).unwrap();
        b.call(CallTarget::Indirect(fp), &[], CallEffect::Unknown, Type::Void)
            .unwrap();
        b.finish().unwrap()
    }

    #[test]
    fn test_dot_full() {
        let f = sample();
        let tree = AliasTree::build(&f, &AliasTreeConfig::default());
        let dot = AliasTreePrinter::new(&tree, &f).to_dot();

        assert!(dot.starts_with("digraph \"Alias Tree\" {"));
        assert!(dot.contains("Whole Memory"));
        assert!(dot.contains("Ambiguous, size 4\\l  %p\\l  %q\\l"));
        assert!(dot.contains("%x = alloca 4, size 4\\l"));
        assert!(dot.contains("Unknown Memory\\l"));
        assert!(dot.contains("[style=dashed]"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_dot_simple() {
        let f = sample();
        let tree = AliasTree::build(&f, &AliasTreeConfig::default());
        let dot = AliasTreePrinter::new(&tree, &f)
            .with_mode(LabelMode::Simple)
            .to_dot();

        assert!(dot.contains("\\<3: int x, 4\\>"));
        assert!(dot.contains("@work"));
    }

    #[test]
    fn test_text_dump() {
        let f = sample();
        let tree = AliasTree::build(&f, &AliasTreeConfig::default());
        let text = AliasTreePrinter::new(&tree, &f).to_text();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Alias tree of 'f'");
        assert_eq!(lines[1], "n0 Whole Memory");
        assert!(text.contains("Unknown Memory"));
        assert!(text.contains("(assumed)"));
        assert_eq!(lines.len(), tree.node_count() + 1);
    }
}
