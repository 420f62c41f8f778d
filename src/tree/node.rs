//! The report tree: directories and files with rolled-up coverage totals.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::coverage::LineStatus;
use crate::error::{CovtreeError, Result};
use crate::metrics::Percentage;

/// Aggregate counters owned by every node. Directory totals are always the
/// sum of their children's totals, recomputed bottom-up by [`Node::rollup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub executable_lines: u64,
    pub executed_lines: u64,
    pub executable_branches: u64,
    pub executed_branches: u64,
    pub executable_paths: u64,
    pub executed_paths: u64,
    pub classes: u64,
    pub tested_classes: u64,
    pub traits: u64,
    pub tested_traits: u64,
    pub methods: u64,
    pub tested_methods: u64,
    pub functions: u64,
    pub tested_functions: u64,
}

impl Totals {
    pub fn add(&mut self, other: &Totals) {
        self.executable_lines += other.executable_lines;
        self.executed_lines += other.executed_lines;
        self.executable_branches += other.executable_branches;
        self.executed_branches += other.executed_branches;
        self.executable_paths += other.executable_paths;
        self.executed_paths += other.executed_paths;
        self.classes += other.classes;
        self.tested_classes += other.tested_classes;
        self.traits += other.traits;
        self.tested_traits += other.tested_traits;
        self.methods += other.methods;
        self.tested_methods += other.tested_methods;
        self.functions += other.functions;
        self.tested_functions += other.tested_functions;
    }

    #[must_use]
    pub fn line_percentage(&self) -> Percentage {
        Percentage::new(self.executed_lines, self.executable_lines)
    }

    #[must_use]
    pub fn branch_percentage(&self) -> Percentage {
        Percentage::new(self.executed_branches, self.executable_branches)
    }

    #[must_use]
    pub fn path_percentage(&self) -> Percentage {
        Percentage::new(self.executed_paths, self.executable_paths)
    }

    #[must_use]
    pub fn class_percentage(&self) -> Percentage {
        Percentage::new(self.tested_classes, self.classes)
    }

    #[must_use]
    pub fn trait_percentage(&self) -> Percentage {
        Percentage::new(self.tested_traits, self.traits)
    }

    #[must_use]
    pub fn method_percentage(&self) -> Percentage {
        Percentage::new(self.tested_methods, self.methods)
    }

    #[must_use]
    pub fn function_percentage(&self) -> Percentage {
        Percentage::new(self.tested_functions, self.functions)
    }
}

/// Metrics for a method or a free function.
#[derive(Debug, Clone, Serialize)]
pub struct RoutineMetrics {
    pub name: String,
    pub signature: String,
    /// `None` for free functions.
    pub visibility: Option<&'static str>,
    pub start_line: u32,
    pub end_line: u32,
    pub ccn: u32,
    pub executable_lines: u64,
    pub executed_lines: u64,
    pub coverage: Percentage,
    pub crap: String,
}

/// Metrics for a class or trait, aggregated over its methods.
#[derive(Debug, Clone, Serialize)]
pub struct UnitMetrics {
    pub name: String,
    pub namespace: String,
    pub start_line: u32,
    pub end_line: u32,
    pub ccn: u32,
    pub executable_lines: u64,
    pub executed_lines: u64,
    pub coverage: Percentage,
    pub crap: String,
    pub methods: BTreeMap<String, RoutineMetrics>,
}

/// A node of the report tree. `id` is the tree-relative path (`"."` for the
/// root) and doubles as the stable identifier renderers key on.
#[derive(Debug, Serialize)]
pub struct Node {
    pub name: String,
    pub id: String,
    pub totals: Totals,
    #[serde(skip)]
    finalized: bool,
    pub kind: NodeKind,
}

#[derive(Debug, Serialize)]
pub enum NodeKind {
    Directory {
        children: Vec<Node>,
    },
    File {
        /// Keyed by fully-qualified unit name. Enums are reported among the
        /// classes.
        classes: BTreeMap<String, UnitMetrics>,
        traits: BTreeMap<String, UnitMetrics>,
        functions: BTreeMap<String, RoutineMetrics>,
        /// The normalized merged line table for renderers that annotate
        /// source listings.
        line_coverage: BTreeMap<u32, LineStatus>,
    },
}

/// A unit found by [`Node::find_unit`].
#[derive(Debug)]
pub enum UnitRef<'a> {
    Class(&'a UnitMetrics),
    Trait(&'a UnitMetrics),
    Function(&'a RoutineMetrics),
}

impl Node {
    #[must_use]
    pub fn directory(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            totals: Totals::default(),
            finalized: false,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn file(
        name: impl Into<String>,
        id: impl Into<String>,
        totals: Totals,
        classes: BTreeMap<String, UnitMetrics>,
        traits: BTreeMap<String, UnitMetrics>,
        functions: BTreeMap<String, RoutineMetrics>,
        line_coverage: BTreeMap<u32, LineStatus>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            totals,
            finalized: false,
            kind: NodeKind::File {
                classes,
                traits,
                functions,
                line_coverage,
            },
        }
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Child nodes; empty for file nodes.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Attach a child. Fails once the tree is finalized; file nodes are
    /// final from construction.
    pub fn add_child(&mut self, child: Node) -> Result<()> {
        if self.finalized {
            return Err(CovtreeError::ReportFinalized);
        }
        match &mut self.kind {
            NodeKind::Directory { children } => {
                children.push(child);
                Ok(())
            }
            NodeKind::File { .. } => Err(CovtreeError::ReportFinalized),
        }
    }

    /// Recompute directory totals bottom-up and finalize the whole tree.
    pub fn rollup(&mut self) {
        if let NodeKind::Directory { children } = &mut self.kind {
            let mut totals = Totals::default();
            for child in children.iter_mut() {
                child.rollup();
                totals.add(&child.totals);
            }
            self.totals = totals;
        }
        self.finalized = true;
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Resolve a fully-qualified code-unit name anywhere under this node.
    pub fn find_unit(&self, name: &str) -> Result<UnitRef<'_>> {
        self.search(name)
            .ok_or_else(|| CovtreeError::UnknownTarget(name.to_string()))
    }

    fn search(&self, name: &str) -> Option<UnitRef<'_>> {
        match &self.kind {
            NodeKind::Directory { children } => {
                children.iter().find_map(|child| child.search(name))
            }
            NodeKind::File {
                classes,
                traits,
                functions,
                ..
            } => {
                if let Some(class) = classes.get(name) {
                    return Some(UnitRef::Class(class));
                }
                if let Some(tr) = traits.get(name) {
                    return Some(UnitRef::Trait(tr));
                }
                functions.get(name).map(UnitRef::Function)
            }
        }
    }
}
