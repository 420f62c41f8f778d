//! Code-unit extractor: walks a file's AST and enumerates its interfaces,
//! classes, traits, and free functions as named, line-ranged coverage
//! targets.
//!
//! Trait-use lists are resolved in a deferred second pass: `use Trait;`
//! names are collected during the main traversal and only bound once every
//! trait in the file is known, since traits may be declared after the class
//! that uses them. Flattening of trait-in-trait uses goes one level deep and
//! is deliberately not recursive.

use std::collections::BTreeMap;

use super::complexity::cyclomatic_complexity;
use super::{Class, Function, Interface, Method, Trait};
use crate::ast::{
    ClassDecl, EnumDecl, FunctionDecl, Item, Member, MethodDecl, Param, SourceAst, TraitDecl, Type,
};

/// All addressable code units of one file, keyed by fully-qualified name.
#[derive(Debug, Clone, Default)]
pub struct ExtractedUnits {
    pub interfaces: BTreeMap<String, Interface>,
    pub classes: BTreeMap<String, Class>,
    pub traits: BTreeMap<String, Trait>,
    pub functions: BTreeMap<String, Function>,
}

#[must_use]
pub fn extract(file: &str, ast: &SourceAst) -> ExtractedUnits {
    let mut units = ExtractedUnits::default();

    // Fully-qualified name → directly used trait names, bound after the
    // whole file has been traversed.
    let mut pending_uses: Vec<(String, Vec<String>)> = Vec::new();

    for item in &ast.items {
        match item {
            Item::Interface(decl) => {
                units.interfaces.insert(
                    decl.namespaced_name.clone(),
                    Interface {
                        name: decl.name.clone(),
                        namespaced_name: decl.namespaced_name.clone(),
                        namespace: namespace_of(&decl.namespaced_name, &decl.name),
                        file: file.to_string(),
                        start_line: decl.span.start,
                        end_line: decl.span.end,
                        extends: decl.extends.clone(),
                    },
                );
            }
            Item::Class(decl) => {
                let (class, uses) = build_class(file, decl);
                pending_uses.push((decl.namespaced_name.clone(), uses));
                units.classes.insert(decl.namespaced_name.clone(), class);
            }
            Item::Trait(decl) => {
                let (tr, uses) = build_trait(file, decl);
                pending_uses.push((decl.namespaced_name.clone(), uses));
                units.traits.insert(decl.namespaced_name.clone(), tr);
            }
            Item::Enum(decl) => {
                let (class, uses) = build_enum(file, decl);
                pending_uses.push((decl.namespaced_name.clone(), uses));
                units.classes.insert(decl.namespaced_name.clone(), class);
            }
            Item::Function(decl) => {
                units.functions.insert(
                    decl.namespaced_name.clone(),
                    build_function(file, decl),
                );
            }
            Item::Stmt(_) => {}
        }
    }

    resolve_trait_uses(&mut units, pending_uses);
    units
}

fn build_class(file: &str, decl: &ClassDecl) -> (Class, Vec<String>) {
    let (methods, uses) = collect_members(&decl.members);
    let class = Class {
        name: decl.name.clone(),
        namespaced_name: decl.namespaced_name.clone(),
        namespace: namespace_of(&decl.namespaced_name, &decl.name),
        file: file.to_string(),
        start_line: decl.span.start,
        end_line: decl.span.end,
        parent: decl.parent.clone(),
        interfaces: decl.interfaces.clone(),
        traits: Vec::new(),
        methods,
    };
    (class, uses)
}

fn build_trait(file: &str, decl: &TraitDecl) -> (Trait, Vec<String>) {
    let (methods, uses) = collect_members(&decl.members);
    let tr = Trait {
        name: decl.name.clone(),
        namespaced_name: decl.namespaced_name.clone(),
        namespace: namespace_of(&decl.namespaced_name, &decl.name),
        file: file.to_string(),
        start_line: decl.span.start,
        end_line: decl.span.end,
        traits: Vec::new(),
        methods,
    };
    (tr, uses)
}

/// Enums are class-likes; they land in the class table with no parent.
fn build_enum(file: &str, decl: &EnumDecl) -> (Class, Vec<String>) {
    let (methods, uses) = collect_members(&decl.members);
    let class = Class {
        name: decl.name.clone(),
        namespaced_name: decl.namespaced_name.clone(),
        namespace: namespace_of(&decl.namespaced_name, &decl.name),
        file: file.to_string(),
        start_line: decl.span.start,
        end_line: decl.span.end,
        parent: None,
        interfaces: decl.interfaces.clone(),
        traits: Vec::new(),
        methods,
    };
    (class, uses)
}

fn build_function(file: &str, decl: &FunctionDecl) -> Function {
    Function {
        name: decl.name.clone(),
        namespaced_name: decl.namespaced_name.clone(),
        namespace: namespace_of(&decl.namespaced_name, &decl.name),
        file: file.to_string(),
        start_line: decl.span.start,
        end_line: decl.span.end,
        signature: signature(&decl.name, &decl.params, decl.return_type.as_ref()),
        ccn: cyclomatic_complexity(&decl.body),
    }
}

fn collect_members(members: &[Member]) -> (BTreeMap<String, Method>, Vec<String>) {
    let mut methods = BTreeMap::new();
    let mut uses = Vec::new();
    for member in members {
        match member {
            Member::Method(m) => {
                methods.insert(m.name.clone(), build_method(m));
            }
            Member::UseTrait { names, .. } => uses.extend(names.iter().cloned()),
            Member::EnumCase(_) => {}
        }
    }
    (methods, uses)
}

fn build_method(decl: &MethodDecl) -> Method {
    let ccn = decl
        .body
        .as_deref()
        .map_or(1, cyclomatic_complexity);
    Method {
        name: decl.name.clone(),
        visibility: decl.visibility,
        signature: signature(&decl.name, &decl.params, decl.return_type.as_ref()),
        start_line: decl.span.start,
        end_line: decl.span.end,
        ccn,
    }
}

/// Bind the collected `use Trait;` names once the whole unit table exists.
/// A unit's trait list is its direct uses plus, for each directly used trait
/// known in this file, that trait's own direct uses (one level, no deeper).
fn resolve_trait_uses(units: &mut ExtractedUnits, pending: Vec<(String, Vec<String>)>) {
    // Direct uses per trait, looked up by either fully-qualified or short name.
    let direct_of = |name: &str, pending: &[(String, Vec<String>)]| -> Vec<String> {
        for (fqn, uses) in pending {
            if fqn == name || fqn.rsplit('\\').next() == Some(name) {
                return uses.clone();
            }
        }
        Vec::new()
    };

    for (fqn, direct) in &pending {
        let mut resolved: Vec<String> = Vec::new();
        for name in direct {
            resolved.push(name.clone());
            if trait_exists(units, name) {
                for inner in direct_of(name, &pending) {
                    if !resolved.contains(&inner) {
                        resolved.push(inner);
                    }
                }
            }
        }

        if let Some(class) = units.classes.get_mut(fqn) {
            class.traits = resolved;
        } else if let Some(tr) = units.traits.get_mut(fqn) {
            tr.traits = resolved;
        }
    }
}

fn trait_exists(units: &ExtractedUnits, name: &str) -> bool {
    units.traits.contains_key(name)
        || units
            .traits
            .values()
            .any(|t| t.name == name)
}

/// Namespace of a unit: its fully-qualified name minus the trailing
/// unqualified name.
#[must_use]
pub fn namespace_of(namespaced_name: &str, name: &str) -> String {
    namespaced_name
        .strip_suffix(name)
        .map(|prefix| prefix.trim_end_matches('\\').to_string())
        .unwrap_or_default()
}

/// Render a signature string: `name(type $param, ...): returnType`.
#[must_use]
pub fn signature(name: &str, params: &[Param], return_type: Option<&Type>) -> String {
    let mut out = String::from(name);
    out.push('(');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if let Some(ty) = &param.ty {
            out.push_str(&render_type(ty));
            out.push(' ');
        }
        if param.by_ref {
            out.push('&');
        }
        if param.variadic {
            out.push_str("...");
        }
        out.push('$');
        out.push_str(&param.name);
    }
    out.push(')');
    if let Some(ty) = return_type {
        out.push_str(": ");
        out.push_str(&render_type(ty));
    }
    out
}

fn render_type(ty: &Type) -> String {
    match ty {
        Type::Named(name) => name.clone(),
        Type::Nullable(inner) => format!("?{}", render_type(inner)),
        Type::Union(parts) => parts
            .iter()
            .map(render_type)
            .collect::<Vec<_>>()
            .join("|"),
        Type::Intersection(parts) => parts
            .iter()
            .map(render_type)
            .collect::<Vec<_>>()
            .join("&"),
    }
}
