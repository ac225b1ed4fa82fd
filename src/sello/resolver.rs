//! Flattening of `xsl:include` directives.
//!
//! The SAT publishes the cadena original stylesheet as a root file that pulls
//! in `utilerias.xslt` and one fragment per complement. Before the stylesheet
//! can be compiled every include is replaced by the body of the file it names.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::TemplateError;
use crate::xml::ns;
use crate::xml::tree::{self, Element, Node};

/// A stylesheet with every include inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTemplate {
    root: Element,
    path: PathBuf,
}

impl CanonicalTemplate {
    /// The `xsl:stylesheet` element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Root template file the stylesheet was resolved from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains_includes(&self) -> bool {
        self.root.any(&is_include)
    }

    pub fn to_xml(&self) -> Result<String, TemplateError> {
        self.root.to_xml().map_err(|e| TemplateError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

/// Load `path` and inline its includes, recursively and in document order.
pub fn resolve(path: impl AsRef<Path>) -> Result<CanonicalTemplate, TemplateError> {
    let path = path.as_ref();
    let mut stack = Vec::new();
    let root = load_flattened(path, &mut stack)?;
    Ok(CanonicalTemplate {
        root,
        path: path.to_path_buf(),
    })
}

fn is_include(el: &Element) -> bool {
    el.is(ns::XSL, "include")
}

fn load(path: &Path) -> Result<Element, TemplateError> {
    let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tree::parse(&text).map_err(|e| TemplateError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn load_flattened(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Element, TemplateError> {
    let canonical = std::fs::canonicalize(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if stack.contains(&canonical) {
        return Err(TemplateError::Cycle {
            path: path.to_path_buf(),
        });
    }
    let root = load(path)?;
    if !root.any(&is_include) {
        return Ok(root);
    }

    stack.push(canonical);
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut namespaces = Vec::new();
    let (root, children) = root.into_parts();
    let children = flatten(children, path, base, stack, &mut namespaces)?;
    stack.pop();

    let mut root = root.with_children(children);
    for (prefix, uri) in namespaces {
        root = bind_namespace(root, &prefix, &uri)?;
    }
    Ok(root)
}

/// Replace include elements in `nodes` (at any depth) with the children of the
/// file they reference. Namespace declarations of included roots are collected
/// into `namespaces`.
fn flatten(
    nodes: Vec<Node>,
    path: &Path,
    base: &Path,
    stack: &mut Vec<PathBuf>,
    namespaces: &mut Vec<(String, String)>,
) -> Result<Vec<Node>, TemplateError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(el) if is_include(&el) => {
                let href = el.attribute("href").ok_or_else(|| TemplateError::MissingHref {
                    path: path.to_path_buf(),
                })?;
                let target = include_target(base, href);
                debug!(href, target = %target.display(), "inlining template include");
                let included = load_flattened(&target, stack)?;
                namespaces.extend(
                    included
                        .namespace_declarations()
                        .map(|(p, u)| (p.to_string(), u.to_string())),
                );
                let (_, children) = included.into_parts();
                for child in children {
                    push_merged(&mut out, child);
                }
            }
            Node::Element(el) if el.any(&is_include) => {
                let (el, children) = el.into_parts();
                let children = flatten(children, path, base, stack, namespaces)?;
                out.push(Node::Element(el.with_children(children)));
            }
            other => push_merged(&mut out, other),
        }
    }
    Ok(out)
}

/// Append `node`, joining it to a preceding text node so that a spliced
/// include never leaves two text siblings side by side.
fn push_merged(out: &mut Vec<Node>, node: Node) {
    match (out.last_mut(), node) {
        (Some(Node::Text(prev)), Node::Text(text)) => prev.push_str(&text),
        (_, node) => out.push(node),
    }
}

/// SAT roots reference fragments by their published URL; the fragments are
/// expected next to the including file under their last path segment.
fn include_target(base: &Path, href: &str) -> PathBuf {
    if href.starts_with("http://") || href.starts_with("https://") {
        let name = href.rsplit('/').next().unwrap_or(href);
        base.join(name)
    } else {
        base.join(href)
    }
}

fn bind_namespace(root: Element, prefix: &str, uri: &str) -> Result<Element, TemplateError> {
    let existing = root
        .namespace_declarations()
        .find(|(p, _)| *p == prefix)
        .map(|(_, u)| u.to_string());
    match existing {
        Some(first) if first == uri => Ok(root),
        Some(first) => Err(TemplateError::NamespaceConflict {
            prefix: prefix.to_string(),
            first,
            second: uri.to_string(),
        }),
        None if prefix.is_empty() => Ok(root.with_attribute("xmlns", uri)),
        None => Ok(root.with_attribute(&format!("xmlns:{prefix}"), uri)),
    }
}
