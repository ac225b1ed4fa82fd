//! Compiled cadena original transform.
//!
//! SAT stylesheets use a small, fixed part of XSLT 1.0: templates selected by
//! element patterns, `apply-templates` / `for-each` over child paths, `if` on
//! the presence of a node, and calls to the `Requerido` / `Opcional` helpers
//! that append `|value` for an attribute. [`CadenaTransform`] compiles exactly
//! that part into an instruction tree and runs it over a parsed document.
//! Anything else is rejected at compile time.

use std::collections::HashMap;
use tracing::debug;

use super::resolver::CanonicalTemplate;
use crate::core::TemplateError;
use crate::xml::ns;
use crate::xml::tree::{Element, Node};

/// Named helpers implemented natively rather than compiled.
const BUILTIN_TEMPLATES: [&str; 3] = ["Requerido", "Opcional", "ManejaEspacios"];

const MAX_DEPTH: usize = 256;

/// Element name test.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name {
        namespace: Option<String>,
        local: String,
    },
}

impl NameTest {
    fn matches(&self, el: &Element) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name { namespace, local } => {
                el.namespace() == namespace.as_deref() && el.local_name() == local
            }
        }
    }
}

/// Child-axis location path, e.g. `./cfdi:Conceptos/cfdi:Concepto` or
/// `/cfdi:Comprobante`. Self steps (`.`) are dropped while parsing.
#[derive(Debug, Clone)]
struct NodePath {
    absolute: bool,
    steps: Vec<NameTest>,
}

/// A path ending in an attribute, e.g. `./@Version`.
#[derive(Debug, Clone)]
struct AttributePath {
    element: NodePath,
    name: String,
}

#[derive(Debug, Clone)]
enum Test {
    Node(NodePath),
    Attribute(AttributePath),
}

#[derive(Debug, Clone)]
enum Instruction {
    Text(String),
    ApplyTemplates(Option<NodePath>),
    ForEach(NodePath, Vec<Instruction>),
    If(Test, Vec<Instruction>),
    Required(AttributePath),
    Optional(AttributePath),
    ValueOf(AttributePath),
    Call(String),
}

/// `match` pattern. `steps` are tested from the context element upward, so
/// `cfdi:Impuestos/cfdi:Traslado` is stored as `[Traslado, Impuestos]`.
#[derive(Debug, Clone)]
struct Pattern {
    absolute: bool,
    steps: Vec<NameTest>,
}

impl Pattern {
    fn priority(&self) -> i32 {
        if self.absolute && !self.steps.is_empty() {
            return 2;
        }
        match self.steps.as_slice() {
            [] | [NameTest::Any] => 0,
            [_] => 1,
            _ => 2,
        }
    }

    /// `context` is the ancestor chain from the document element to the node.
    fn matches(&self, context: &[&Element]) -> bool {
        if self.steps.is_empty() {
            return self.absolute && context.is_empty();
        }
        if context.len() < self.steps.len() {
            return false;
        }
        if self.absolute && context.len() != self.steps.len() {
            return false;
        }
        self.steps
            .iter()
            .zip(context.iter().rev())
            .all(|(step, el)| step.matches(el))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    priority: i32,
    body: Vec<Instruction>,
}

/// A stylesheet compiled for repeated use.
#[derive(Debug, Clone)]
pub struct CadenaTransform {
    rules: Vec<Rule>,
    named: HashMap<String, Vec<Instruction>>,
}

impl CadenaTransform {
    pub fn compile(template: &CanonicalTemplate) -> Result<Self, TemplateError> {
        Self::from_stylesheet(template.root())
    }

    /// Compile an `xsl:stylesheet` element that no longer contains includes.
    pub fn from_stylesheet(stylesheet: &Element) -> Result<Self, TemplateError> {
        if !(stylesheet.is(ns::XSL, "stylesheet") || stylesheet.is(ns::XSL, "transform")) {
            return Err(TemplateError::Unsupported(format!(
                "root element {}",
                stylesheet.name()
            )));
        }
        let compiler = Compiler {
            prefixes: stylesheet
                .namespace_declarations()
                .map(|(p, u)| (p.to_string(), u.to_string()))
                .collect(),
        };

        let mut rules = Vec::new();
        let mut named = HashMap::new();
        for item in stylesheet.child_elements() {
            if item.namespace() != Some(ns::XSL) {
                continue;
            }
            match item.local_name() {
                "template" => {
                    if item.attribute("mode").is_some() {
                        return Err(TemplateError::Unsupported("template modes".into()));
                    }
                    if let Some(name) = item.attribute("name") {
                        if !BUILTIN_TEMPLATES.contains(&name) {
                            named.insert(name.to_string(), compiler.body(item)?);
                        }
                    }
                    if let Some(pattern) = item.attribute("match") {
                        let body = compiler.body(item)?;
                        for alternative in pattern.split('|') {
                            let pattern = compiler.pattern(alternative.trim())?;
                            rules.push(Rule {
                                priority: pattern.priority(),
                                pattern,
                                body: body.clone(),
                            });
                        }
                    }
                }
                "include" => return Err(TemplateError::UnresolvedInclude),
                "output" | "param" | "strip-space" | "preserve-space" => {}
                other => {
                    return Err(TemplateError::Unsupported(format!("xsl:{other}")));
                }
            }
        }

        let transform = Self { rules, named };
        transform.check_calls()?;
        debug!(
            rules = transform.rules.len(),
            named = transform.named.len(),
            "compiled cadena original stylesheet"
        );
        Ok(transform)
    }

    fn check_calls(&self) -> Result<(), TemplateError> {
        fn walk(
            body: &[Instruction],
            named: &HashMap<String, Vec<Instruction>>,
        ) -> Result<(), TemplateError> {
            for instruction in body {
                match instruction {
                    Instruction::Call(name) if !named.contains_key(name) => {
                        return Err(TemplateError::Unsupported(format!(
                            "call to undefined template {name}"
                        )));
                    }
                    Instruction::ForEach(_, inner) | Instruction::If(_, inner) => {
                        walk(inner, named)?
                    }
                    _ => {}
                }
            }
            Ok(())
        }
        for body in self.rules.iter().map(|r| &r.body).chain(self.named.values()) {
            walk(body, &self.named)?;
        }
        Ok(())
    }

    /// Produce the cadena original of `document` (its root element).
    pub fn apply(&self, document: &Element) -> Result<String, TemplateError> {
        let mut run = Run {
            transform: self,
            document,
            out: String::new(),
            depth: 0,
        };
        run.apply_to(&[])?;
        Ok(run.out)
    }

    fn best_rule(&self, context: &[&Element]) -> Option<&Rule> {
        let mut best: Option<&Rule> = None;
        for rule in &self.rules {
            if rule.pattern.matches(context) && best.is_none_or(|b| rule.priority >= b.priority) {
                best = Some(rule);
            }
        }
        best
    }
}

struct Compiler {
    prefixes: Vec<(String, String)>,
}

impl Compiler {
    fn name_test(&self, step: &str) -> Result<NameTest, TemplateError> {
        if step == "*" {
            return Ok(NameTest::Any);
        }
        if step.is_empty() || step.contains(['(', ')', '[', ']', '@', '$', ' ']) {
            return Err(TemplateError::Unsupported(format!("step '{step}'")));
        }
        match step.split_once(':') {
            Some((prefix, local)) => {
                let uri = self
                    .prefixes
                    .iter()
                    .rev()
                    .find(|(p, _)| p == prefix)
                    .map(|(_, u)| u.clone())
                    .ok_or_else(|| TemplateError::UnboundPrefix(prefix.to_string()))?;
                Ok(NameTest::Name {
                    namespace: Some(uri),
                    local: local.to_string(),
                })
            }
            None => Ok(NameTest::Name {
                namespace: None,
                local: step.to_string(),
            }),
        }
    }

    fn pattern(&self, text: &str) -> Result<Pattern, TemplateError> {
        if text.contains("//") {
            return Err(TemplateError::Unsupported(format!("pattern '{text}'")));
        }
        let absolute = text.starts_with('/');
        let mut steps = text
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| self.name_test(s))
            .collect::<Result<Vec<_>, _>>()?;
        steps.reverse();
        Ok(Pattern { absolute, steps })
    }

    fn node_path(&self, text: &str) -> Result<NodePath, TemplateError> {
        let text = text.trim();
        if text.contains("//") {
            return Err(TemplateError::Unsupported(format!("path '{text}'")));
        }
        let absolute = text.starts_with('/');
        let steps = text
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| self.name_test(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NodePath { absolute, steps })
    }

    fn attribute_path(&self, text: &str) -> Result<AttributePath, TemplateError> {
        let text = text.trim();
        let (element, name) = match text.rsplit_once('/') {
            Some((element, last)) => (element, last),
            None => ("", text),
        };
        let name = name
            .strip_prefix('@')
            .filter(|n| !n.is_empty())
            .ok_or_else(|| TemplateError::Unsupported(format!("select '{text}'")))?;
        Ok(AttributePath {
            element: self.node_path(element)?,
            name: name.to_string(),
        })
    }

    fn test(&self, text: &str) -> Result<Test, TemplateError> {
        let last = text.trim().rsplit('/').next().unwrap_or_default();
        if last.starts_with('@') {
            self.attribute_path(text).map(Test::Attribute)
        } else {
            self.node_path(text).map(Test::Node)
        }
    }

    fn body(&self, parent: &Element) -> Result<Vec<Instruction>, TemplateError> {
        let mut body = Vec::new();
        for node in parent.children() {
            match node {
                Node::Text(t) | Node::CData(t) if !t.trim().is_empty() => {
                    body.push(Instruction::Text(t.clone()))
                }
                Node::Element(el) => {
                    if let Some(instruction) = self.instruction(el)? {
                        body.push(instruction);
                    }
                }
                _ => {}
            }
        }
        Ok(body)
    }

    fn instruction(&self, el: &Element) -> Result<Option<Instruction>, TemplateError> {
        if el.namespace() != Some(ns::XSL) {
            return Err(TemplateError::Unsupported(format!(
                "literal result element {}",
                el.name()
            )));
        }
        let required = |name: &str| {
            el.attribute(name).ok_or_else(|| {
                TemplateError::Unsupported(format!("xsl:{} without {name}", el.local_name()))
            })
        };
        let instruction = match el.local_name() {
            "param" => return Ok(None),
            "text" => Instruction::Text(text_content(el)),
            "apply-templates" => {
                if el.attribute("mode").is_some() || el.child_elements().next().is_some() {
                    return Err(TemplateError::Unsupported(
                        "apply-templates with mode or parameters".into(),
                    ));
                }
                Instruction::ApplyTemplates(
                    el.attribute("select")
                        .map(|s| self.node_path(s))
                        .transpose()?,
                )
            }
            "for-each" => Instruction::ForEach(self.node_path(required("select")?)?, self.body(el)?),
            "if" => Instruction::If(self.test(required("test")?)?, self.body(el)?),
            "value-of" => Instruction::ValueOf(self.attribute_path(required("select")?)?),
            "call-template" => self.call(el, required("name")?)?,
            other => return Err(TemplateError::Unsupported(format!("xsl:{other}"))),
        };
        Ok(Some(instruction))
    }

    fn call(&self, el: &Element, name: &str) -> Result<Instruction, TemplateError> {
        let params: Vec<&Element> = el.child_elements().collect();
        match name {
            "Requerido" | "Opcional" => {
                let valor = match params.as_slice() {
                    [p] if p.is(ns::XSL, "with-param") && p.attribute("name") == Some("valor") => p
                        .attribute("select")
                        .ok_or_else(|| TemplateError::Unsupported("valor without select".into()))?,
                    _ => {
                        return Err(TemplateError::Unsupported(format!(
                            "{name} expects a single valor parameter"
                        )));
                    }
                };
                let path = self.attribute_path(valor)?;
                Ok(if name == "Requerido" {
                    Instruction::Required(path)
                } else {
                    Instruction::Optional(path)
                })
            }
            "ManejaEspacios" => Err(TemplateError::Unsupported(
                "direct call to ManejaEspacios".into(),
            )),
            _ if !params.is_empty() => Err(TemplateError::Unsupported(format!(
                "parameters for template {name}"
            ))),
            _ => Ok(Instruction::Call(name.to_string())),
        }
    }
}

fn text_content(el: &Element) -> String {
    el.children()
        .iter()
        .filter_map(|n| match n {
            Node::Text(t) | Node::CData(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

/// XPath `normalize-space`: trim and collapse whitespace runs to one space.
pub fn normalize_space(value: &str) -> String {
    value
        .split([' ', '\t', '\r', '\n'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

struct Run<'t, 'd> {
    transform: &'t CadenaTransform,
    document: &'d Element,
    out: String,
    depth: usize,
}

impl<'d> Run<'_, 'd> {
    /// Nodes reached by `path` from `context`. An empty context is the
    /// document node.
    fn select(&self, context: &[&'d Element], path: &NodePath) -> Vec<Vec<&'d Element>> {
        let mut current: Vec<Vec<&'d Element>> = if path.absolute {
            vec![Vec::new()]
        } else {
            vec![context.to_vec()]
        };
        for step in &path.steps {
            let mut next = Vec::new();
            for ctx in &current {
                for child in self.children_of(ctx) {
                    if step.matches(child) {
                        let mut chain = ctx.clone();
                        chain.push(child);
                        next.push(chain);
                    }
                }
            }
            current = next;
        }
        current
    }

    fn children_of(&self, context: &[&'d Element]) -> Vec<&'d Element> {
        match context.last().copied() {
            Some(el) => el.child_elements().collect(),
            None => vec![self.document],
        }
    }

    fn attribute(&self, context: &[&'d Element], path: &AttributePath) -> Option<&'d str> {
        let target = self.select(context, &path.element).into_iter().next()?;
        let el: &'d Element = target.last().copied()?;
        el.attribute(&path.name)
    }

    fn apply_to(&mut self, context: &[&'d Element]) -> Result<(), TemplateError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(TemplateError::Unsupported("template recursion too deep".into()));
        }
        let transform = self.transform;
        match transform.best_rule(context) {
            Some(rule) => self.run(&rule.body, context)?,
            None => {
                for child in self.children_of(context) {
                    let mut chain = context.to_vec();
                    chain.push(child);
                    self.apply_to(&chain)?;
                }
            }
        }
        self.depth -= 1;
        Ok(())
    }

    fn run(&mut self, body: &[Instruction], context: &[&'d Element]) -> Result<(), TemplateError> {
        for instruction in body {
            match instruction {
                Instruction::Text(t) => self.out.push_str(t),
                Instruction::ApplyTemplates(select) => {
                    let targets = match select {
                        Some(path) => self.select(context, path),
                        None => self
                            .children_of(context)
                            .into_iter()
                            .map(|child| {
                                let mut chain = context.to_vec();
                                chain.push(child);
                                chain
                            })
                            .collect(),
                    };
                    for target in targets {
                        self.apply_to(&target)?;
                    }
                }
                Instruction::ForEach(path, inner) => {
                    for target in self.select(context, path) {
                        self.run(inner, &target)?;
                    }
                }
                Instruction::If(test, inner) => {
                    let holds = match test {
                        Test::Node(path) => !self.select(context, path).is_empty(),
                        Test::Attribute(path) => self.attribute(context, path).is_some(),
                    };
                    if holds {
                        self.run(inner, context)?;
                    }
                }
                Instruction::Required(path) => {
                    let value = self.attribute(context, path).unwrap_or_default();
                    self.out.push('|');
                    self.out.push_str(&normalize_space(value));
                }
                Instruction::Optional(path) => {
                    if let Some(value) = self.attribute(context, path) {
                        self.out.push('|');
                        self.out.push_str(&normalize_space(value));
                    }
                }
                Instruction::ValueOf(path) => {
                    if let Some(value) = self.attribute(context, path) {
                        self.out.push_str(value);
                    }
                }
                Instruction::Call(name) => {
                    let transform = self.transform;
                    if let Some(inner) = transform.named.get(name) {
                        self.depth += 1;
                        if self.depth > MAX_DEPTH {
                            return Err(TemplateError::Unsupported(
                                "template recursion too deep".into(),
                            ));
                        }
                        self.run(inner, context)?;
                        self.depth -= 1;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::tree::parse;

    fn stylesheet(templates: &str) -> Element {
        parse(&format!(
            r#"<xsl:stylesheet version="2.0" xmlns:xsl="{}" xmlns:cfdi="{}">
<xsl:output method="text" version="1.0" encoding="UTF-8" indent="no"/>
{templates}
</xsl:stylesheet>"#,
            ns::XSL,
            ns::CFDI
        ))
        .unwrap()
    }

    fn document(body: &str) -> Element {
        parse(&format!(
            r#"<cfdi:Comprobante xmlns:cfdi="{}" Version="4.0" Serie="  A   1 ">{body}</cfdi:Comprobante>"#,
            ns::CFDI
        ))
        .unwrap()
    }

    #[test]
    fn pattern_priorities() {
        let name = || NameTest::Any;
        let pattern = |absolute, steps: Vec<NameTest>| Pattern { absolute, steps };
        assert_eq!(pattern(true, vec![]).priority(), 0);
        assert_eq!(pattern(false, vec![name()]).priority(), 0);
        let traslado = NameTest::Name {
            namespace: Some(ns::CFDI.to_string()),
            local: "Traslado".into(),
        };
        assert_eq!(pattern(false, vec![traslado.clone()]).priority(), 1);
        assert_eq!(pattern(false, vec![traslado, name()]).priority(), 2);
        assert_eq!(pattern(true, vec![name()]).priority(), 2);
        assert_eq!(pattern(false, vec![name(), name()]).priority(), 2);
        assert_eq!(pattern(false, vec![name(), name(), name()]).priority(), 2);
    }

    const ROOT: &str = r#"<xsl:template match="/">|<xsl:apply-templates select="/cfdi:Comprobante"/>||</xsl:template>"#;

    #[test]
    fn required_and_optional_fields() {
        let xsl = stylesheet(&format!(
            r#"{ROOT}
<xsl:template match="cfdi:Comprobante">
  <xsl:call-template name="Requerido"><xsl:with-param name="valor" select="./@Version"/></xsl:call-template>
  <xsl:call-template name="Opcional"><xsl:with-param name="valor" select="./@Serie"/></xsl:call-template>
  <xsl:call-template name="Opcional"><xsl:with-param name="valor" select="./@Folio"/></xsl:call-template>
  <xsl:call-template name="Requerido"><xsl:with-param name="valor" select="./@Fecha"/></xsl:call-template>
</xsl:template>"#
        ));
        let t = CadenaTransform::from_stylesheet(&xsl).unwrap();
        assert_eq!(t.apply(&document("")).unwrap(), "||4.0|A 1|||");
    }

    #[test]
    fn more_specific_patterns_win() {
        let xsl = stylesheet(&format!(
            r#"{ROOT}
<xsl:template match="cfdi:Comprobante"><xsl:apply-templates/></xsl:template>
<xsl:template match="cfdi:Comprobante/cfdi:Impuestos">|doc</xsl:template>
<xsl:template match="cfdi:Impuestos">|any</xsl:template>
<xsl:template match="*">|star</xsl:template>"#
        ));
        let t = CadenaTransform::from_stylesheet(&xsl).unwrap();
        let doc = document("<cfdi:Conceptos><cfdi:Impuestos/></cfdi:Conceptos><cfdi:Impuestos/>");
        assert_eq!(t.apply(&doc).unwrap(), "||star|doc||");
    }

    #[test]
    fn unmatched_elements_fall_through_to_children() {
        let xsl = stylesheet(&format!(
            r#"{ROOT}
<xsl:template match="cfdi:Comprobante"><xsl:apply-templates/></xsl:template>
<xsl:template match="cfdi:Concepto"><xsl:call-template name="Requerido"><xsl:with-param name="valor" select="./@Importe"/></xsl:call-template></xsl:template>"#
        ));
        let t = CadenaTransform::from_stylesheet(&xsl).unwrap();
        let doc = document(
            r#"<cfdi:Conceptos>ignored text<cfdi:Concepto Importe="1.00"/><cfdi:Concepto Importe="2.00"/></cfdi:Conceptos>"#,
        );
        assert_eq!(t.apply(&doc).unwrap(), "||1.00|2.00||");
    }

    #[test]
    fn for_each_and_if() {
        let xsl = stylesheet(&format!(
            r#"{ROOT}
<xsl:template match="cfdi:Comprobante">
  <xsl:if test="./cfdi:Emisor"><xsl:text>|E</xsl:text></xsl:if>
  <xsl:if test="./cfdi:Receptor"><xsl:text>|R</xsl:text></xsl:if>
  <xsl:if test="./@Serie"><xsl:text>|S</xsl:text></xsl:if>
  <xsl:for-each select="./cfdi:Conceptos/cfdi:Concepto"><xsl:call-template name="Detalle"/></xsl:for-each>
</xsl:template>
<xsl:template name="Detalle">|<xsl:value-of select="./@Clave"/></xsl:template>"#
        ));
        let t = CadenaTransform::from_stylesheet(&xsl).unwrap();
        let doc = document(
            r#"<cfdi:Emisor/><cfdi:Conceptos><cfdi:Concepto Clave="a"/><cfdi:Concepto Clave="b"/></cfdi:Conceptos>"#,
        );
        assert_eq!(t.apply(&doc).unwrap(), "||E|S|a|b||");
    }

    #[test]
    fn prefixes_are_resolved_against_namespaces() {
        let xsl = stylesheet(&format!(
            r#"{ROOT}
<xsl:template match="cfdi:Comprobante"><xsl:text>|hit</xsl:text></xsl:template>"#
        ));
        let t = CadenaTransform::from_stylesheet(&xsl).unwrap();
        let other = parse(r#"<c:Comprobante xmlns:c="http://www.sat.gob.mx/cfd/4"/>"#).unwrap();
        assert_eq!(t.apply(&other).unwrap(), "||hit||");
        let wrong = parse(r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/3"/>"#).unwrap();
        assert_eq!(t.apply(&wrong).unwrap(), "|||");
    }

    #[test]
    fn rejects_constructs_outside_the_subset() {
        let unbound = stylesheet(r#"<xsl:template match="tfd:TimbreFiscalDigital"/>"#);
        assert!(matches!(
            CadenaTransform::from_stylesheet(&unbound),
            Err(TemplateError::UnboundPrefix(p)) if p == "tfd"
        ));

        let include = stylesheet(r#"<xsl:include href="utilerias.xslt"/>"#);
        assert!(matches!(
            CadenaTransform::from_stylesheet(&include),
            Err(TemplateError::UnresolvedInclude)
        ));

        let choose = stylesheet(r#"<xsl:template match="/"><xsl:choose/></xsl:template>"#);
        assert!(matches!(
            CadenaTransform::from_stylesheet(&choose),
            Err(TemplateError::Unsupported(_))
        ));

        let undefined = stylesheet(r#"<xsl:template match="/"><xsl:call-template name="Nada"/></xsl:template>"#);
        assert!(matches!(
            CadenaTransform::from_stylesheet(&undefined),
            Err(TemplateError::Unsupported(_))
        ));
    }

    #[test]
    fn runaway_recursion_is_an_error() {
        let xsl = stylesheet(
            r#"<xsl:template match="/"><xsl:call-template name="Loop"/></xsl:template>
<xsl:template name="Loop"><xsl:call-template name="Loop"/></xsl:template>"#,
        );
        let t = CadenaTransform::from_stylesheet(&xsl).unwrap();
        assert!(t.apply(&document("")).is_err());
    }

    #[test]
    fn normalize_space_collapses_runs() {
        assert_eq!(normalize_space("  a \t b\n\nc "), "a b c");
        assert_eq!(normalize_space("   "), "");
    }
}
