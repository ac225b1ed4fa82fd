#![cfg(feature = "sello")]

use cfdi::core::TemplateError;
use cfdi::sello::{CadenaTransform, resolve};
use cfdi::xml::{ns, tree};
use std::path::{Path, PathBuf};

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, body).unwrap();
    path
}

fn stylesheet(extra_ns: &str, body: &str) -> String {
    format!(
        r#"<xsl:stylesheet version="2.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"{extra_ns}>{body}</xsl:stylesheet>"#
    )
}

fn template_names(root: &tree::Element) -> Vec<String> {
    root.child_elements()
        .filter(|el| el.is(ns::XSL, "template"))
        .map(|el| {
            el.attribute("match")
                .or_else(|| el.attribute("name"))
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[test]
fn nested_includes_are_inlined_in_document_order() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "sub/leaf.xslt",
        &stylesheet("", r#"<xsl:template match="Leaf">L</xsl:template>"#),
    );
    write(
        dir.path(),
        "middle.xslt",
        &stylesheet(
            "",
            r#"<xsl:include href="sub/leaf.xslt"/><xsl:template match="Middle">M</xsl:template>"#,
        ),
    );
    let root = write(
        dir.path(),
        "root.xslt",
        &stylesheet(
            "",
            r#"<xsl:template match="/">R</xsl:template><xsl:include href="middle.xslt"/><xsl:template match="Last">Z</xsl:template>"#,
        ),
    );

    let template = resolve(&root).unwrap();
    assert!(!template.contains_includes());
    assert_eq!(template.path(), root.as_path());
    assert_eq!(
        template_names(template.root()),
        ["/", "Leaf", "Middle", "Last"]
    );
}

#[test]
fn published_urls_resolve_next_to_the_root() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "utilerias.xslt",
        &stylesheet("", r#"<xsl:template name="Helper">H</xsl:template>"#),
    );
    let root = write(
        dir.path(),
        "root.xslt",
        &stylesheet(
            "",
            r#"<xsl:include href="http://www.sat.gob.mx/sitio_internet/cfd/2/cadenaoriginal_2_0/utilerias.xslt"/>"#,
        ),
    );

    let template = resolve(&root).unwrap();
    assert_eq!(template_names(template.root()), ["Helper"]);
}

#[test]
fn cyclic_includes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.xslt",
        &stylesheet("", r#"<xsl:include href="b.xslt"/>"#),
    );
    write(
        dir.path(),
        "b.xslt",
        &stylesheet("", r#"<xsl:include href="a.xslt"/>"#),
    );

    let err = resolve(dir.path().join("a.xslt")).unwrap_err();
    assert!(matches!(err, TemplateError::Cycle { .. }), "{err}");
}

#[test]
fn self_include_is_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "self.xslt",
        &stylesheet("", r#"<xsl:include href="self.xslt"/>"#),
    );
    assert!(matches!(
        resolve(&root).unwrap_err(),
        TemplateError::Cycle { .. }
    ));
}

#[test]
fn include_without_href_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.xslt", &stylesheet("", "<xsl:include/>"));
    let err = resolve(&root).unwrap_err();
    assert!(matches!(err, TemplateError::MissingHref { .. }));
    assert!(err.to_string().contains("root.xslt"));
}

#[test]
fn missing_fragment_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "root.xslt",
        &stylesheet("", r#"<xsl:include href="nowhere.xslt"/>"#),
    );
    let err = resolve(&root).unwrap_err();
    match err {
        TemplateError::Io { path, .. } => assert!(path.ends_with("nowhere.xslt")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn included_namespaces_are_declared_on_the_root() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "cp.xslt",
        &stylesheet(
            r#" xmlns:cartaporte31="http://www.sat.gob.mx/CartaPorte31""#,
            r#"<xsl:template match="cartaporte31:CartaPorte">CP</xsl:template>"#,
        ),
    );
    let root = write(
        dir.path(),
        "root.xslt",
        &stylesheet(
            r#" xmlns:cfdi="http://www.sat.gob.mx/cfd/4""#,
            r#"<xsl:include href="cp.xslt"/>"#,
        ),
    );

    let template = resolve(&root).unwrap();
    let root = template.root();
    assert_eq!(root.attribute("xmlns:cfdi"), Some(ns::CFDI));
    assert_eq!(root.attribute("xmlns:cartaporte31"), Some(ns::CARTA_PORTE_31));
}

#[test]
fn conflicting_namespaces_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "old.xslt",
        &stylesheet(r#" xmlns:cfdi="http://www.sat.gob.mx/cfd/3""#, ""),
    );
    let root = write(
        dir.path(),
        "root.xslt",
        &stylesheet(
            r#" xmlns:cfdi="http://www.sat.gob.mx/cfd/4""#,
            r#"<xsl:include href="old.xslt"/>"#,
        ),
    );
    assert!(matches!(
        resolve(&root).unwrap_err(),
        TemplateError::NamespaceConflict { .. }
    ));
}

#[test]
fn resolving_a_resolved_template_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/xslt/cadenaoriginal_4_0.xslt");
    let first = resolve(&bundled).unwrap();

    let flat = write(dir.path(), "flat.xslt", &first.to_xml().unwrap());
    let second = resolve(&flat).unwrap();
    assert_eq!(first.root(), second.root());
}

#[test]
fn bundled_template_compiles() {
    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/xslt/cadenaoriginal_4_0.xslt");
    let template = resolve(&bundled).unwrap();
    assert!(!template.contains_includes());
    let names = template_names(template.root());
    assert!(names.iter().any(|n| n == "Requerido"));
    assert!(names.iter().any(|n| n == "cartaporte31:CartaPorte"));
    CadenaTransform::compile(&template).unwrap();
}
