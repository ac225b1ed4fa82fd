use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::XmlError;

fn xml_io(e: std::io::Error) -> XmlError {
    XmlError::Write(e.to_string())
}

/// Streaming, indented writer used by the serializer.
pub(crate) struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, XmlError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, XmlError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| XmlError::Write(format!("UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str, attrs: &Attrs) -> Result<&mut Self, XmlError> {
        self.writer
            .write_event(Event::Start(attrs.start(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn empty_element(&mut self, name: &str, attrs: &Attrs) -> Result<&mut Self, XmlError> {
        self.writer
            .write_event(Event::Empty(attrs.start(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, XmlError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }
}

/// Ordered attribute list. Optional values are skipped, never written as "".
#[derive(Debug, Default)]
pub(crate) struct Attrs {
    items: Vec<(&'static str, String)>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn req(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.items.push((name, value.into()));
        self
    }

    pub fn opt(mut self, name: &'static str, value: Option<impl Into<String>>) -> Self {
        if let Some(v) = value {
            self.items.push((name, v.into()));
        }
        self
    }

    fn start<'a>(&'a self, name: &'a str) -> BytesStart<'a> {
        let mut elem = BytesStart::new(name);
        for (k, v) in &self.items {
            elem.push_attribute((*k, v.as_str()));
        }
        elem
    }
}

/// Format a Decimal for XML output: always include at least 2 decimal places,
/// strip trailing zeros beyond that.
pub fn format_decimal(d: Decimal) -> String {
    let s = d.normalize().to_string();
    if let Some(dot_pos) = s.find('.') {
        let decimals = s.len() - dot_pos - 1;
        if decimals < 2 {
            format!("{s}{}", "0".repeat(2 - decimals))
        } else {
            s
        }
    } else {
        format!("{s}.00")
    }
}

/// `TasaOCuota` is always written with six decimals ("0.160000").
pub fn format_rate(d: Decimal) -> String {
    format!("{:.6}", d)
}
