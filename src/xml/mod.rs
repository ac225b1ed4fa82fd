//! CFDI 4.0 XML generation and the owned tree the other stages work on.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use cfdi::core::*;
//! use cfdi::xml::{self, ns, tree};
//! use rust_decimal_macros::dec;
//!
//! let mut builder = InvoiceBuilder::new();
//! builder
//!     .set_issuer("AAA010101AAA", "Test SA", "601")
//!     .set_recipient("XAXX010101000", "PUBLICO EN GENERAL", "616", "42501", "S01")
//!     .set_line_items(vec![
//!         LineItemBuilder::new("01010101", dec!(2), "H87", "Venta", dec!(50)).build(),
//!     ]);
//! let fecha = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
//! let totals = Totals::from_line_items(builder.line_items());
//! let unsealed = xml::render(&builder.build(&InvoiceAttributes::new(fecha, "42501").totals(&totals)))?;
//!
//! let root = tree::parse(&unsealed)?;
//! assert!(root.is(ns::CFDI, "Comprobante"));
//! assert_eq!(root.attribute("SubTotal"), Some("100.00"));
//! # Ok::<(), XmlError>(())
//! ```

mod cfdi;
pub mod tree;
pub(crate) mod writer;

pub use cfdi::render;
pub use writer::{format_decimal, format_rate};

/// Namespace URIs.
pub mod ns {
    pub const CFDI: &str = "http://www.sat.gob.mx/cfd/4";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const XSL: &str = "http://www.w3.org/1999/XSL/Transform";
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const TFD: &str = "http://www.sat.gob.mx/TimbreFiscalDigital";
    pub const CARTA_PORTE_31: &str = "http://www.sat.gob.mx/CartaPorte31";
}

/// `xsi:schemaLocation` pair for CFDI 4.0.
pub const CFDI_SCHEMA_LOCATION: &str =
    "http://www.sat.gob.mx/cfd/4 http://www.sat.gob.mx/sitio_internet/cfd/4/cfdv40.xsd";

/// `xsi:schemaLocation` pair for Carta Porte 3.1.
pub const CARTA_PORTE_31_SCHEMA_LOCATION: &str = "http://www.sat.gob.mx/CartaPorte31 http://www.sat.gob.mx/sitio_internet/cfd/CartaPorte/CartaPorte31.xsd";

/// Fecha format used by every CFDI timestamp attribute.
pub const FECHA_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
