//! # cfdi
//!
//! Mexican CFDI 4.0 electronic invoices: assembly, cadena original, `Sello`,
//! the Carta Porte 3.1 complement and SAT catalog lookups.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! The model follows Anexo 20 of the Resolución Miscelánea Fiscal.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use cfdi::core::*;
//! use rust_decimal_macros::dec;
//!
//! let mut builder = InvoiceBuilder::new();
//! builder
//!     .set_issuer("AAA010101AAA", "Test SA", "601")
//!     .set_recipient("XAXX010101000", "PUBLICO EN GENERAL", "616", "42501", "S01")
//!     .set_line_items(vec![
//!         LineItemBuilder::new("01010101", dec!(1), "H87", "Venta", dec!(100))
//!             .traslado("002", TipoFactor::Tasa, dec!(0.16))
//!             .build(),
//!     ]);
//!
//! let fecha = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
//! let totals = Totals::from_line_items(builder.line_items());
//! let tree = builder.build(&InvoiceAttributes::new(fecha, "42501").totals(&totals));
//!
//! assert_eq!(tree.attributes().sub_total, dec!(100));
//! assert_eq!(tree.taxes().unwrap().total_trasladados, Some(dec!(16.00)));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Invoice types, builder, errors, configuration |
//! | `xml` | CFDI 4.0 serializer and owned XML tree |
//! | `sello` | CSD loading, cadena original, sealing, [`Factura`] |
//! | `cartaporte` | Carta Porte 3.1 complement |
//! | `catalogos` | SAT JSON catalog lookups |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod config;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "sello")]
pub mod sello;

#[cfg(feature = "sello")]
mod factura;

#[cfg(feature = "cartaporte")]
pub mod cartaporte;

#[cfg(feature = "catalogos")]
pub mod catalogos;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;

#[cfg(feature = "sello")]
pub use factura::Factura;
