//! CSD credentials, cadena original derivation and the `Sello`.
//!
//! ```no_run
//! use cfdi::sello::{Credential, Sealer};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), cfdi::CfdiError> {
//! let csd = Credential::load("csd.cer", "csd.key", "12345678a")?;
//! let unsealed = std::fs::read_to_string("factura.xml").unwrap();
//! let sealer = Sealer::new(
//!     Some(csd.private_key()),
//!     Some(csd.certificate()),
//!     Path::new("resources/xslt/cadenaoriginal_4_0.xslt"),
//! )?;
//! let sealed = sealer.seal(&unsealed)?;
//! println!("{}", sealed.cadena_original());
//! # Ok(())
//! # }
//! ```

mod credential;
mod engine;
pub mod resolver;
pub mod transform;

pub use credential::{Certificate, Credential, PrivateKey, serial_to_certificate_number};
pub use engine::{
    CanonicalStringComputed, SealedInvoice, Sealer, Signed, Unsealed, verify,
};
pub use resolver::{CanonicalTemplate, resolve};
pub use transform::CadenaTransform;
