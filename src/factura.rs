//! Session object tying builder, CSD and configuration together.

use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::core::{CfdiError, InvoiceAttributes, InvoiceBuilder, InvoiceTree};
use crate::sello::{Certificate, PrivateKey, SealedInvoice, Sealer};
use crate::xml;

/// Issues CFDI documents for one issuer.
///
/// ```no_run
/// use cfdi::Factura;
/// use cfdi::config::Config;
/// use cfdi::core::*;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// # fn main() -> Result<(), cfdi::CfdiError> {
/// let mut factura = Factura::new(Config::from_env());
/// factura.load_certificate("csd/EKU9003173C9.cer")?;
/// factura.load_private_key("csd/EKU9003173C9.key", "12345678a")?;
/// factura
///     .builder_mut()
///     .set_issuer("EKU9003173C9", "ESCUELA KEMPER URGATE", "601")
///     .set_recipient("XAXX010101000", "PUBLICO EN GENERAL", "616", "42501", "S01")
///     .set_line_items(vec![
///         LineItemBuilder::new("01010101", dec!(1), "H87", "Venta", dec!(100))
///             .traslado("002", TipoFactor::Tasa, dec!(0.16))
///             .build(),
///     ]);
///
/// let fecha = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
/// let totals = Totals::from_line_items(factura.builder().line_items());
/// let sealed = factura.generate_sealed_xml(
///     &InvoiceAttributes::new(fecha, "42501").forma_pago("01").metodo_pago("PUE").totals(&totals),
/// )?;
/// println!("{}", sealed.xml());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Factura {
    config: Config,
    builder: InvoiceBuilder,
    certificate: Option<Certificate>,
    private_key: Option<PrivateKey>,
}

impl Factura {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the `.cer` file; its number and body go into every document built
    /// afterwards.
    pub fn load_certificate(&mut self, path: impl AsRef<Path>) -> Result<&Certificate, CfdiError> {
        let certificate = Certificate::from_file(path)?;
        Ok(self.set_certificate(certificate))
    }

    pub fn set_certificate(&mut self, certificate: Certificate) -> &Certificate {
        debug!(no_certificado = certificate.number(), "certificate loaded");
        self.builder
            .set_certificate(certificate.number(), certificate.body());
        self.certificate.insert(certificate)
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    /// Load and decrypt the `.key` file.
    pub fn load_private_key(
        &mut self,
        path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<(), CfdiError> {
        self.set_private_key(PrivateKey::from_file(path, passphrase)?);
        Ok(())
    }

    pub fn set_private_key(&mut self, key: PrivateKey) {
        self.private_key = Some(key);
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn builder(&self) -> &InvoiceBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut InvoiceBuilder {
        &mut self.builder
    }

    /// Snapshot of the current builder state.
    pub fn build(&self, attributes: &InvoiceAttributes) -> InvoiceTree {
        self.builder.build(attributes)
    }

    /// Unsealed CFDI XML.
    pub fn generate_xml(&self, attributes: &InvoiceAttributes) -> Result<String, CfdiError> {
        Ok(xml::render(&self.build(attributes))?)
    }

    /// Build, render and seal in one go.
    pub fn generate_sealed_xml(
        &self,
        attributes: &InvoiceAttributes,
    ) -> Result<SealedInvoice, CfdiError> {
        let sealer = self.sealer()?;
        sealer.seal(&self.generate_xml(attributes)?)
    }

    /// Seal a document produced elsewhere, e.g. after attaching a complement.
    pub fn seal_xml(&self, xml: &str) -> Result<SealedInvoice, CfdiError> {
        self.sealer()?.seal(xml)
    }

    fn sealer(&self) -> Result<Sealer<'_>, CfdiError> {
        Ok(Sealer::new(
            self.private_key.as_ref(),
            self.certificate.as_ref(),
            self.config.xslt_root(),
        )?)
    }
}
