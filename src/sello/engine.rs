//! Sealing pipeline.
//!
//! A document moves through [`Unsealed`] → [`CanonicalStringComputed`] →
//! [`Signed`] → [`SealedInvoice`]; each step consumes the previous state, so a
//! seal can only be embedded for the cadena it was computed from.

use base64ct::{Base64, Encoding};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::Sha256;
use std::path::Path;
use tracing::{debug, info};

use super::credential::{Certificate, PrivateKey};
use super::resolver::{self, CanonicalTemplate};
use super::transform::CadenaTransform;
use crate::core::{CfdiError, SigningError, XmlError};
use crate::xml::ns;
use crate::xml::tree::{self, Element};

/// A parsed document whose root is a `cfdi:Comprobante`.
#[derive(Debug, Clone)]
pub struct Unsealed {
    document: Element,
}

impl Unsealed {
    pub fn parse(xml: &str) -> Result<Self, CfdiError> {
        Ok(Self::from_element(tree::parse(xml)?)?)
    }

    pub fn from_element(document: Element) -> Result<Self, SigningError> {
        if !document.is(ns::CFDI, "Comprobante") {
            return Err(SigningError::NotAnInvoice);
        }
        Ok(Self { document })
    }

    /// Set `NoCertificado` and `Certificado` from `certificate`, replacing
    /// values already present.
    pub fn with_certificate(self, certificate: &Certificate) -> Self {
        let after = if self.document.attribute("FormaPago").is_some() {
            "FormaPago"
        } else {
            "Fecha"
        };
        let document = self
            .document
            .with_attribute_after("NoCertificado", certificate.number(), Some(after))
            .with_attribute_after("Certificado", certificate.body(), Some("NoCertificado"));
        Self { document }
    }

    pub fn document(&self) -> &Element {
        &self.document
    }

    pub fn canonicalize(
        self,
        transform: &CadenaTransform,
    ) -> Result<CanonicalStringComputed, CfdiError> {
        let cadena = transform.apply(&self.document)?;
        debug!(length = cadena.len(), "computed cadena original");
        Ok(CanonicalStringComputed {
            document: self.document,
            cadena,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalStringComputed {
    document: Element,
    cadena: String,
}

impl CanonicalStringComputed {
    pub fn cadena_original(&self) -> &str {
        &self.cadena
    }

    /// RSA PKCS#1 v1.5 over the SHA-256 digest of the cadena's UTF-8 bytes.
    pub fn sign(self, key: &PrivateKey) -> Result<Signed, SigningError> {
        let signing_key = SigningKey::<Sha256>::new(key.rsa().clone());
        let signature = signing_key
            .try_sign(self.cadena.as_bytes())
            .map_err(|e| SigningError::Signature(e.to_string()))?;
        Ok(Signed {
            document: self.document,
            cadena: self.cadena,
            sello: Base64::encode_string(&signature.to_bytes()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Signed {
    document: Element,
    cadena: String,
    sello: String,
}

impl Signed {
    pub fn sello(&self) -> &str {
        &self.sello
    }

    /// Write `Sello` on the root, right after `Fecha` unless it already exists.
    pub fn embed(self, template: CanonicalTemplate) -> Result<SealedInvoice, XmlError> {
        let document = self
            .document
            .with_attribute_after("Sello", self.sello.as_str(), Some("Fecha"));
        Ok(SealedInvoice {
            xml: document.to_xml()?,
            cadena_original: self.cadena,
            sello: self.sello,
            template,
        })
    }
}

/// Result of a successful seal.
#[derive(Debug, Clone)]
pub struct SealedInvoice {
    xml: String,
    cadena_original: String,
    sello: String,
    template: CanonicalTemplate,
}

impl SealedInvoice {
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn cadena_original(&self) -> &str {
        &self.cadena_original
    }

    pub fn sello(&self) -> &str {
        &self.sello
    }

    /// The flattened stylesheet the cadena was computed with.
    pub fn template(&self) -> &CanonicalTemplate {
        &self.template
    }

    pub fn into_xml(self) -> String {
        self.xml
    }
}

/// Runs the whole pipeline for one CSD.
#[derive(Debug)]
pub struct Sealer<'a> {
    key: &'a PrivateKey,
    certificate: &'a Certificate,
    xslt_root: &'a Path,
}

impl<'a> Sealer<'a> {
    /// Fails before touching any template when key or certificate is missing.
    pub fn new(
        key: Option<&'a PrivateKey>,
        certificate: Option<&'a Certificate>,
        xslt_root: &'a Path,
    ) -> Result<Self, SigningError> {
        let key = key.ok_or(SigningError::MissingPrivateKey)?;
        let certificate = certificate.ok_or(SigningError::MissingCertificate)?;
        Ok(Self {
            key,
            certificate,
            xslt_root,
        })
    }

    /// Seal an unsealed CFDI document.
    pub fn seal(&self, xml: &str) -> Result<SealedInvoice, CfdiError> {
        let template = resolver::resolve(self.xslt_root)?;
        debug!(template = %template.path().display(), "resolved cadena original template");
        let transform = CadenaTransform::compile(&template)?;

        let sealed = Unsealed::parse(xml)?
            .with_certificate(self.certificate)
            .canonicalize(&transform)?
            .sign(self.key)?
            .embed(template)?;
        info!(no_certificado = self.certificate.number(), "sealed CFDI");
        Ok(sealed)
    }
}

/// Check `sello` (base64) against `cadena` with the signer's public key.
pub fn verify(public_key: &RsaPublicKey, cadena: &str, sello: &str) -> Result<(), SigningError> {
    let bytes = Base64::decode_vec(sello).map_err(|e| SigningError::Signature(e.to_string()))?;
    let signature =
        Signature::try_from(bytes.as_slice()).map_err(|e| SigningError::Signature(e.to_string()))?;
    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(cadena.as_bytes(), &signature)
        .map_err(|e| SigningError::Signature(e.to_string()))
}
