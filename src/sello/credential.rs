//! SAT CSD (Certificado de Sello Digital) loading.
//!
//! SAT hands out the certificate as a DER `.cer` file and the private key as a
//! DER `.key` file holding a passphrase protected PKCS#8 container.

use base64ct::{Base64, Encoding};
use pkcs8::EncryptedPrivateKeyInfo;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::path::Path;
use x509_cert::Certificate as X509Certificate;
use x509_cert::der::{Decode, Encode, EncodePem};
use x509_cert::spki::DecodePublicKey;
use zeroize::Zeroizing;

use crate::core::CredentialError;

fn read(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A parsed `.cer` file.
#[derive(Debug, Clone)]
pub struct Certificate {
    inner: X509Certificate,
    number: String,
    pem: String,
    body: String,
}

impl Certificate {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        Self::from_der(&read(path.as_ref())?)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CredentialError> {
        let inner = X509Certificate::from_der(der)
            .map_err(|e| CredentialError::InvalidCertificate(e.to_string()))?;
        let number = serial_to_certificate_number(inner.tbs_certificate.serial_number.as_bytes());
        let pem = inner
            .to_pem(LineEnding::LF)
            .map_err(|e| CredentialError::Encoding(e.to_string()))?;
        let der = inner
            .to_der()
            .map_err(|e| CredentialError::Encoding(e.to_string()))?;
        Ok(Self {
            inner,
            number,
            pem,
            body: Base64::encode_string(&der),
        })
    }

    /// `NoCertificado`: the serial number read as ASCII.
    pub fn number(&self) -> &str {
        &self.number
    }

    /// PEM encoding of the certificate.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// `Certificado`: the PEM body without armor or line breaks.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Subject distinguished name, e.g. for logging which CSD signed.
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// RSA public key from the certificate's subject public key info.
    pub fn public_key(&self) -> Result<RsaPublicKey, CredentialError> {
        let spki = self
            .inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CredentialError::Encoding(e.to_string()))?;
        RsaPublicKey::from_public_key_der(&spki).map_err(|_| CredentialError::UnsupportedKey)
    }
}

/// SAT serials are ASCII digits stored as raw bytes: `0x33 0x30 ...` is "30...".
/// Every byte becomes the character with that code point.
pub fn serial_to_certificate_number(serial: &[u8]) -> String {
    serial.iter().map(|&b| char::from(b)).collect()
}

/// A decrypted `.key` file.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    pub fn from_file(path: impl AsRef<Path>, passphrase: &str) -> Result<Self, CredentialError> {
        let der = Zeroizing::new(read(path.as_ref())?);
        Self::from_encrypted_der(&der, passphrase)
    }

    /// Decrypt a DER `EncryptedPrivateKeyInfo`.
    pub fn from_encrypted_der(der: &[u8], passphrase: &str) -> Result<Self, CredentialError> {
        let info =
            EncryptedPrivateKeyInfo::try_from(der).map_err(|_| CredentialError::MalformedPrivateKey)?;
        let document = info
            .decrypt(passphrase)
            .map_err(|_| CredentialError::Decryption)?;
        Self::from_pkcs8_der(document.as_bytes())
    }

    /// Load an unencrypted DER `PrivateKeyInfo`.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CredentialError> {
        let inner = RsaPrivateKey::from_pkcs8_der(der).map_err(|_| CredentialError::UnsupportedKey)?;
        Ok(Self { inner })
    }

    /// PKCS#8 PEM export; the buffer is wiped on drop.
    pub fn to_pem(&self) -> Result<Zeroizing<String>, CredentialError> {
        self.inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CredentialError::Encoding(e.to_string()))
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &(self.inner.size() * 8))
            .finish_non_exhaustive()
    }
}

/// Certificate and private key of one CSD.
#[derive(Debug, Clone)]
pub struct Credential {
    certificate: Certificate,
    private_key: PrivateKey,
}

impl Credential {
    pub fn new(certificate: Certificate, private_key: PrivateKey) -> Self {
        Self {
            certificate,
            private_key,
        }
    }

    pub fn load(
        certificate_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<Self, CredentialError> {
        Ok(Self::new(
            Certificate::from_file(certificate_path)?,
            PrivateKey::from_file(key_path, passphrase)?,
        ))
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}
