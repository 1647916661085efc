use std::fmt;
use std::io;
use std::path::Path;

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{AssertionClaims, AssertionError, AssertionSigner, SignedAssertion};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("unable to load private key: `{0}`")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("reading certificate file: `{0}`")]
    Io(#[from] io::Error),
    #[error("no `{0}` block found in PEM file")]
    MissingBlock(&'static str),
    #[error("invalid PEM file: `{0}`")]
    Pem(#[from] pem::PemError),
}

/// Signs client assertions with the RSA key of a PEM bundle (certificate plus private key).
///
/// The assertion header carries the SHA-256 thumbprint of the certificate (`x5t#S256`), which is
/// how Entra ID picks the registered certificate to verify it with.
pub struct CertificateSigner {
    key: EncodingKey,
    thumbprint: String,
}

impl CertificateSigner {
    /// Loads the PEM bundle at `path`.
    pub fn from_file(path: &Path) -> Result<Self, CertificateError> {
        let bundle = std::fs::read(path)?;
        Self::from_pem(&bundle)
    }

    pub fn from_pem(bundle: &[u8]) -> Result<Self, CertificateError> {
        let blocks = pem::parse_many(bundle)?;

        let certificate = blocks
            .iter()
            .find(|block| block.tag() == CERTIFICATE_LABEL)
            .ok_or(CertificateError::MissingBlock(CERTIFICATE_LABEL))?;
        let thumbprint = BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(certificate.contents()));

        // PKCS#1 or PKCS#8, jsonwebtoken tells them apart by the PEM tag.
        let key = blocks
            .iter()
            .find(|block| matches!(block.tag(), PRIVATE_KEY_LABEL | RSA_PRIVATE_KEY_LABEL))
            .ok_or(CertificateError::MissingBlock(PRIVATE_KEY_LABEL))?;

        Ok(Self {
            key: EncodingKey::from_rsa_pem(pem::encode(key).as_bytes())?,
            thumbprint,
        })
    }

    /// Base64url SHA-256 thumbprint of the certificate.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }
}

impl fmt::Debug for CertificateSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateSigner")
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

impl AssertionSigner for CertificateSigner {
    fn sign(&self, claims: AssertionClaims) -> Result<SignedAssertion, AssertionError> {
        let mut header = Header::new(Algorithm::RS256);
        header.x5t_s256 = Some(self.thumbprint.clone());

        jsonwebtoken::encode(&header, &claims, &self.key)
            .map(SignedAssertion)
            .map_err(|e| AssertionError::Signing(e.to_string()))
    }
}
