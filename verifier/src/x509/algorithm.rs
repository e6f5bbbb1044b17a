// Copyright (c) 2023 The MobileCoin Foundation

//! Public keys and signatures used to verify certificates and CRLs.
//!
//! Keys and signatures are decoded at the point of use. A certificate with a
//! key or signature algorithm this crate does not understand still parses, the
//! failure surfaces as a path fault when the key or signature is needed.

use crate::{Error, Result};
use const_oid::ObjectIdentifier;
use p256::ecdsa;
use p256::ecdsa::signature::Verifier;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::sha2::{Digest, Sha256};
use rsa::Pkcs1v15Sign;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

pub(crate) const OID_PKCS1_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub(crate) const OID_PKCS1_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub(crate) const OID_EC_PUBLIC_KEY: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub(crate) const OID_SIG_ECDSA_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// Public key used in PKI signature verification
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PublicKey {
    /// Elliptic curve (P-256) public key
    Ecdsa(ecdsa::VerifyingKey),
    /// RSA public key
    Rsa(rsa::RsaPublicKey),
}

impl PublicKey {
    /// Verify the `message` and `signature` match this [`PublicKey`]
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        match (self, signature) {
            (PublicKey::Ecdsa(key), Signature::Ecdsa(sig)) => key
                .verify(message, sig)
                .map_err(|_| Error::SignatureVerification),
            (PublicKey::Rsa(key), Signature::Rsa(sig)) => {
                let scheme = Pkcs1v15Sign::new::<Sha256>();
                let hashed = Sha256::digest(message);
                key.verify(scheme, &hashed, sig)
                    .map_err(|_| Error::SignatureVerification)
            }
            _ => Err(Error::SignatureVerification),
        }
    }
}

impl From<ecdsa::VerifyingKey> for PublicKey {
    fn from(key: ecdsa::VerifyingKey) -> Self {
        PublicKey::Ecdsa(key)
    }
}

/// Create a [`PublicKey`] from a [`SubjectPublicKeyInfoOwned`]
impl TryFrom<&SubjectPublicKeyInfoOwned> for PublicKey {
    type Error = Error;

    fn try_from(value: &SubjectPublicKeyInfoOwned) -> core::result::Result<Self, Self::Error> {
        let bytes = value
            .subject_public_key
            .as_bytes()
            .ok_or(Error::KeyDecoding)?;
        match value.algorithm.oid {
            OID_EC_PUBLIC_KEY => {
                let key =
                    ecdsa::VerifyingKey::from_sec1_bytes(bytes).map_err(|_| Error::KeyDecoding)?;
                Ok(PublicKey::Ecdsa(key))
            }
            OID_PKCS1_RSA_ENCRYPTION => {
                let key =
                    rsa::RsaPublicKey::from_pkcs1_der(bytes).map_err(|_| Error::KeyDecoding)?;
                Ok(PublicKey::Rsa(key))
            }
            _ => Err(Error::KeyDecoding),
        }
    }
}

/// A decoded signature
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Signature {
    /// Elliptic curve signature
    Ecdsa(ecdsa::Signature),
    /// RSA signature
    Rsa(Vec<u8>),
}

impl Signature {
    /// Create a [`Signature`] from the `algorithm` and `signature` bytes
    pub fn try_from_algorithm_and_signature(
        algorithm: &AlgorithmIdentifierOwned,
        signature: &[u8],
    ) -> Result<Self> {
        match algorithm.oid {
            OID_SIG_ECDSA_WITH_SHA256 => {
                let sig =
                    ecdsa::Signature::from_der(signature).map_err(|_| Error::SignatureDecoding)?;
                Ok(Signature::Ecdsa(sig))
            }
            OID_PKCS1_SHA256_WITH_RSA => Ok(Signature::Rsa(signature.to_vec())),
            _ => Err(Error::SignatureDecoding),
        }
    }
}

/// The signature carried by a signed object along with the bytes it covers.
///
/// Certificates and CRLs both sign a "to be signed" structure, this keeps the
/// encoded structure next to the raw signature so verification can happen
/// long after parsing.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SignedBytes {
    tbs: Vec<u8>,
    algorithm: AlgorithmIdentifierOwned,
    signature: Vec<u8>,
}

impl SignedBytes {
    /// Create a new instance
    ///
    /// # Arguments
    /// * `tbs` - The DER encoding of the signed structure.
    /// * `algorithm` - The signature algorithm of the outer structure.
    /// * `signature` - The raw signature value.
    pub fn new(tbs: Vec<u8>, algorithm: AlgorithmIdentifierOwned, signature: Vec<u8>) -> Self {
        Self {
            tbs,
            algorithm,
            signature,
        }
    }

    /// The signed bytes
    pub fn tbs(&self) -> &[u8] {
        &self.tbs
    }

    /// The signature algorithm
    pub fn algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.algorithm
    }

    /// The raw signature value
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Verify the signature against `key`.
    ///
    /// # Errors
    /// - `Error::SignatureDecoding` if the signature algorithm is unsupported
    ///   or the signature is malformed.
    /// - `Error::SignatureVerification` if the signature does not match.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        let signature = Signature::try_from_algorithm_and_signature(&self.algorithm, &self.signature)?;
        key.verify(&self.tbs, &signature)
    }
}
