use ed25519_dalek::{Signature, Verifier, VerifyingKey};

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Everything needed to authenticate one interaction. `raw_body` must be the
/// exact bytes received on the wire, never a re-serialized form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationMaterial<'a> {
    pub public_key: &'a str,
    pub signature: &'a str,
    pub timestamp: &'a str,
    pub raw_body: &'a [u8],
}

/// Returns true when `signature` is a valid Ed25519 signature by `public_key`
/// over `timestamp || raw_body`. Both hex values are decoded exactly as given,
/// so surrounding whitespace is a decoding problem, and every decoding problem
/// yields false.
pub fn verify(material: &VerificationMaterial<'_>) -> bool {
    let Some(key) = decode_public_key(material.public_key) else {
        return false;
    };
    let Some(signature) = decode_signature(material.signature) else {
        return false;
    };

    let mut message = Vec::with_capacity(material.timestamp.len() + material.raw_body.len());
    message.extend_from_slice(material.timestamp.as_bytes());
    message.extend_from_slice(material.raw_body);

    key.verify(&message, &signature).is_ok()
}

fn decode_public_key(encoded: &str) -> Option<VerifyingKey> {
    let bytes: [u8; 32] = hex::decode(encoded).ok()?.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn decode_signature(encoded: &str) -> Option<Signature> {
    let bytes = hex::decode(encoded).ok()?;
    Signature::from_slice(&bytes).ok()
}

#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    public_key: String,
}

impl SignatureVerifier {
    /// Strips whitespace left around the configured key by env files.
    pub fn new(public_key: impl Into<String>) -> Self {
        let public_key: String = public_key.into();
        Self { public_key: public_key.trim().to_owned() }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn verify(&self, signature: &str, timestamp: &str, raw_body: &[u8]) -> bool {
        verify(&VerificationMaterial {
            public_key: &self.public_key,
            signature,
            timestamp,
            raw_body,
        })
    }
}
