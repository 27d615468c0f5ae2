//! Login cryptography: AES-128/CFB8 stream ciphers for the transport, the
//! session-server hash, and RSA encryption of the login secrets.

use aes::Aes128;
use cfb8::cipher::generic_array::GenericArray;
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use sha1::{Digest, Sha1};

use crate::error::ClientError;

/// Outbound AES-128/CFB8 state. CFB8 produces one ciphertext byte per
/// plaintext byte and its register carries across packets, so every byte
/// must pass through exactly once and in order.
pub struct Cfb8Enc(cfb8::Encryptor<Aes128>);

/// Inbound AES-128/CFB8 state.
pub struct Cfb8Dec(cfb8::Decryptor<Aes128>);

impl Cfb8Enc {
    /// The login handshake uses the shared secret as both key and IV.
    pub fn new(secret: &[u8; 16]) -> Self {
        Self(cfb8::Encryptor::<Aes128>::new(secret.into(), secret.into()))
    }

    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.0.encrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

impl Cfb8Dec {
    pub fn new(secret: &[u8; 16]) -> Self {
        Self(cfb8::Decryptor::<Aes128>::new(secret.into(), secret.into()))
    }

    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(std::slice::from_ref(byte));
            self.0.decrypt_block_mut(&mut block);
            *byte = block[0];
        }
    }
}

/// SHA-1 over (server id, shared secret, public key), rendered the way the
/// session server expects: the 20-byte digest reinterpreted as a big-endian
/// signed integer, as lowercase hex, `-`-prefixed when negative, no leading
/// zeros on the magnitude.
pub fn server_hash(server_id: &str, shared_secret: &[u8], public_key: &[u8]) -> String {
    let mut sha = Sha1::new();
    sha.update(server_id.as_bytes());
    sha.update(shared_secret);
    sha.update(public_key);
    let digest: [u8; 20] = sha.finalize().into();
    signed_hex(&digest)
}

fn signed_hex(digest: &[u8; 20]) -> String {
    let negative = digest[0] & 0x80 != 0;
    let mut magnitude = *digest;
    if negative {
        // Two's complement to recover the magnitude.
        let mut carry = true;
        for byte in magnitude.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (value, overflow) = byte.overflowing_add(1);
                *byte = value;
                carry = overflow;
            }
        }
    }

    let mut hex = String::with_capacity(41);
    for byte in magnitude {
        hex.push_str(&format!("{byte:02x}"));
    }
    let trimmed = hex.trim_start_matches('0');
    let body = if trimmed.is_empty() { "0" } else { trimmed };
    if negative {
        format!("-{body}")
    } else {
        body.to_string()
    }
}

/// Encrypts a login secret under the server's DER-encoded RSA public key
/// with PKCS#1 v1.5 padding.
pub fn rsa_encrypt(der_public_key: &[u8], message: &[u8]) -> Result<Vec<u8>, ClientError> {
    let key = RsaPublicKey::from_public_key_der(der_public_key)
        .map_err(|err| ClientError::PublicKey(err.to_string()))?;
    let mut rng = rand::thread_rng();
    Ok(key.encrypt(&mut rng, Pkcs1v15Encrypt, message)?)
}
