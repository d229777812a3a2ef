/// Text shown in place of any message that cannot be decrypted locally.
pub const ENCRYPTED_PLACEHOLDER: &str = "Encrypted Message";
/// RSA modulus size for identity keys, in bits.
pub const IDENTITY_KEY_BITS: usize = 2048;
/// AES-256-GCM session key length in bytes.
pub const SESSION_KEY_LEN: usize = 32;
/// AES-GCM initialization vector length in bytes (96 bits).
pub const IV_LEN: usize = 12;
/// Maximum size for a single plaintext message in bytes.
pub const MAX_MESSAGE_SIZE_BYTES: usize = 8 * 1024;
/// Upper bound on a published base64 public key. A 2048-bit SPKI DER is ~400 chars.
pub const MAX_PUBLIC_KEY_LENGTH: usize = 4096;
