//! Payload integrity digests.
//!
//! Uploads carry the SHA-256 of the file contents and downloads are checked
//! against the digest the server sends. Payloads are fed to the hash in
//! [`HASH_CHUNK`](config::HASH_CHUNK) sized pieces, which doesn't change the result.

#[allow(unused_imports)]
use {
    crate::error::{Error, Result, TrapBug},
    log::{debug, error, info, log, trace, warn},
};

use digest::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config;

/// A SHA-256 digest as carried on the wire
pub type FileDigest = [u8; config::DIGEST_LEN];

/// Returns the digest of `payload`
pub fn digest(payload: &[u8]) -> FileDigest {
    digest_chunked(payload, config::HASH_CHUNK)
}

/// Returns the digest of `payload`, hashed `chunk` bytes at a time.
///
/// A `chunk` of zero is treated as one.
pub fn digest_chunked(payload: &[u8], chunk: usize) -> FileDigest {
    let mut hash_ctx = Sha256::new();
    for c in payload.chunks(chunk.max(1)) {
        hash_ctx.update(c);
    }
    hash_ctx.finalize().into()
}

/// Returns `true` if `payload` hashes to `expect`. Compares in constant time.
pub fn verify(expect: &FileDigest, payload: &[u8]) -> bool {
    let d = digest(payload);
    d.ct_eq(expect).into()
}

#[cfg(test)]
mod tests {
    use crate::hash::*;
    use crate::rfmlog::init_test_log;

    use pretty_hex::PrettyHex;

    // sha256("abc")
    const ABC: FileDigest = [
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde,
        0x5d, 0xae, 0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c,
        0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
    ];

    // sha256("")
    const EMPTY: FileDigest = [
        0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8,
        0x99, 0x6f, 0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c,
        0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
    ];

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn known_vectors() {
        init_test_log();
        assert_eq!(digest(b"abc"), ABC);
        assert_eq!(digest(b""), EMPTY);
    }

    #[test]
    /// chunk size must not change the digest
    fn chunking_invariant() {
        init_test_log();
        for len in [0, 1, 1023, 1024, 1025, 3000, 4096, 10_001] {
            let p = sample(len);
            let one = digest_chunked(&p, 1);
            let k = digest_chunked(&p, 1024);
            trace!("len {len} digest {:?}", k.hex_dump());
            assert_eq!(one, k, "len {len}");
            assert_eq!(digest_chunked(&p, 0), k);
            assert_eq!(digest_chunked(&p, 7), k);
            assert_eq!(Sha256::digest(&p).as_slice(), &k);
        }
    }

    #[test]
    fn verify_mismatch() {
        let p = sample(2000);
        let d = digest(&p);
        assert!(verify(&d, &p));
        let mut bad = p.clone();
        bad[1999] ^= 1;
        assert!(!verify(&d, &bad));
        assert!(!verify(&EMPTY, &p));
    }
}
