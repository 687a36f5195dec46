//! Containers signed by Sony consoles: PSP `.VMP` card images and PS3 `.PSV` single saves.
//!
//! Both carry a salt seed and a signature over the whole file, computed with the signature field
//! zeroed. A file whose signature does not verify is rejected.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use log::debug;
use sha1::{Digest, Sha1};

use super::Ps1Meta;
use crate::error::{Error, Result};
use crate::text;
use crate::volume::SaveFile;

const KEY: [u8; 16] = [
    0xAB, 0x5A, 0xBC, 0x9F, 0xC1, 0xF4, 0x9D, 0xE6, 0xA0, 0x51, 0xDB, 0xAE, 0xFA, 0x51, 0x88, 0x59,
];
const SALT_MASK: [u8; 16] = [
    0xB3, 0x0F, 0xFE, 0xED, 0xB7, 0xDC, 0x5E, 0xB7, 0x13, 0x3D, 0xA6, 0x0D, 0x1B, 0x6B, 0x2C, 0xDC,
];
const SALT_LEN: usize = 0x40;
pub const SEED_LEN: usize = 0x14;
pub const SIGNATURE_LEN: usize = 0x14;

/// Seed written into new images. Consoles accept any seed.
pub const DEFAULT_SEED: [u8; SEED_LEN] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13,
];

const VMP_MAGIC: [u8; 12] = [0, b'P', b'M', b'V', 0x80, 0, 0, 0, 0, 0, 0, 0];
pub const VMP_HEADER_LEN: usize = 0x80;
const VMP_SEED_AT: usize = 0x0C;
const VMP_SIGNATURE_AT: usize = 0x20;

const PSV_MAGIC: &[u8] = b"\0VSP\0\0\0\0";
pub const PSV_HEADER_LEN: usize = 0x84;
const PSV_SEED_AT: usize = 0x08;
const PSV_SIGNATURE_AT: usize = 0x1C;
/// Product code (12 bytes) followed by the game's suffix (8 bytes): the save's card file name.
const PSV_FILE_NAME: std::ops::Range<usize> = 0x64..0x78;

fn salt(seed: &[u8; SEED_LEN]) -> [u8; SALT_LEN] {
    let cipher = Aes128::new(&GenericArray::from(KEY));
    let mut salt = [0u8; SALT_LEN];

    let mut block = GenericArray::clone_from_slice(&seed[..16]);
    cipher.decrypt_block(&mut block);
    salt[..16].copy_from_slice(&block);
    let mut block = GenericArray::clone_from_slice(&seed[..16]);
    cipher.encrypt_block(&mut block);
    salt[16..32].copy_from_slice(&block);

    for (byte, mask) in salt[..16].iter_mut().zip(SALT_MASK) {
        *byte ^= mask;
    }
    let mut tail = [0xFFu8; 16];
    tail[..SEED_LEN - 16].copy_from_slice(&seed[16..]);
    for (byte, mask) in salt[16..32].iter_mut().zip(tail) {
        *byte ^= mask;
    }
    salt[SEED_LEN..].fill(0);
    salt
}

fn xor_all(salt: &mut [u8; SALT_LEN], value: u8) {
    salt.iter_mut().for_each(|byte| *byte ^= value);
}

/// Signature of `file`, taken with the `SIGNATURE_LEN` bytes at `signature_at` zeroed.
pub fn signature(file: &[u8], seed: &[u8; SEED_LEN], signature_at: usize) -> [u8; SIGNATURE_LEN] {
    let mut salt = salt(seed);
    xor_all(&mut salt, 0x36);

    let mut unsigned = file.to_vec();
    unsigned[signature_at..signature_at + SIGNATURE_LEN].fill(0);
    let inner = Sha1::new().chain_update(salt).chain_update(&unsigned).finalize();

    xor_all(&mut salt, 0x6A);
    Sha1::new().chain_update(salt).chain_update(inner).finalize().into()
}

fn verify(file: &[u8], seed_at: usize, signature_at: usize, structure: &'static str) -> Result<()> {
    let mut seed = [0u8; SEED_LEN];
    seed.copy_from_slice(&file[seed_at..seed_at + SEED_LEN]);
    let expected = signature(file, &seed, signature_at);
    if file[signature_at..signature_at + SIGNATURE_LEN] != expected {
        debug!("{structure}: stored signature does not match");
        return Err(Error::VolumeCorrupted { structure });
    }
    Ok(())
}

pub fn looks_like_vmp(bytes: &[u8]) -> bool {
    bytes.starts_with(&VMP_MAGIC)
}

/// Signs a raw card image into a PSP virtual memory card.
pub fn wrap_vmp(image: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; VMP_HEADER_LEN];
    out[..VMP_MAGIC.len()].copy_from_slice(&VMP_MAGIC);
    out[VMP_SEED_AT..VMP_SEED_AT + SEED_LEN].copy_from_slice(&DEFAULT_SEED);
    out.extend_from_slice(image);
    let signed = signature(&out, &DEFAULT_SEED, VMP_SIGNATURE_AT);
    out[VMP_SIGNATURE_AT..VMP_SIGNATURE_AT + SIGNATURE_LEN].copy_from_slice(&signed);
    out
}

/// Checks a PSP virtual memory card's signature and returns the card image behind the header.
pub fn unwrap_vmp(bytes: &[u8]) -> Result<Vec<u8>> {
    if !looks_like_vmp(bytes) {
        return Err(Error::mismatch("vmp", "missing PMV magic"));
    }
    if bytes.len() <= VMP_HEADER_LEN {
        return Err(Error::SizeMismatch {
            what: "VMP image",
            expected: VMP_HEADER_LEN + 1,
            actual: bytes.len(),
        });
    }
    verify(bytes, VMP_SEED_AT, VMP_SIGNATURE_AT, "VMP signature")?;
    Ok(bytes[VMP_HEADER_LEN..].to_vec())
}

/// Reads a PS3 single save. Its file name comes from the header and its payload is the rest of
/// the file.
pub fn read_psv(bytes: &[u8]) -> Result<SaveFile<Ps1Meta>> {
    if !bytes.starts_with(PSV_MAGIC) {
        return Err(Error::mismatch("psv", "missing VSP magic"));
    }
    if bytes.len() <= PSV_HEADER_LEN {
        return Err(Error::SizeMismatch {
            what: "PSV save",
            expected: PSV_HEADER_LEN + 1,
            actual: bytes.len(),
        });
    }
    verify(bytes, PSV_SEED_AT, PSV_SIGNATURE_AT, "PSV signature")?;
    let meta = Ps1Meta {
        file_name: text::decode_latin1(&bytes[PSV_FILE_NAME]),
    };
    Ok(SaveFile::new(meta, bytes[PSV_HEADER_LEN..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn signature_matches_known_value() {
        let mut file = vec![0u8; VMP_HEADER_LEN];
        file[..VMP_MAGIC.len()].copy_from_slice(&VMP_MAGIC);
        file[VMP_SEED_AT..VMP_SEED_AT + SEED_LEN].copy_from_slice(&DEFAULT_SEED);
        file.extend_from_slice(b"MC");
        file.extend_from_slice(&[0u8; 126]);
        let signed = signature(&file, &DEFAULT_SEED, VMP_SIGNATURE_AT);
        assert_eq!(hex(&signed), "7aeaabea5d93f7079dc68655bb26be0a785ee002");

        file[VMP_SIGNATURE_AT] = 0x55;
        assert_eq!(
            signature(&file, &DEFAULT_SEED, VMP_SIGNATURE_AT),
            signed,
            "the signature field is not signed"
        );
    }

    #[test]
    fn vmp_round_trip_and_tampering() {
        let mut image = vec![0u8; 128 * 1024];
        image[..2].copy_from_slice(b"MC");
        let vmp = wrap_vmp(&image);
        assert_eq!(vmp.len(), VMP_HEADER_LEN + image.len());
        assert_eq!(unwrap_vmp(&vmp).expect("signed image"), image);

        let mut tampered = vmp.clone();
        tampered[VMP_HEADER_LEN + 0x2000] ^= 1;
        assert!(matches!(
            unwrap_vmp(&tampered),
            Err(Error::VolumeCorrupted {
                structure: "VMP signature"
            })
        ));
    }

    #[test]
    fn psv_yields_a_named_save() {
        let mut psv = vec![0u8; PSV_HEADER_LEN];
        psv[..PSV_MAGIC.len()].copy_from_slice(PSV_MAGIC);
        psv[PSV_SEED_AT..PSV_SEED_AT + SEED_LEN].copy_from_slice(&[0x42; SEED_LEN]);
        psv[0x64..0x74].copy_from_slice(b"BASLUS-00594FF7\0");
        psv.extend_from_slice(b"SC");
        psv.extend_from_slice(&[7u8; 0x2000 - 2]);
        let signed = signature(&psv, &[0x42; SEED_LEN], PSV_SIGNATURE_AT);
        psv[PSV_SIGNATURE_AT..PSV_SIGNATURE_AT + SIGNATURE_LEN].copy_from_slice(&signed);

        let save = read_psv(&psv).expect("signed save");
        assert_eq!(save.meta.file_name, "BASLUS-00594FF7");
        assert_eq!(save.payload.len(), 0x2000);
        assert!(save.payload.starts_with(b"SC"));

        psv[0x64] = b'X';
        assert!(matches!(
            read_psv(&psv),
            Err(Error::VolumeCorrupted { .. })
        ));
    }
}
