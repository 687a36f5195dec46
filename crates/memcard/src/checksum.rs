//! Checksum engine.
//!
//! The additive family is computed inline. The CRC family runs on `crc` tables that are built at
//! compile time and shared read-only through statics.

use crc::{Crc, CRC_16_IBM_SDLC, CRC_16_XMODEM, CRC_32_ISO_HDLC};

use crate::layout::{ChecksumSpec, Endian};

static CRC16_X25: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);
static CRC16_XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// 16-bit word sum followed by the sum of the inverted words. A result of 0xFFFF is stored as 0.
    AdditiveInverse16,
    /// 16-bit word sum A followed by `base - A`.
    AdditiveComplement16 { base: u16 },
    Sum8,
    Xor8,
    Crc16X25,
    Crc16Xmodem,
    Crc32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumValue {
    Pair(u16, u16),
    Word(u16),
    Byte(u8),
    Long(u32),
}

impl ChecksumKind {
    /// Bytes the stored value occupies.
    pub fn stored_len(self) -> usize {
        match self {
            ChecksumKind::AdditiveInverse16 | ChecksumKind::AdditiveComplement16 { .. } => 4,
            ChecksumKind::Sum8 | ChecksumKind::Xor8 => 1,
            ChecksumKind::Crc16X25 | ChecksumKind::Crc16Xmodem => 2,
            ChecksumKind::Crc32 => 4,
        }
    }
}

fn word_sum(data: &[u8], endian: Endian) -> u16 {
    data.chunks_exact(2)
        .fold(0u16, |sum, word| sum.wrapping_add(endian.read_u16(word)))
}

pub fn compute(kind: ChecksumKind, data: &[u8], endian: Endian) -> ChecksumValue {
    match kind {
        ChecksumKind::AdditiveInverse16 => {
            let mut sum = 0u16;
            let mut inverse = 0u16;
            for word in data.chunks_exact(2) {
                let value = endian.read_u16(word);
                sum = sum.wrapping_add(value);
                inverse = inverse.wrapping_add(value ^ 0xFFFF);
            }
            let fold = |v: u16| if v == 0xFFFF { 0 } else { v };
            ChecksumValue::Pair(fold(sum), fold(inverse))
        }
        ChecksumKind::AdditiveComplement16 { base } => {
            let sum = word_sum(data, endian);
            ChecksumValue::Pair(sum, base.wrapping_sub(sum))
        }
        ChecksumKind::Sum8 => {
            ChecksumValue::Byte(data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)))
        }
        ChecksumKind::Xor8 => ChecksumValue::Byte(data.iter().fold(0u8, |acc, &b| acc ^ b)),
        ChecksumKind::Crc16X25 => ChecksumValue::Word(CRC16_X25.checksum(data)),
        ChecksumKind::Crc16Xmodem => ChecksumValue::Word(CRC16_XMODEM.checksum(data)),
        ChecksumKind::Crc32 => ChecksumValue::Long(CRC32.checksum(data)),
    }
}

pub fn read_stored(kind: ChecksumKind, buf: &[u8], endian: Endian) -> ChecksumValue {
    match kind {
        ChecksumKind::AdditiveInverse16 | ChecksumKind::AdditiveComplement16 { .. } => {
            ChecksumValue::Pair(endian.read_u16(buf), endian.read_u16(&buf[2..]))
        }
        ChecksumKind::Sum8 | ChecksumKind::Xor8 => ChecksumValue::Byte(buf[0]),
        ChecksumKind::Crc16X25 | ChecksumKind::Crc16Xmodem => {
            ChecksumValue::Word(endian.read_u16(buf))
        }
        ChecksumKind::Crc32 => ChecksumValue::Long(endian.read_u32(buf)),
    }
}

pub fn write_value(value: ChecksumValue, buf: &mut [u8], endian: Endian) {
    match value {
        ChecksumValue::Pair(a, b) => {
            endian.write_u16(buf, a);
            endian.write_u16(&mut buf[2..], b);
        }
        ChecksumValue::Word(w) => endian.write_u16(buf, w),
        ChecksumValue::Byte(b) => buf[0] = b,
        ChecksumValue::Long(l) => endian.write_u32(buf, l),
    }
}

/// Computes the checksum described by `spec` over `structure` and stores it in place.
pub fn store(spec: &ChecksumSpec, structure: &mut [u8], endian: Endian) {
    let value = compute(spec.kind, &structure[spec.start..spec.start + spec.len], endian);
    write_value(value, &mut structure[spec.stored_at..], endian);
}

pub fn verify(spec: &ChecksumSpec, structure: &[u8], endian: Endian) -> bool {
    let computed = compute(spec.kind, &structure[spec.start..spec.start + spec.len], endian);
    computed == read_stored(spec.kind, &structure[spec.stored_at..], endian)
}

pub fn crc16_x25(data: &[u8]) -> u16 {
    CRC16_X25.checksum(data)
}

pub fn crc16_xmodem(data: &[u8]) -> u16 {
    CRC16_XMODEM.checksum(data)
}

pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Reflected CRC-32 that starts from `initial` as the raw register value and returns the raw
/// register without the final inversion. Payload fixups chain it across several ranges.
pub fn crc32_raw(data: &[u8], initial: u32) -> u32 {
    // The digest reflects its initial value, and finalize applies the 0xFFFFFFFF xorout.
    let mut digest = CRC32.digest_with_initial(initial.reverse_bits());
    digest.update(data);
    digest.finalize() ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn crc_check_values() {
        assert_eq!(crc16_x25(CHECK), 0x906E, "CRC-16/X-25 check value");
        assert_eq!(crc16_xmodem(CHECK), 0x31C3, "CRC-16/XMODEM check value");
        assert_eq!(crc32(CHECK), 0xCBF4_3926, "CRC-32 check value");
    }

    fn crc32_bitwise(data: &[u8], initial: u32) -> u32 {
        let mut crc = initial;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
            }
        }
        crc
    }

    #[test]
    fn raw_crc32_matches_register_arithmetic() {
        for initial in [0u32, 0xFFFF_FFFF, 0x1234_5678] {
            assert_eq!(
                crc32_raw(CHECK, initial),
                crc32_bitwise(CHECK, initial),
                "raw register mismatch for initial {initial:#x}"
            );
        }
        assert_eq!(crc32_raw(CHECK, 0xFFFF_FFFF) ^ 0xFFFF_FFFF, crc32(CHECK));
    }

    #[test]
    fn additive_inverse_folds_all_ones_to_zero() {
        let data = [0u8; 4];
        // Two zero words: inverse sum is 0xFFFF + 0xFFFF = 0xFFFE.
        assert_eq!(
            compute(ChecksumKind::AdditiveInverse16, &data, Endian::Big),
            ChecksumValue::Pair(0, 0xFFFE)
        );
        let data = [0xFF, 0xFF];
        assert_eq!(
            compute(ChecksumKind::AdditiveInverse16, &data, Endian::Big),
            ChecksumValue::Pair(0, 0),
            "a single 0xFFFF word sums to 0xFFFF which is stored as 0"
        );
    }

    #[test]
    fn store_then_verify_detects_single_bit_flip() {
        let spec = ChecksumSpec {
            kind: ChecksumKind::AdditiveInverse16,
            start: 0,
            len: 60,
            stored_at: 60,
            critical: true,
        };
        let mut block: Vec<u8> = (0..64u8).collect();
        store(&spec, &mut block, Endian::Big);
        assert!(verify(&spec, &block, Endian::Big));
        block[61] ^= 0x01;
        assert!(!verify(&spec, &block, Endian::Big), "flipped stored bit must fail");
    }

    #[test]
    fn complement_pair_sums_to_base() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let ChecksumValue::Pair(a, b) =
            compute(ChecksumKind::AdditiveComplement16 { base: 0xFFF2 }, &data, Endian::Big)
        else {
            panic!("pair expected");
        };
        assert_eq!(a, 0x0406);
        assert_eq!(a.wrapping_add(b), 0xFFF2);
    }
}
