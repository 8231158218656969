// Reply decoding helpers
//
// All multi-byte values on this bus are big-endian.

use super::frame::{ProtocolError, Result};

fn ensure_len(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(ProtocolError::ShortPayload {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Unsigned 16-bit value from bytes `at..at + 2`
pub fn be_u16(bytes: &[u8], at: usize) -> Result<u16> {
    ensure_len(bytes, at + 2)?;
    Ok(u16::from_be_bytes([bytes[at], bytes[at + 1]]))
}

/// Unsigned 32-bit value from the first four bytes
pub fn be_u32(bytes: &[u8]) -> Result<u32> {
    ensure_len(bytes, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Signed 32-bit value from the first four bytes
pub fn be_i32(bytes: &[u8]) -> Result<i32> {
    ensure_len(bytes, 4)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Concatenate every non-zero byte as a character.
///
/// Zero bytes anywhere in the buffer are skipped, not treated as a terminator.
pub fn name(bytes: &[u8]) -> String {
    bytes.iter().filter(|&&b| b != 0).map(|&b| b as char).collect()
}

/// Render a version word as "a.b.c" from decimal digit positions 0, 3 and 6.
///
/// e.g. 3_000_033 -> "3.0.3". Values with fewer than seven decimal characters
/// cannot be split this way.
pub fn version(raw: i32) -> Result<String> {
    let digits: Vec<char> = raw.to_string().chars().collect();
    if digits.len() < 7 {
        return Err(ProtocolError::MalformedVersion(raw));
    }
    Ok(format!("{}.{}.{}", digits[0], digits[3], digits[6]))
}

/// Light level from bytes 2-3 of a sensor reply
pub fn light(bytes: &[u8]) -> Result<i32> {
    ensure_len(bytes, 4)?;
    Ok((((bytes[2] as i32) << 8) & 0xFF00) + bytes[3] as i32)
}

/// Gyro angle or rate from bytes 2-3 of a sensor reply.
///
/// NOTE: the sign test uses bit 0x1000, not the 16-bit sign bit 0x8000.
/// Readings the board reports with bit 12 set come out negative; kept as the
/// board's existing clients decode it.
pub fn rotation(bytes: &[u8]) -> Result<i32> {
    let mut value = be_u16(bytes, 2)? as i32;
    if value & 0x1000 != 0 {
        value -= 0x10000;
    }
    Ok(value)
}

/// Board id as uppercase hex
pub fn hex_id(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_word() {
        assert_eq!(be_u16(&[0x0C, 0x80], 0).unwrap(), 3200);
    }

    #[test]
    fn test_name_drops_every_zero() {
        let mut raw = [0u8; 20];
        raw[..5].copy_from_slice(&[0x41, 0x00, 0x42, 0x00, 0x43]);
        assert_eq!(name(&raw), "ABC");
        assert_eq!(name(&[0u8; 20]), "");
    }

    #[test]
    fn test_version_digit_positions() {
        assert_eq!(version(3_000_033).unwrap(), "3.0.3");
        assert_eq!(version(3_000_032).unwrap(), "3.0.2");
        assert_eq!(version(1_004_009).unwrap(), "1.4.9");
        // Only three of the digits are looked at
        assert_eq!(version(1_234_567).unwrap(), "1.4.7");
        assert_eq!(version(-1_234_567).unwrap(), "-.3.6");
        assert!(matches!(version(99_999), Err(ProtocolError::MalformedVersion(99_999))));
    }

    #[test]
    fn test_rotation_threshold() {
        assert_eq!(rotation(&[0, 0, 0x10, 0x01]).unwrap(), 0x1001 - 0x10000);
        assert_eq!(rotation(&[0, 0, 0x00, 0x5A]).unwrap(), 90);
        assert_eq!(rotation(&[0, 0, 0x0F, 0xFF]).unwrap(), 0x0FFF);
        assert!(matches!(
            rotation(&[0, 0, 1]),
            Err(ProtocolError::ShortPayload { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_light_masks_to_16_bits() {
        assert_eq!(light(&[0, 0, 0x02, 0x10]).unwrap(), 0x0210);
        assert_eq!(light(&[0, 0, 0xFF, 0xFF]).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_u32_has_no_sign_extension() {
        assert_eq!(be_u32(&[0xFF, 0xFF, 0xFF, 0xFE]).unwrap(), 0xFFFF_FFFE);
        assert_eq!(be_i32(&[0xFF, 0xFF, 0xFF, 0xFE]).unwrap(), -2);
    }

    #[test]
    fn test_hex_id() {
        assert_eq!(hex_id(&[0x0A, 0xB1, 0x00]), "0AB100");
    }
}
