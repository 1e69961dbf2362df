//! Byte-level encodings shared between host code and the GLSL passes: material
//! classification ranges, the two-byte temperature field, and the 128-midpoint
//! signed scalar used for velocity and force. Kept free of any `wgpu` types so
//! it can be exercised with plain unit tests.

/// Coarse class a `material_id` falls into, derived purely from its numeric range.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MaterialClass {
    Empty,
    Static,
    Solid,
    Liquid,
    Gas,
    Reserved,
}

impl MaterialClass {
    /// Movable cells participate in Margolus transport, liquid-spread and Archimedes;
    /// everything else is left in place by those passes.
    pub fn is_movable(self) -> bool {
        matches!(self, MaterialClass::Solid | MaterialClass::Liquid | MaterialClass::Gas)
    }
}

/// Classifies a material id by the fixed ranges from the material table:
/// 0-15 EMPTY, 16-32 STATIC, 33-63 SOLID, 64-111 LIQUID, 112-159 GAS, 160-255 reserved.
/// An id that somehow falls outside these ranges (there are none, since they cover
/// the full u8 space) would be unreachable; unknown ids encountered on read-back
/// are classified as EMPTY by the caller, not here.
pub fn classify(material_id: u8) -> MaterialClass {
    match material_id {
        0..=15 => MaterialClass::Empty,
        16..=32 => MaterialClass::Static,
        33..=63 => MaterialClass::Solid,
        64..=111 => MaterialClass::Liquid,
        112..=159 => MaterialClass::Gas,
        160..=255 => MaterialClass::Reserved,
    }
}

pub fn is_empty(material_id: u8) -> bool {
    classify(material_id) == MaterialClass::Empty
}

pub fn is_static(material_id: u8) -> bool {
    classify(material_id) == MaterialClass::Static
}

pub fn is_movable(material_id: u8) -> bool {
    classify(material_id).is_movable()
}

pub fn is_liquid(material_id: u8) -> bool {
    classify(material_id) == MaterialClass::Liquid
}

/// Midpoint byte value for signed scalar encoding (velocity, force). 128 == neutral/zero.
pub const SIGNED_MIDPOINT: u8 = 128;

/// Packs a temperature in Kelvin (0..=65535) into little-endian (low, high) bytes,
/// matching the layout of H's R,G channels.
pub fn encode_temperature(kelvin: u16) -> (u8, u8) {
    let bytes = kelvin.to_le_bytes();
    (bytes[0], bytes[1])
}

/// Inverse of `encode_temperature`.
pub fn decode_temperature(low: u8, high: u8) -> u16 {
    u16::from_le_bytes([low, high])
}

/// Packs a signed scalar in [-1.0, 1.0] to a byte centered on 128, saturating at the
/// ends of the range rather than wrapping. The scaling is applied before clamping so
/// that `encode_signed(decode_signed(b)) == b` holds for every byte, including 0.
pub fn encode_signed(value: f32) -> u8 {
    let scaled = (value * 127.0) + SIGNED_MIDPOINT as f32;
    scaled.round().clamp(0.0, 255.0) as u8
}

/// Inverse of `encode_signed`: decodes a byte to a float in approximately [-1.0, 1.0].
pub fn decode_signed(byte: u8) -> f32 {
    (byte as f32 - SIGNED_MIDPOINT as f32) / 127.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_ranges_cover_the_whole_byte_space() {
        assert_eq!(classify(0), MaterialClass::Empty);
        assert_eq!(classify(15), MaterialClass::Empty);
        assert_eq!(classify(16), MaterialClass::Static);
        assert_eq!(classify(32), MaterialClass::Static);
        assert_eq!(classify(33), MaterialClass::Solid);
        assert_eq!(classify(63), MaterialClass::Solid);
        assert_eq!(classify(64), MaterialClass::Liquid);
        assert_eq!(classify(111), MaterialClass::Liquid);
        assert_eq!(classify(112), MaterialClass::Gas);
        assert_eq!(classify(159), MaterialClass::Gas);
        assert_eq!(classify(160), MaterialClass::Reserved);
        assert_eq!(classify(255), MaterialClass::Reserved);
    }

    #[test]
    fn movability_matches_spec_classes() {
        assert!(!is_movable(5)); // empty
        assert!(!is_movable(20)); // static
        assert!(is_movable(35)); // solid
        assert!(is_movable(70)); // liquid
        assert!(is_movable(120)); // gas
        assert!(!is_movable(200)); // reserved
    }

    #[test]
    fn temperature_round_trips_for_every_u16() {
        for t in 0..=u16::MAX {
            let (low, high) = encode_temperature(t);
            assert_eq!(decode_temperature(low, high), t);
        }
    }

    #[test]
    fn signed_byte_round_trips_for_every_u8() {
        for byte in 0..=255u8 {
            let decoded = decode_signed(byte);
            let reencoded = encode_signed(decoded);
            assert_eq!(reencoded, byte);
        }
    }

    #[test]
    fn neutral_byte_decodes_to_zero() {
        assert_eq!(decode_signed(SIGNED_MIDPOINT), 0.0);
        assert_eq!(encode_signed(0.0), SIGNED_MIDPOINT);
    }

    #[test]
    fn signed_encoding_saturates_outside_unit_range() {
        assert_eq!(encode_signed(-5.0), 0);
        assert_eq!(encode_signed(5.0), 255);
    }
}
