use crate::error::{AuthField, MalformedAuthError};

pub(crate) fn hex_encode_upper(b: &[u8]) -> String {
    hex::encode_upper(b)
}

/// Decodes a hex field of exactly `out.len() * 2` characters.
///
/// Both upper and lower case digits are accepted.
pub(crate) fn hex_decode_field(
    field: AuthField,
    s: &[u8],
    out: &mut [u8],
) -> Result<(), MalformedAuthError> {
    let expected = out.len() * 2;
    if s.len() != expected {
        return Err(MalformedAuthError::FieldLength {
            field,
            expected,
            actual: s.len(),
        });
    }

    hex::decode_to_slice(s, out).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            MalformedAuthError::NonHexCharacter {
                field,
                character: c,
                index,
            }
        }
        _ => MalformedAuthError::FieldLength {
            field,
            expected,
            actual: s.len(),
        },
    })
}

#[cfg(test)]
mod test {
    use crate::error::{AuthField, MalformedAuthError};
    use crate::hex::{hex_decode_field, hex_encode_upper};

    #[test]
    fn decodes_mixed_case() {
        let mut out = [0_u8; 4];
        hex_decode_field(AuthField::Salt, b"aBcD0123", &mut out).unwrap();
        assert_eq!(out, [0xAB, 0xCD, 0x01, 0x23]);
        assert_eq!(hex_encode_upper(&out), "ABCD0123");
    }

    #[test]
    fn reports_offending_character() {
        let mut out = [0_u8; 4];
        let e = hex_decode_field(AuthField::Hash, b"ABCDEFGH", &mut out).unwrap_err();
        assert_eq!(
            e,
            MalformedAuthError::NonHexCharacter {
                field: AuthField::Hash,
                character: 'G',
                index: 6,
            }
        );
    }

    #[test]
    fn rejects_wrong_length() {
        let mut out = [0_u8; 8];
        let e = hex_decode_field(AuthField::Salt, b"A1B2C3D4E5F6789", &mut out).unwrap_err();
        assert_eq!(
            e,
            MalformedAuthError::FieldLength {
                field: AuthField::Salt,
                expected: 16,
                actual: 15,
            }
        );
    }
}
