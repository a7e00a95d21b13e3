use encoding_rs::WINDOWS_1252;

/// Encodes a string by inverting the bytes and then reversing them.
///
/// This is an in-place operation.
pub fn encode_string(bytes: &mut [u8]) {
    invert_characters(bytes);
    bytes.reverse();
}

/// Decodes a string by reversing the bytes and then inverting them.
///
/// This is an in-place operation.
pub fn decode_string(bytes: &mut [u8]) {
    bytes.reverse();
    invert_characters(bytes);
}

// The transform is an involution for a fixed buffer length: only printable
// bytes in [0x22, 0x7E] are touched, and the flip offset alternates with the
// byte position, seeded by the length's parity.
fn invert_characters(bytes: &mut [u8]) {
    let mut flippy = bytes.len() % 2 == 1;

    for byte in bytes.iter_mut() {
        let c = *byte;
        let mut f: i32 = 0;

        if flippy {
            f = 0x2E;
            if c >= 0x50 {
                f = -f;
            }
        }

        if (0x22..=0x7E).contains(&c) {
            *byte = (0x9F - i32::from(c) - f) as u8;
        }

        flippy = !flippy;
    }
}

/// Decodes windows-1252 bytes to a string.
///
/// Bytes with no windows-1252 mapping are replaced.
pub(crate) fn decode_ansi(bytes: &[u8]) -> String {
    let (decoded, _, _) = WINDOWS_1252.decode(bytes);
    decoded.into_owned()
}

/// Encodes a string to windows-1252 bytes.
///
/// Characters with no windows-1252 mapping are replaced.
pub(crate) fn encode_ansi(string: &str) -> Vec<u8> {
    let (encoded, _, _) = WINDOWS_1252.encode(string);
    encoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // (decoded, encoded) pairs captured from the official client's behavior.
    const TEST_CASES: &[(&str, &str)] = &[
        ("Hello, World!", "!;a-^H s^3a:)"),
        (
            "We're ¼ of the way there, so ¾ is remaining.",
            "C8_6_6l2h- ,d ¾ ^, sh-h7Y T>V h7Y g0 ¼ :[xhH",
        ),
        ("64² = 4096", ";fAk b ²=i"),
        ("© FÒÖ BÃR BÅZ 2014", "=nAm EÅ] MÃ] ÖÒY ©"),
        (
            "Öxxö Xööx \"Lëïth Säë\" - \"Ÿ\"",
            "OŸO D OëäL 7YïëSO UööG öU'Ö",
        ),
        (
            "Padded with 0xFFÿÿÿÿÿÿÿÿ",
            "ÿÿÿÿÿÿÿÿ+YUo 7Y6V i:i;lO",
        ),
    ];

    #[test]
    fn encode() {
        for (decoded, encoded) in TEST_CASES {
            let mut bytes = encode_ansi(decoded);
            encode_string(&mut bytes);
            assert_eq!(decode_ansi(&bytes), *encoded, "encoding {:?}", decoded);
        }
    }

    #[test]
    fn decode() {
        for (decoded, encoded) in TEST_CASES {
            let mut bytes = encode_ansi(encoded);
            decode_string(&mut bytes);
            assert_eq!(decode_ansi(&bytes), *decoded, "decoding {:?}", encoded);
        }
    }

    #[test]
    fn round_trip() {
        for (decoded, _) in TEST_CASES {
            let mut bytes = encode_ansi(decoded);
            encode_string(&mut bytes);
            decode_string(&mut bytes);
            assert_eq!(decode_ansi(&bytes), *decoded);
        }
    }
}
