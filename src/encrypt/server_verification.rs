/// Hashes a challenge value sent by the client during connection
/// initialization.
///
/// The client sends a challenge in the `INIT_INIT` client packet, the server
/// responds with the hash, and the client drops the connection if its own
/// hash of the challenge does not match.
///
/// Challenges larger than 11,092,110 may produce negative hash values, which
/// cannot be represented in the EO protocol.
pub fn server_verification_hash(challenge: i32) -> i32 {
    let challenge = challenge + 1;
    110905
        + (server_mod(challenge, 9) + 1)
            * server_mod(
                11092004 - challenge,
                (challenge.rem_euclid(11) + 1) * 119,
            )
            * 119
        + server_mod(challenge, 2004)
}

// A quirk of the original game server: the result of a floored modulus,
// shifted down by the divisor when the dividend is negative.
fn server_mod(a: i32, b: i32) -> i32 {
    let mut result = a.rem_euclid(b);
    if a < 0 {
        result -= b;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::THREE_MAX;

    #[test]
    fn hash_known_values() {
        let cases: &[(i32, i32)] = &[
            (0, 114000),
            (1, 115191),
            (2, 229432),
            (5, 613210),
            (12345, 266403),
            (100_000, 145554),
            (5_000_000, 339168),
            (11_092_003, 112773),
            (11_092_004, 112655),
            (11_092_005, 112299),
            (11_092_110, 11016),
            (11_092_111, -2787),
            (11_111_111, 103749),
            (12_345_678, -32046),
            (THREE_MAX as i32 - 1, 105960),
        ];

        for (challenge, expected) in cases {
            assert_eq!(
                server_verification_hash(*challenge),
                *expected,
                "hashing challenge {}",
                challenge
            );
        }
    }
}
