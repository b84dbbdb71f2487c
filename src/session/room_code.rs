//! Human-enterable room codes and join links.

use rand::{Rng, seq::IndexedRandom};

/// Code alphabet; `I`, `O`, `0` and `1` are left out so codes read unambiguously.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Characters per code.
pub const CODE_LENGTH: usize = 4;

/// Draw a code with independent, uniform characters.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .filter_map(|_| CODE_ALPHABET.choose(rng).map(|byte| char::from(*byte)))
        .collect()
}

/// Upper-case and validate a user-typed code.
pub fn normalize(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    let valid = code.len() == CODE_LENGTH && code.bytes().all(|byte| CODE_ALPHABET.contains(&byte));
    valid.then_some(code)
}

/// Link a controller opens to join `code`.
pub fn join_url(base: &str, code: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}room={code}")
}

/// Extract the room code from a join link query string (`room=abcd&...`).
pub fn room_from_query(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "room")
        .and_then(|(_, value)| normalize(value))
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn generated_codes_use_only_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let code = generate(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|byte| CODE_ALPHABET.contains(&byte)));
            assert_eq!(normalize(&code), Some(code));
        }
    }

    #[test]
    fn character_distribution_is_uniform() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut counts = [0usize; 32];
        let draws = 40_000;
        for _ in 0..draws {
            for byte in generate(&mut rng).bytes() {
                let index = CODE_ALPHABET
                    .iter()
                    .position(|candidate| *candidate == byte)
                    .unwrap();
                counts[index] += 1;
            }
        }

        let expected = (draws * CODE_LENGTH) as f64 / CODE_ALPHABET.len() as f64;
        for (index, count) in counts.iter().enumerate() {
            let deviation = (*count as f64 - expected).abs() / expected;
            assert!(
                deviation < 0.1,
                "{} drawn {count} times, expected about {expected}",
                char::from(CODE_ALPHABET[index])
            );
        }
    }

    #[test]
    fn normalize_upper_cases_and_rejects_ambiguous_glyphs() {
        assert_eq!(normalize(" abcd "), Some("ABCD".into()));
        assert_eq!(normalize("AB0D"), None);
        assert_eq!(normalize("ABI2"), None);
        assert_eq!(normalize("ABCDE"), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn join_links_round_trip_through_the_query() {
        let url = join_url("https://party.example/", "WXYZ");
        assert_eq!(url, "https://party.example/?room=WXYZ");
        let (_, query) = url.split_once('?').unwrap();
        assert_eq!(room_from_query(query), Some("WXYZ".into()));

        assert_eq!(
            join_url("https://party.example/?lang=fr", "WXYZ"),
            "https://party.example/?lang=fr&room=WXYZ"
        );
        assert_eq!(room_from_query("lang=fr&room=wxyz"), Some("WXYZ".into()));
        assert_eq!(room_from_query("lang=fr"), None);
    }
}
