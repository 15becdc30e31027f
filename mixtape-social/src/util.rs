use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Generates a random alphanumeric string, used for session tokens and
/// public playlist identifiers.
pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_random_string() {
        let result = random_string(32);

        assert_eq!(result.len(), 32);
        assert!(result.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
