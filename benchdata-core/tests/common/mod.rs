//! Helpers shared by the integration tests.

pub fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|token| (*token).to_owned()).collect()
}
