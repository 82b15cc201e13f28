use regex::Regex;

use localrag_core::error::{RagError, Result};

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Translate a glob (`*` any run, `?` one char) into an anchored regex.
/// Every other character matches itself literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| RagError::Validation(format!("invalid pattern '{}': {}", pattern, e)))
}
