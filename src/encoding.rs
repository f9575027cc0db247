//! Base64 helpers for script bodies.
//!
//! The API stores module scripts and lifecycle hooks base64-encoded
//! (standard alphabet, padded); configuration holds the plain text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode script text for the wire.
pub fn str_to_b64(data: &str) -> String {
    STANDARD.encode(data.as_bytes())
}

/// Decode a wire script. Anything that is not valid base64 decodes to `""`.
pub fn b64_to_str(data: &str) -> String {
    match STANDARD.decode(data) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_b64() {
        assert_eq!(str_to_b64("mystring"), "bXlzdHJpbmc=");
        assert_eq!(str_to_b64(""), "");
        assert_eq!(
            str_to_b64("#!/usr/bin/env bash"),
            "IyEvdXNyL2Jpbi9lbnYgYmFzaA=="
        );
    }

    #[test]
    fn test_b64_to_str() {
        assert_eq!(b64_to_str("bXlzdHJpbmc="), "mystring");
        assert_eq!(b64_to_str(""), "");
    }

    #[test]
    fn test_b64_to_str_invalid_is_empty() {
        assert_eq!(b64_to_str("-1"), "");
        assert_eq!(b64_to_str("()"), "");
    }

    #[test]
    fn test_script_text_survives() {
        let script = "#!/bin/bash\nset -e\necho \"héllo\" > /tmp/out\n";
        assert_eq!(b64_to_str(&str_to_b64(script)), script);
    }
}
