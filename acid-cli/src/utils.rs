//! Common utility functions shared across CLI commands.

use std::io::Write;

use acid_core::Method;
use anyhow::{Context, Result};

/// Print a prompt and read one trimmed line from stdin.
pub fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

/// Parse a method-selection answer. `q` aborts.
pub fn parse_method_choice(answer: &str) -> Option<Method> {
    match answer {
        "1" => Some(Method::Biometric),
        "2" => Some(Method::Face),
        "3" => Some(Method::Totp),
        "4" => Some(Method::TrustedParty),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_choice() {
        assert_eq!(parse_method_choice("1"), Some(Method::Biometric));
        assert_eq!(parse_method_choice("4"), Some(Method::TrustedParty));
        assert_eq!(parse_method_choice("5"), None);
        assert_eq!(parse_method_choice("q"), None);
    }
}
