//! Screen naming convention
//!
//! `"Main Screen"` lives in module `main_screen` and is constructed from type
//! `MainScreen`. The mapping is deterministic; the registry rejects names
//! whose identities collide with an already registered screen.

use reloader_core::prelude::*;

/// Identities derived from one screen name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenIdentity {
    pub name: String,
    /// Lowercase, underscore-joined tokens
    pub module: String,
    /// Tokens concatenated without separators
    pub type_name: String,
}

/// Derive module and type identities from a screen name.
///
/// Tokens are whitespace-separated and must be ASCII alphanumeric.
pub fn derive_identity(screen_name: &str) -> Result<ScreenIdentity> {
    let tokens: Vec<&str> = screen_name.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(Error::screen_name(screen_name, "name is empty"));
    }

    if let Some(bad) = tokens
        .iter()
        .find(|t| !t.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return Err(Error::screen_name(
            screen_name,
            format!("token '{}' must be ASCII letters and digits", bad),
        ));
    }

    if tokens[0].starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::screen_name(screen_name, "must not start with a digit"));
    }

    Ok(ScreenIdentity {
        name: screen_name.to_string(),
        module: tokens
            .iter()
            .map(|t| t.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("_"),
        type_name: tokens.concat(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_word_name() {
        let id = derive_identity("Main Screen").unwrap();
        assert_eq!(id.module, "main_screen");
        assert_eq!(id.type_name, "MainScreen");
        assert_eq!(id.name, "Main Screen");
    }

    #[test]
    fn test_extra_whitespace_is_ignored() {
        let id = derive_identity("  Settings   Page 2 ").unwrap();
        assert_eq!(id.module, "settings_page_2");
        assert_eq!(id.type_name, "SettingsPage2");
    }

    #[test]
    fn test_single_word() {
        let id = derive_identity("Login").unwrap();
        assert_eq!(id.module, "login");
        assert_eq!(id.type_name, "Login");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            derive_identity("   "),
            Err(Error::ScreenName { .. })
        ));
    }

    #[test]
    fn test_punctuation_rejected() {
        assert!(derive_identity("Main-Screen").is_err());
        assert!(derive_identity("Main_Screen").is_err());
        assert!(derive_identity("Main Screen!").is_err());
    }

    #[test]
    fn test_leading_digit_rejected() {
        assert!(derive_identity("2nd Screen").is_err());
    }
}
