//! Datasource login credentials with automatic memory zeroing.
//!
//! # Security
//! - Credentials are stored in `Zeroizing<T>` containers
//! - Memory is cleared when credentials go out of scope
//! - Passwords never appear in `Debug` output, logs or persisted files

use zeroize::{Zeroize, Zeroizing};

/// Login for a target database.
///
/// The password only lives for the current process. The datasource
/// registry writes the user name and drops the password on save.
///
/// # Example
///
/// ```rust
/// use dbassess_core::security::Credentials;
///
/// let creds = Credentials::new("auditor".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "auditor");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Default, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if a non-empty password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Exposes the password to a connector.
    ///
    /// Callers must not log or persist the returned value.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Replaces the password, zeroing the previous one.
    pub fn set_password(&mut self, password: Option<String>) {
        self.password = Zeroizing::new(password);
    }

    /// Returns a copy without the password.
    pub fn without_password(&self) -> Self {
        Self::new(self.username.to_string(), None)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &self.has_password().then_some("****"))
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        *self.username == *other.username && *self.password == *other.password
    }
}

impl Eq for Credentials {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_password_is_held() {
        let creds = Credentials::new("auditor".to_string(), Some("s3cret".to_string()));
        assert_eq!(creds.username(), "auditor");
        assert_eq!(creds.password(), Some("s3cret"));
    }

    #[test]
    fn test_empty_password_counts_as_none() {
        let creds = Credentials::new("auditor".to_string(), Some(String::new()));
        assert!(!creds.has_password());
        assert_eq!(creds.without_password(), Credentials::new("auditor".to_string(), None));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("sa".to_string(), Some("P@ssw0rd".to_string()));
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("P@ssw0rd"));
        assert!(debug.contains("****"));
        assert!(debug.contains("sa"));
    }

    #[test]
    fn test_credentials_without_password() {
        let mut creds = Credentials::new("sa".to_string(), Some("pw".to_string()));
        let stripped = creds.without_password();
        assert_eq!(stripped.username(), "sa");
        assert!(!stripped.has_password());

        creds.set_password(None);
        assert_eq!(creds, stripped);
    }
}
