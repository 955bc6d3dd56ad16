//! LDAP credential verification.
//!
//! Two modes are supported: a direct bind through `user_dn_template`, or a
//! search for the user entry (optionally as a service account) followed by a
//! bind as that entry. Every failure maps to [`AuthError::Directory`].

use std::time::Duration;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, warn};

use crate::config::LdapConfig;

use super::auth_service::{AuthError, CredentialVerifier, VerifiedIdentity};

pub struct LdapVerifier {
    config: LdapConfig,
}

impl LdapVerifier {
    #[must_use]
    pub const fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap, AuthError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.connect_timeout_seconds))
            .set_starttls(self.config.starttls);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(|e| directory_error("connect", &e))?;
        ldap3::drive!(conn);

        Ok(ldap)
    }

    async fn bind_as_template(
        &self,
        ldap: &mut Ldap,
        template: &str,
        username: &str,
        password: &str,
    ) -> Result<SearchEntry, AuthError> {
        let dn = user_dn_from_template(template, username);

        ldap.simple_bind(&dn, password)
            .await
            .and_then(ldap3::LdapResult::success)
            .map_err(|e| directory_error("user bind", &e))?;

        let (entries, _) = ldap
            .search(
                &dn,
                Scope::Base,
                "(objectClass=*)",
                vec![self.config.display_name_attr.as_str()],
            )
            .await
            .and_then(ldap3::SearchResult::success)
            .map_err(|e| directory_error("read own entry", &e))?;

        entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| AuthError::Directory(format!("entry {dn} not readable")))
    }

    async fn search_then_bind(
        &self,
        ldap: &mut Ldap,
        username: &str,
        password: &str,
    ) -> Result<SearchEntry, AuthError> {
        if let Some(bind_dn) = &self.config.bind_dn {
            let bind_password = self.config.bind_password.as_deref().unwrap_or_default();
            ldap.simple_bind(bind_dn, bind_password)
                .await
                .and_then(ldap3::LdapResult::success)
                .map_err(|e| directory_error("service bind", &e))?;
        }

        let filter = user_search_filter(&self.config, username);
        debug!(filter = %filter, base = %self.config.search_base(), "Searching LDAP for user");

        let (entries, _) = ldap
            .search(
                self.config.search_base(),
                Scope::Subtree,
                &filter,
                vec![self.config.display_name_attr.as_str()],
            )
            .await
            .and_then(ldap3::SearchResult::success)
            .map_err(|e| directory_error("user search", &e))?;

        if entries.len() != 1 {
            return Err(AuthError::Directory(format!(
                "expected one entry for {username}, found {}",
                entries.len()
            )));
        }

        let entry = entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| AuthError::Directory("empty search result".to_string()))?;

        ldap.simple_bind(&entry.dn, password)
            .await
            .and_then(ldap3::LdapResult::success)
            .map_err(|e| directory_error("user bind", &e))?;

        Ok(entry)
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for LdapVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<VerifiedIdentity, AuthError> {
        // An empty simple bind is an anonymous bind and would succeed.
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Directory("empty username or password".to_string()));
        }

        let mut ldap = self.connect().await?;

        let result = match &self.config.user_dn_template {
            Some(template) => {
                self.bind_as_template(&mut ldap, template, username, password)
                    .await
            }
            None => self.search_then_bind(&mut ldap, username, password).await,
        };

        if let Err(e) = ldap.unbind().await {
            debug!("LDAP unbind failed: {e}");
        }

        let entry = result?;
        let display_name = entry
            .attrs
            .get(&self.config.display_name_attr)
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_else(|| username.to_string());

        Ok(VerifiedIdentity {
            username: username.to_string(),
            display_name,
        })
    }
}

fn directory_error(stage: &str, err: &ldap3::LdapError) -> AuthError {
    warn!(stage, "LDAP authentication failed: {err}");
    AuthError::Directory(format!("{stage}: {err}"))
}

fn user_dn_from_template(template: &str, username: &str) -> String {
    template.replace("{username}", &ldap3::dn_escape(username))
}

fn user_search_filter(config: &LdapConfig, username: &str) -> String {
    format!(
        "(&{}({}={}))",
        config.user_object_filter,
        config.user_login_attr,
        ldap3::ldap_escape(username)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filter_escapes_username() {
        let config = LdapConfig::default();
        assert_eq!(
            user_search_filter(&config, "jdoe"),
            "(&(objectClass=person)(uid=jdoe))"
        );
        assert_eq!(
            user_search_filter(&config, "*)(uid=*"),
            "(&(objectClass=person)(uid=\\2a\\29\\28uid=\\2a))"
        );
    }

    #[test]
    fn template_escapes_dn_specials() {
        let template = "uid={username},ou=people,dc=example,dc=org";
        assert_eq!(
            user_dn_from_template(template, "jdoe"),
            "uid=jdoe,ou=people,dc=example,dc=org"
        );

        let injected = user_dn_from_template(template, "doe,ou=admins");
        assert!(!injected.starts_with("uid=doe,ou=admins,"));
        assert!(injected.ends_with(",ou=people,dc=example,dc=org"));
    }

    #[tokio::test]
    async fn empty_password_never_reaches_the_server() {
        let verifier = LdapVerifier::new(LdapConfig {
            url: "ldap://127.0.0.1:1".to_string(),
            ..LdapConfig::default()
        });

        let err = verifier.verify("jdoe", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Directory(_)));
        assert_eq!(err.to_string(), "Error authenticating with LDAP server");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_auth_failure() {
        let verifier = LdapVerifier::new(LdapConfig {
            url: "ldap://127.0.0.1:1".to_string(),
            connect_timeout_seconds: 1,
            ..LdapConfig::default()
        });

        let err = verifier.verify("jdoe", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Directory(_)));
    }
}
