use std::collections::BTreeSet;

use indexmap::IndexMap;
use log::warn;
use serde::Serialize;

use crate::parse::security::{SecurityRequirement, SecurityScheme, SecuritySchemeType};

/// How requests to an operation are authenticated.
///
/// Built once at registration time; the dispatch layer matches on it per
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecurityStrategy {
    /// No authentication check.
    Passthrough,
    /// Validate the bearer token against `token_info_url` and require every
    /// scope in `scopes`.
    #[serde(rename = "oauth")]
    OAuth {
        token_info_url: String,
        scopes: BTreeSet<String>,
    },
}

impl SecurityStrategy {
    pub fn is_enforced(&self) -> bool {
        matches!(self, SecurityStrategy::OAuth { .. })
    }

    pub fn token_info_url(&self) -> Option<&str> {
        match self {
            SecurityStrategy::OAuth { token_info_url, .. } => Some(token_info_url),
            SecurityStrategy::Passthrough => None,
        }
    }

    pub fn required_scopes(&self) -> Option<&BTreeSet<String>> {
        match self {
            SecurityStrategy::OAuth { scopes, .. } => Some(scopes),
            SecurityStrategy::Passthrough => None,
        }
    }
}

/// Pick the strategy for `security`.
///
/// Only the first requirement, and only its first scheme, is consulted. The
/// scheme must be an `oauth2` entry of `definitions` with a token info URL,
/// taken from `x-tokenInfoUrl` or else from `default_token_info_url`.
pub fn select_strategy(
    label: &str,
    security: &[SecurityRequirement],
    definitions: &IndexMap<String, SecurityScheme>,
    default_token_info_url: Option<&str>,
) -> SecurityStrategy {
    let Some(requirement) = security.first() else {
        return SecurityStrategy::Passthrough;
    };
    if security.len() > 1 {
        warn!(
            "{label}: {} security requirements declared, only the first is enforced",
            security.len()
        );
    }

    let Some((scheme_name, scopes)) = requirement.first() else {
        return SecurityStrategy::Passthrough;
    };
    if requirement.len() > 1 {
        warn!("{label}: requirement combines several schemes, only '{scheme_name}' is enforced");
    }

    let Some(scheme) = definitions.get(scheme_name) else {
        warn!("{label}: security scheme '{scheme_name}' is not defined, ignoring security");
        return SecurityStrategy::Passthrough;
    };

    if scheme.scheme_type != SecuritySchemeType::OAuth2 {
        warn!(
            "{label}: security scheme type '{}' is not supported, ignoring security",
            scheme.scheme_type.as_str()
        );
        return SecurityStrategy::Passthrough;
    }

    let token_info_url = scheme
        .token_info_url
        .as_deref()
        .or(default_token_info_url)
        .filter(|url| !url.is_empty());

    match token_info_url {
        Some(url) => SecurityStrategy::OAuth {
            token_info_url: url.to_string(),
            scopes: scopes.iter().cloned().collect(),
        },
        None => {
            warn!("{label}: OAuth2 token info URL missing, ignoring security requirements");
            SecurityStrategy::Passthrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_scheme(token_info_url: Option<&str>) -> SecurityScheme {
        SecurityScheme {
            scheme_type: SecuritySchemeType::OAuth2,
            description: None,
            name: None,
            location: None,
            flow: None,
            authorization_url: None,
            token_url: None,
            scopes: IndexMap::new(),
            token_info_url: token_info_url.map(str::to_string),
        }
    }

    fn requirement(scheme: &str, scopes: &[&str]) -> SecurityRequirement {
        let mut req = IndexMap::new();
        req.insert(
            scheme.to_string(),
            scopes.iter().map(|s| s.to_string()).collect(),
        );
        req
    }

    fn definitions(scheme: SecurityScheme) -> IndexMap<String, SecurityScheme> {
        let mut defs = IndexMap::new();
        defs.insert("oauth".to_string(), scheme);
        defs
    }

    #[test]
    fn empty_security_is_passthrough() {
        let defs = definitions(oauth_scheme(Some("https://auth/info")));
        assert_eq!(
            select_strategy("GET /", &[], &defs, None),
            SecurityStrategy::Passthrough
        );
    }

    #[test]
    fn scopes_are_deduplicated() {
        let defs = definitions(oauth_scheme(Some("https://auth/info")));
        let security = vec![requirement("oauth", &["uid", "write", "uid"])];
        let strategy = select_strategy("GET /", &security, &defs, None);
        let scopes = strategy.required_scopes().unwrap();
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains("uid") && scopes.contains("write"));
        assert_eq!(strategy.token_info_url(), Some("https://auth/info"));
    }

    #[test]
    fn empty_token_info_url_is_passthrough() {
        let defs = definitions(oauth_scheme(Some("")));
        let security = vec![requirement("oauth", &["uid"])];
        assert!(!select_strategy("GET /", &security, &defs, None).is_enforced());
    }

    #[test]
    fn default_token_info_url_fills_missing_extension() {
        let defs = definitions(oauth_scheme(None));
        let security = vec![requirement("oauth", &["uid"])];
        let strategy = select_strategy("GET /", &security, &defs, Some("https://fallback/info"));
        assert_eq!(strategy.token_info_url(), Some("https://fallback/info"));
    }

    #[test]
    fn unsupported_scheme_type_is_passthrough() {
        let mut scheme = oauth_scheme(Some("https://auth/info"));
        scheme.scheme_type = SecuritySchemeType::ApiKey;
        let defs = definitions(scheme);
        let security = vec![requirement("oauth", &[])];
        assert_eq!(
            select_strategy("GET /", &security, &defs, None),
            SecurityStrategy::Passthrough
        );
    }

    #[test]
    fn only_first_requirement_is_consulted() {
        let defs = definitions(oauth_scheme(Some("https://auth/info")));
        let security = vec![requirement("missing", &["a"]), requirement("oauth", &["b"])];
        assert_eq!(
            select_strategy("GET /", &security, &defs, None),
            SecurityStrategy::Passthrough
        );
    }

    #[test]
    fn only_first_scheme_of_requirement_is_consulted() {
        let defs = definitions(oauth_scheme(Some("https://auth/info")));

        let mut undefined_first = requirement("missing", &["s"]);
        undefined_first.insert("oauth".to_string(), vec!["uid".to_string()]);
        assert_eq!(
            select_strategy("GET /", &[undefined_first], &defs, None),
            SecurityStrategy::Passthrough
        );

        let mut oauth_first = requirement("oauth", &["uid"]);
        oauth_first.insert("missing".to_string(), Vec::new());
        let strategy = select_strategy("GET /", &[oauth_first], &defs, None);
        assert!(strategy.is_enforced());
        assert_eq!(strategy.token_info_url(), Some("https://auth/info"));
        assert_eq!(strategy.required_scopes().map(|s| s.len()), Some(1));
    }
}
