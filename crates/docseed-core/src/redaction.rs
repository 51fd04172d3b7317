use serde::{Deserialize, Serialize};

/// Store URI metadata with secrets masked, safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedUri {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub hosts: Vec<String>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Mask the password of a store URI and extract what is safe to show.
///
/// Handles the multi-host authority of `mongodb://a:1,b:2/db` as well as the
/// single-segment `memory://name` form.
pub fn redact_uri(uri: &str) -> RedactedUri {
    let Some(scheme_end) = uri.find("://") else {
        return RedactedUri {
            scheme: None,
            user: None,
            hosts: Vec::new(),
            database: None,
            redacted: redact_query_params(uri),
        };
    };

    let scheme = uri[..scheme_end].to_string();
    let rest = &uri[scheme_end + 3..];
    let (location, query) = match rest.find('?') {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };
    let (authority, path) = match location.find('/') {
        Some(idx) => (&location[..idx], &location[idx + 1..]),
        None => (location, ""),
    };
    let (credentials, host_list) = match authority.rfind('@') {
        Some(idx) => (Some(&authority[..idx]), &authority[idx + 1..]),
        None => (None, authority),
    };

    let mut user = None;
    let mut masked_credentials = None;
    if let Some(credentials) = credentials {
        match credentials.split_once(':') {
            Some((name, _)) => {
                user = Some(name.to_string());
                masked_credentials = Some(format!("{name}:***"));
            }
            None => {
                user = Some(credentials.to_string());
                masked_credentials = Some(credentials.to_string());
            }
        }
    }

    let hosts = host_list
        .split(',')
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect();
    let database = Some(path)
        .filter(|path| !path.is_empty())
        .map(str::to_string);

    let mut redacted = format!("{scheme}://");
    if let Some(credentials) = masked_credentials {
        redacted.push_str(&credentials);
        redacted.push('@');
    }
    redacted.push_str(host_list);
    if location.len() > authority.len() {
        redacted.push('/');
        redacted.push_str(path);
    }
    if let Some(query) = query {
        redacted.push('?');
        redacted.push_str(&redact_query_params(query));
    }

    RedactedUri {
        scheme: Some(scheme),
        user,
        hosts,
        database,
        redacted,
    }
}

fn redact_query_params(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "pass" | "token" | "secret" | "tlscertificatekeyfilepassword"
    )
}
