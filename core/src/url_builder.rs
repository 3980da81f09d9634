//! Request URL assembly.
//!
//! Every URL carries `zpw_ver` and `zpw_type` from the session. GET calls
//! put the ciphertext first as `params`; POST calls leave it for the body.
//! Query order is fixed: `params`, `zpw_ver`, `zpw_type`, then extras in the
//! order given.

use url::form_urlencoded;

use crate::session::SessionContext;

/// Retry-count flag most POST endpoints send, always zero.
pub const NRETRY: (&str, &str) = ("nretry", "0");

/// Build a URL carrying the protocol markers and `extra_query`.
pub fn build(base_url: &str, path: &str, extra_query: &[(&str, &str)], session: &SessionContext) -> String {
    assemble(base_url, path, None, extra_query, session)
}

/// Build a GET URL with the percent-encoded ciphertext as `params`.
pub fn build_with_params(
    base_url: &str,
    path: &str,
    ciphertext: &str,
    extra_query: &[(&str, &str)],
    session: &SessionContext,
) -> String {
    assemble(base_url, path, Some(ciphertext), extra_query, session)
}

fn assemble(
    base_url: &str,
    path: &str,
    ciphertext: Option<&str>,
    extra_query: &[(&str, &str)],
    session: &SessionContext,
) -> String {
    let mut url = join(base_url, path);

    let version = session.protocol_version().to_string();
    let kind = session.protocol_type().to_string();

    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(ciphertext) = ciphertext {
        query.append_pair("params", ciphertext);
    }
    query.append_pair("zpw_ver", &version);
    query.append_pair("zpw_type", &kind);
    for (name, value) in extra_query {
        query.append_pair(name, value);
    }

    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&query.finish());
    url
}

fn join(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
