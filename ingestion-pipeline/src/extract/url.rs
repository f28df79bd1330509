use std::net::IpAddr;

use common::error::AppError;
use dom_smoothie::{Article, Config, Readability, TextMode};
use tracing::{info, warn};

/// Fetch a URL (capped at `max_bytes`) and reduce it to readable article
/// text. Returns the article title when the page has one.
pub async fn extract_url_text(
    raw_url: &str,
    allowlist: &[String],
    max_bytes: usize,
) -> Result<(Option<String>, String), AppError> {
    let parsed = url::Url::parse(raw_url)
        .map_err(|_| AppError::Validation("Invalid URL".to_string()))?;
    ensure_ingestion_url_allowed(&parsed, allowlist)?;

    let response = reqwest::get(parsed.clone()).await?;
    if !response.status().is_success() {
        return Err(AppError::Processing(format!(
            "fetching {raw_url} returned status {}",
            response.status()
        )));
    }

    if let Some(length) = response.content_length() {
        if length > max_bytes as u64 {
            return Err(AppError::Validation(format!(
                "url body is {length} bytes, above the {max_bytes} byte cap"
            )));
        }
    }

    let mut body: Vec<u8> = Vec::new();
    let mut response = response;
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "url body exceeds the {max_bytes} byte cap"
            )));
        }
        body.extend_from_slice(&chunk);
    }

    let html = String::from_utf8_lossy(&body).into_owned();

    let config = Config {
        text_mode: TextMode::Markdown,
        ..Default::default()
    };
    let mut readability = Readability::new(html, Some(raw_url), Some(config))
        .map_err(|e| AppError::Processing(format!("readability setup failed: {e}")))?;
    let article: Article = readability
        .parse()
        .map_err(|e| AppError::Processing(format!("readability parse failed: {e}")))?;

    info!(url = raw_url, chars = article.text_content.len(), "extracted article text");

    let title = if article.title.trim().is_empty() {
        None
    } else {
        Some(article.title.clone())
    };

    Ok((title, article.text_content.to_string()))
}

/// Scheme, host, and network-range checks; with a configured allowlist the
/// host must also match one of its entries (exactly or as a subdomain).
pub fn ensure_ingestion_url_allowed(
    url: &url::Url,
    allowlist: &[String],
) -> Result<(), AppError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(%url, %scheme, "Rejected ingestion URL due to unsupported scheme");
            return Err(AppError::Validation(
                "Unsupported URL scheme for ingestion".to_string(),
            ));
        }
    }

    let Some(host) = url.host_str() else {
        warn!(%url, "Rejected ingestion URL missing host");
        return Err(AppError::Validation(
            "URL is missing a host component".to_string(),
        ));
    };

    if host.eq_ignore_ascii_case("localhost") {
        warn!(%url, host, "Rejected ingestion URL to localhost");
        return Err(AppError::Validation(
            "Ingestion URL host is not allowed".to_string(),
        ));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        let is_disallowed = match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_unique_local() || v6.is_unicast_link_local(),
        };

        if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || is_disallowed {
            warn!(%url, host, %ip, "Rejected ingestion URL pointing to restricted network range");
            return Err(AppError::Validation(
                "Ingestion URL host is not allowed".to_string(),
            ));
        }
    }

    if !allowlist.is_empty() {
        let allowed = allowlist.iter().any(|entry| {
            host.eq_ignore_ascii_case(entry)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", entry.to_ascii_lowercase()))
        });
        if !allowed {
            warn!(%url, host, "Rejected ingestion URL outside the allowlist");
            return Err(AppError::Validation(
                "Ingestion URL host is not allowed".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> url::Url {
        url::Url::parse(raw).expect("url")
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(ensure_ingestion_url_allowed(&parse("ftp://example.com"), &[]).is_err());
    }

    #[test]
    fn rejects_localhost_and_private_ranges() {
        assert!(ensure_ingestion_url_allowed(&parse("http://localhost/x"), &[]).is_err());
        assert!(ensure_ingestion_url_allowed(&parse("http://192.168.1.10/x"), &[]).is_err());
        assert!(ensure_ingestion_url_allowed(&parse("http://127.0.0.1/x"), &[]).is_err());
    }

    #[test]
    fn allows_public_domains_without_an_allowlist() {
        assert!(ensure_ingestion_url_allowed(&parse("https://sub.example.com/p"), &[]).is_ok());
    }

    #[test]
    fn allowlist_matches_exact_hosts_and_subdomains() {
        let allowlist = vec!["example.com".to_string()];
        assert!(
            ensure_ingestion_url_allowed(&parse("https://example.com/p"), &allowlist).is_ok()
        );
        assert!(
            ensure_ingestion_url_allowed(&parse("https://docs.example.com/p"), &allowlist)
                .is_ok()
        );
        assert!(
            ensure_ingestion_url_allowed(&parse("https://example.org/p"), &allowlist).is_err()
        );
    }
}
