// Input validation utilities
//
// Connection fields are not validated here; the server's connection test judges them.
// Only the folder path (step 1) and the configured server URL are checked here.

use anyhow::Result;
use url::Url;

/// Trimmed folder path, or `None` when nothing but whitespace was entered.
pub fn trimmed_folder_path(raw: &str) -> Option<&str> {
    let p = raw.trim();
    if p.is_empty() {
        None
    } else {
        Some(p)
    }
}

/// Validate the server base URL (http/https with a host).
pub fn validate_base_url(raw: &str) -> Result<Url> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(anyhow::anyhow!("Server base URL cannot be empty"));
    }

    let url = Url::parse(s).map_err(|e| anyhow::anyhow!("Server base URL is invalid: {}", e))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow::anyhow!(
            "Server base URL must use http or https (got '{}')",
            url.scheme()
        ));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(anyhow::anyhow!("Server base URL must include a host"));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_path_is_trimmed() {
        assert_eq!(trimmed_folder_path("  /srv/setup \t"), Some("/srv/setup"));
        assert_eq!(
            trimmed_folder_path(r"C:\Users\me\setup"),
            Some(r"C:\Users\me\setup")
        );
    }

    #[test]
    fn blank_folder_path_is_rejected() {
        assert_eq!(trimmed_folder_path(""), None);
        assert_eq!(trimmed_folder_path("   \n"), None);
    }

    #[test]
    fn base_url_accepts_http_and_https() {
        assert!(validate_base_url("http://127.0.0.1:8888").is_ok());
        assert!(validate_base_url(" https://admin.example.com/tool ").is_ok());
    }

    #[test]
    fn base_url_rejects_bad_input() {
        for bad in ["", "   ", "not a url", "ftp://example.com", "file:///tmp/x"] {
            assert!(
                validate_base_url(bad).is_err(),
                "'{}' should be rejected",
                bad
            );
        }
    }
}
