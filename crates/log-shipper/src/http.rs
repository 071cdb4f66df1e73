// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;

/// Builds the HTTP client used for ingestion requests.
///
/// TLS is provided by rustls. When `proxy_url` is set, HTTPS traffic is
/// routed through it.
///
/// # Errors
///
/// Returns an error if the proxy URL is malformed or the TLS backend cannot
/// be initialized.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_without_proxy() {
        assert!(build_client(None, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_build_client_with_proxy() {
        assert!(build_client(Some("http://proxy.internal:3128"), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_build_client_rejects_malformed_proxy() {
        assert!(build_client(Some("not a url"), Duration::from_secs(5)).is_err());
    }
}
