//! Fetches connect to the target directly, whatever proxy the environment
//! names. Kept in its own test binary because it changes the environment.

use http::StatusCode;
use pretty_assertions::assert_eq;
use scrapegate_lib::{Fetcher, ReqwestFetcher};
use test_utils::mock_server;

#[tokio::test]
async fn test_environment_proxy_is_ignored() {
    // Nothing listens on the discard port, so a proxied fetch would fail
    for var in [
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        // SAFETY: the only test in this binary, run before anything reads the environment
        unsafe { std::env::set_var(var, "http://127.0.0.1:9") };
    }
    for var in ["NO_PROXY", "no_proxy"] {
        // SAFETY: as above
        unsafe { std::env::remove_var(var) };
    }

    let target = mock_server!(StatusCode::OK);
    let fetcher = ReqwestFetcher::new().unwrap();

    let status = fetcher.fetch(&target.uri()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}
