//! `test-utils` is used for testing in both `scrapegate-lib` and `scrapegate`.
//! This crate does not depend on `scrapegate-lib` or `scrapegate`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Set up a mock server which has two routes: `/ok` and `/redirect`.
/// Calling `/redirect` returns a `301 Moved Permanently` with a HTTP Location
/// header pointing to `/ok`. The redirect must be requested exactly once and
/// must not be followed.
#[macro_export]
macro_rules! redirecting_mock_server {
    ($f:expr) => {{
        async {
            let mock_server = wiremock::MockServer::start().await;
            let ok_url = format!("{}/ok", mock_server.uri());
            let redirect_url = format!("{}/redirect", mock_server.uri());

            // Set up redirect
            let redirect = wiremock::ResponseTemplate::new(http::StatusCode::MOVED_PERMANENTLY)
                .insert_header("Location", ok_url.as_str());
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/redirect"))
                .respond_with(redirect)
                .expect(1)
                .mount(&mock_server)
                .await;

            let ok = wiremock::ResponseTemplate::new(http::StatusCode::OK);
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/ok"))
                .respond_with(ok)
                .expect(0) // the redirect must not be followed
                .mount(&mock_server)
                .await;

            $f(redirect_url, ok_url).await;
        }
    }};
}

/// Gets the "main" binary name (e.g. `scrapegate`)
#[macro_export]
macro_rules! main_command {
    () => {
        Command::cargo_bin(env!("CARGO_PKG_NAME")).expect("Couldn't get cargo package name")
    };
}

/// Write a config file with the given content into a fresh temporary
/// directory, returning the directory guard and the file path
#[macro_export]
macro_rules! config_file {
    ($content:expr) => {{
        let dir = tempfile::tempdir().expect("Couldn't create temporary directory");
        let path = dir.path().join("scrapegate.toml");
        std::fs::write(&path, $content).expect("Couldn't write config file");
        (dir, path)
    }};
}
