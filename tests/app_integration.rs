use std::fs;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const MARKETS_BODY: &str = r#"[
        {
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 64123.5,
            "market_cap": 1260000000000,
            "total_volume": 35000000000,
            "price_change_percentage_24h": 2.41
        },
        {
            "id": "ethereum",
            "symbol": "eth",
            "name": "Ethereum",
            "current_price": 3412.25,
            "market_cap": 410000000000,
            "total_volume": 18000000000,
            "price_change_percentage_24h": -1.12
        },
        {
            "id": "solana",
            "symbol": "sol",
            "name": "Solana",
            "current_price": 148.9,
            "market_cap": 69000000000,
            "total_volume": 2500000000,
            "price_change_percentage_24h": 0.0
        }
    ]"#;

    pub const GLOBAL_BODY: &str = r#"{
        "data": {
            "total_market_cap": { "usd": 2450000000000.0 },
            "total_volume": { "usd": 89000000000.0 },
            "market_cap_percentage": { "btc": 59.8, "eth": 12.4 }
        }
    }"#;

    pub async fn create_market_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/coins/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MARKETS_BODY))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GLOBAL_BODY))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_failing_market_server() -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/coins/markets"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GLOBAL_BODY))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_auth_mock_server(status: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        let response = if status == 200 {
            ResponseTemplate::new(200).set_body_string(r#"{ "access_token": "tok-e2e" }"#)
        } else {
            ResponseTemplate::new(status)
        };
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub fn config_content(market_uri: &str, auth_uri: &str, data_dir: &Path) -> String {
        format!(
            r#"
            top_limit: 3
            providers:
              coingecko:
                base_url: {}
              auth:
                base_url: {}
            refresh:
              interval_secs: 60
              retry_limit: 1
              retry_delay_ms: 10
              rate_limit_penalty_secs: 1
            data_path: "{}"
        "#,
            market_uri,
            auth_uri,
            data_dir.display()
        )
    }
}

fn login_command() -> cryptodash::AppCommand {
    cryptodash::AppCommand::Login {
        email: Some("admin@cryptoanalyzer.com".to_string()),
        password: Some("admin123".to_string()),
    }
}

fn dashboard_once() -> cryptodash::AppCommand {
    cryptodash::AppCommand::Dashboard { once: true }
}

#[test_log::test(tokio::test)]
async fn test_login_then_dashboard_with_mocks() {
    let market_server = test_utils::create_market_mock_server().await;
    let auth_server = test_utils::create_auth_mock_server(200).await;
    let data_dir = tempfile::TempDir::new().expect("Failed to create data dir");

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_content(&market_server.uri(), &auth_server.uri(), data_dir.path()),
    )
    .expect("Failed to write config file");

    info!("Signing in against the mock auth endpoint");
    let result = cryptodash::run_command(login_command(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_ok(), "Login failed with: {:?}", result.err());

    // A separate command invocation picks the session up from disk.
    info!("Rendering one dashboard frame");
    let result =
        cryptodash::run_command(dashboard_once(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_ok(), "Dashboard failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_dashboard_requires_a_session() {
    let market_server = test_utils::create_market_mock_server().await;
    let auth_server = test_utils::create_auth_mock_server(200).await;
    let data_dir = tempfile::TempDir::new().expect("Failed to create data dir");

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_content(&market_server.uri(), &auth_server.uri(), data_dir.path()),
    )
    .expect("Failed to write config file");

    let result =
        cryptodash::run_command(dashboard_once(), Some(config_path.to_str().unwrap())).await;

    let err = result.expect_err("Dashboard should refuse to run without a session");
    assert!(err.to_string().contains("Not signed in"));
}

#[test_log::test(tokio::test)]
async fn test_rejected_login_leaves_no_session() {
    let market_server = test_utils::create_market_mock_server().await;
    let auth_server = test_utils::create_auth_mock_server(401).await;
    let data_dir = tempfile::TempDir::new().expect("Failed to create data dir");

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_content(&market_server.uri(), &auth_server.uri(), data_dir.path()),
    )
    .expect("Failed to write config file");

    let result = cryptodash::run_command(login_command(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_err(), "Rejected credentials should fail the login");

    let result =
        cryptodash::run_command(dashboard_once(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_err(), "No session should have been stored");
}

#[test_log::test(tokio::test)]
async fn test_malformed_email_fails_before_the_network() {
    let market_server = test_utils::create_market_mock_server().await;
    let auth_server = test_utils::create_auth_mock_server(200).await;
    let data_dir = tempfile::TempDir::new().expect("Failed to create data dir");

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_content(&market_server.uri(), &auth_server.uri(), data_dir.path()),
    )
    .expect("Failed to write config file");

    let command = cryptodash::AppCommand::Login {
        email: Some("not-an-email".to_string()),
        password: Some("admin123".to_string()),
    };
    let result = cryptodash::run_command(command, Some(config_path.to_str().unwrap())).await;

    assert!(result.is_err());
    assert!(
        auth_server.received_requests().await.unwrap().is_empty(),
        "Malformed credentials must not reach the auth endpoint"
    );
}

#[test_log::test(tokio::test)]
async fn test_logout_drops_the_persisted_session() {
    let market_server = test_utils::create_market_mock_server().await;
    let auth_server = test_utils::create_auth_mock_server(200).await;
    let data_dir = tempfile::TempDir::new().expect("Failed to create data dir");

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_content(&market_server.uri(), &auth_server.uri(), data_dir.path()),
    )
    .expect("Failed to write config file");

    let result = cryptodash::run_command(login_command(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_ok(), "Login failed with: {:?}", result.err());

    let result = cryptodash::run_command(
        cryptodash::AppCommand::Logout,
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Logout failed with: {:?}", result.err());

    let result =
        cryptodash::run_command(dashboard_once(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_err(), "The session should be gone after logout");
}

#[test_log::test(tokio::test)]
async fn test_dashboard_fails_when_the_market_is_down() {
    let market_server = test_utils::create_failing_market_server().await;
    let auth_server = test_utils::create_auth_mock_server(200).await;
    let data_dir = tempfile::TempDir::new().expect("Failed to create data dir");

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_content(&market_server.uri(), &auth_server.uri(), data_dir.path()),
    )
    .expect("Failed to write config file");

    let result = cryptodash::run_command(login_command(), Some(config_path.to_str().unwrap())).await;
    assert!(result.is_ok(), "Login failed with: {:?}", result.err());

    let result =
        cryptodash::run_command(dashboard_once(), Some(config_path.to_str().unwrap())).await;

    let err = result.expect_err("Dashboard should report the failed fetch");
    assert!(err.to_string().contains("Could not fetch market data"));
}
