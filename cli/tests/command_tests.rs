// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command handlers driven end to end against mock HTTP servers.

use mockito::Matcher;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

use spark_cli::commands::{self, ChatArgs, DashboardCommand, ExecutionsCommand, WalletCommand};
use spark_core::domain::config::ConfigError;

fn write_config(yaml: &str) -> (tempfile::NamedTempFile, PathBuf) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    let path = file.path().to_path_buf();
    (file, path)
}

#[tokio::test]
async fn test_chat_one_shot_polls_until_completed() {
    let mut server = mockito::Server::new_async().await;
    let start = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "message": "Find best USDC yield",
            "wallet_address": "0xabc",
        })))
        .with_status(200)
        .with_body(json!({"execution_id": "exec-9", "status": "started"}).to_string())
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/api/executions/exec-9")
        .with_status(200)
        .with_body(
            json!({
                "execution_id": "exec-9",
                "status": "completed",
                "reasoning_chain": ["Scanning pools"],
                "final_proposal": {"protocol": "aave"}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let (_file, path) = write_config(&format!(
        "backend:\n  url: {}\n  poll_interval: 10ms\n",
        server.url()
    ));

    commands::chat::handle_command(
        ChatArgs {
            message: Some("Find best USDC yield".to_string()),
            wallet_address: Some("0xabc".to_string()),
            user_id: None,
            json: true,
        },
        Some(path),
    )
    .await
    .unwrap();

    start.assert_async().await;
    poll.assert_async().await;
}

#[tokio::test]
async fn test_dashboard_requires_data_service() {
    let (_file, path) = write_config("backend:\n  url: http://localhost:8000\n");

    let err = commands::dashboard::handle_command(
        DashboardCommand::Balances {
            portfolio_id: "p1".to_string(),
            json: true,
        },
        Some(path),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::MissingDataService)
    );
}

#[tokio::test]
async fn test_dashboard_balances_reads_data_service() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/v1/balances")
        .match_header("apikey", "anon-key")
        .match_query(Matcher::UrlEncoded("portfolio_id".into(), "eq.p1".into()))
        .with_status(200)
        .with_body(
            json!([{"portfolio_id": "p1", "asset": "USDC", "amount": 100.0, "location": "aave"}])
                .to_string(),
        )
        .create_async()
        .await;

    let (_file, path) = write_config(&format!(
        "data_service:\n  url: {}\n  anon_key: anon-key\n",
        server.url()
    ));

    commands::dashboard::handle_command(
        DashboardCommand::Balances {
            portfolio_id: "p1".to_string(),
            json: false,
        },
        Some(path),
    )
    .await
    .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_dashboard_surfaces_service_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/rest/v1/agent_executions")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(json!({"message": "Invalid API key"}).to_string())
        .create_async()
        .await;

    let (_file, path) = write_config(&format!(
        "data_service:\n  url: {}\n  anon_key: wrong\n",
        server.url()
    ));

    let err = commands::dashboard::handle_command(
        DashboardCommand::Executions {
            portfolio_id: "p1".to_string(),
            limit: Some(5),
            json: true,
        },
        Some(path),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("Invalid API key"));
}

#[tokio::test]
async fn test_executions_health() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(json!({"status": "healthy"}).to_string())
        .create_async()
        .await;

    let (_file, path) = write_config(&format!("backend:\n  url: {}\n", server.url()));
    commands::executions::handle_command(ExecutionsCommand::Health, Some(path))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_wallet_status_without_provider_is_not_an_error() {
    let (_file, path) = write_config("backend:\n  url: http://localhost:8000\n");
    commands::wallet::handle_command(WalletCommand::Status, Some(path))
        .await
        .unwrap();
}
