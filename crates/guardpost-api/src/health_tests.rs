//! Tests for [`ConfigHealthChecker`].

use super::*;
use crate::config::{SUPABASE_URL_VAR, TWILIO_AUTH_TOKEN_VAR};
use guardpost_core::SecretString;

fn configured() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhook.auth_token = SecretString::new("token");
    config.backend.url = Some("https://project.example.co".to_string());
    config.backend.service_role_key = SecretString::new("key");
    config
}

#[tokio::test]
async fn test_ok_when_everything_present() {
    let report = ConfigHealthChecker::new(&configured()).check().await;

    assert!(report.ok);
    assert_eq!(report.requires.len(), 3);
}

#[tokio::test]
async fn test_ok_flips_when_one_secret_removed() {
    let mut config = configured();
    config.webhook.auth_token = SecretString::default();

    let report = ConfigHealthChecker::new(&config).check().await;

    assert!(!report.ok);
    let twilio = report
        .requires
        .iter()
        .find(|r| r.name == TWILIO_AUTH_TOKEN_VAR)
        .unwrap();
    assert!(!twilio.present);
}

#[tokio::test]
async fn test_empty_config_reports_everything_missing() {
    let report = ConfigHealthChecker::new(&ServiceConfig::default())
        .check()
        .await;

    assert!(!report.ok);
    assert!(report.requires.iter().all(|r| !r.present));
}

#[test]
fn test_report_serializes_names_not_values() {
    let report = HealthReport::from_requirements(configured().required_secrets());
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["ok"], true);
    assert_eq!(json["requires"][1]["name"], SUPABASE_URL_VAR);
    assert_eq!(json["requires"][1]["present"], true);
    assert!(!json.to_string().contains("project.example.co"));
}
