//! Tests for [`ServiceConfig`].

use super::*;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

fn fully_configured() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.apply_platform_env(env(&[
        (TWILIO_AUTH_TOKEN_VAR, "twilio-token"),
        (SUPABASE_URL_VAR, "https://project.example.co"),
        (SUPABASE_SERVICE_ROLE_KEY_VAR, "service-key"),
    ]));
    config
}

// ============================================================================
// Defaults
// ============================================================================

mod default_tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.webhook.endpoint_path, "/webhooks/whatsapp");
        assert!(config.webhook.require_signature);
        assert_eq!(config.storage.default_expires_in, 3600);
        assert_eq!(config.storage.max_expires_in, 604_800);
        assert_eq!(config.backend.request_timeout_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: ServiceConfig = serde_json::from_value(serde_json::json!({
            "server": { "port": 9000 },
            "webhook": { "auth_token": "from-file" }
        }))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.webhook.auth_token.expose_secret(), "from-file");
        assert_eq!(config.webhook.endpoint_path, "/webhooks/whatsapp");
    }

    #[test]
    fn test_serialized_config_redacts_secrets() {
        let config = fully_configured();
        let json = serde_json::to_string(&config).unwrap();

        assert!(!json.contains("twilio-token"));
        assert!(!json.contains("service-key"));
    }
}

// ============================================================================
// Platform environment
// ============================================================================

mod platform_env_tests {
    use super::*;

    #[test]
    fn test_platform_variables_fill_unset_fields() {
        let mut config = ServiceConfig::default();
        config.apply_platform_env(env(&[
            (TWILIO_AUTH_TOKEN_VAR, "twilio-token"),
            (SUPABASE_URL_VAR, "https://project.example.co"),
            (SUPABASE_SERVICE_ROLE_KEY_VAR, "service-key"),
            (PUBLIC_WEBHOOK_URL_VAR, "https://hooks.example.co/webhooks/whatsapp"),
        ]));

        assert_eq!(config.webhook.auth_token.expose_secret(), "twilio-token");
        assert_eq!(
            config.backend.url.as_deref(),
            Some("https://project.example.co")
        );
        assert_eq!(config.backend.service_role_key.expose_secret(), "service-key");
        assert_eq!(
            config.webhook.public_url.as_deref(),
            Some("https://hooks.example.co/webhooks/whatsapp")
        );
        assert!(config.backend.is_configured());
    }

    #[test]
    fn test_explicit_values_win_over_platform_variables() {
        let mut config = ServiceConfig::default();
        config.webhook.auth_token = SecretString::new("explicit");
        config.apply_platform_env(env(&[(TWILIO_AUTH_TOKEN_VAR, "platform")]));

        assert_eq!(config.webhook.auth_token.expose_secret(), "explicit");
    }

    #[test]
    fn test_blank_platform_variables_ignored() {
        let mut config = ServiceConfig::default();
        config.apply_platform_env(env(&[(TWILIO_AUTH_TOKEN_VAR, "  "), (SUPABASE_URL_VAR, "")]));

        assert!(config.webhook.auth_token.is_empty());
        assert!(config.backend.url.is_none());
    }
}

// ============================================================================
// Required secrets
// ============================================================================

mod required_secret_tests {
    use super::*;

    #[test]
    fn test_all_present_when_fully_configured() {
        let secrets = fully_configured().required_secrets();

        assert_eq!(secrets.len(), 3);
        assert!(secrets.iter().all(|s| s.present));
    }

    #[test]
    fn test_missing_secret_reported_by_name() {
        let mut config = fully_configured();
        config.backend.service_role_key = SecretString::default();

        let missing: Vec<&str> = config
            .required_secrets()
            .into_iter()
            .filter(|s| !s.present)
            .map(|s| s.name)
            .collect();

        assert_eq!(missing, vec![SUPABASE_SERVICE_ROLE_KEY_VAR]);
        assert!(!config.backend.is_configured());
    }
}

// ============================================================================
// Validation
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_zero_port_rejected() {
        let mut config = ServiceConfig::default();
        config.server.port = 0;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_relative_public_url_rejected() {
        let mut config = ServiceConfig::default();
        config.webhook.public_url = Some("/webhooks/whatsapp".to_string());

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolute_public_url_accepted() {
        let mut config = ServiceConfig::default();
        config.webhook.public_url = Some("https://hooks.example.co/webhooks/whatsapp".to_string());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_path_must_be_absolute() {
        let mut config = ServiceConfig::default();
        config.webhook.endpoint_path = "webhooks/whatsapp".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_expiry_outside_limits_rejected() {
        let mut config = ServiceConfig::default();
        config.storage.default_expires_in = 0;
        assert!(config.validate().is_err());

        config.storage.default_expires_in = config.storage.max_expires_in + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_backend_timeout_rejected() {
        let mut config = ServiceConfig::default();
        config.backend.request_timeout_seconds = 0;

        assert!(config.validate().is_err());
    }
}
