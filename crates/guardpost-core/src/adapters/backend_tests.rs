//! Tests for the hosted backend client.

use super::*;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

const SERVICE_KEY: &str = "service-role-key";

fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::new(BackendConfig::new(
        server.uri(),
        SecretString::new(SERVICE_KEY),
    ))
    .expect("Failed to create backend client")
}

// ============================================================================
// Construction
// ============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn test_relative_url_rejected() {
        let result = BackendClient::new(BackendConfig::new("not a url", SecretString::new("k")));
        assert!(matches!(result, Err(ValidationError::InvalidFormat { .. })));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let result = BackendClient::new(BackendConfig::new(
            "mailto:ops@example.com",
            SecretString::new("k"),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_output_hides_service_key() {
        let client = BackendClient::new(BackendConfig::new(
            "https://project.example.co",
            SecretString::new("super-secret-key"),
        ))
        .unwrap();

        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret-key"));
    }

    #[test]
    fn test_relative_signed_url_resolved_against_storage_root() {
        let client = BackendClient::new(BackendConfig::new(
            "https://project.example.co/",
            SecretString::new("k"),
        ))
        .unwrap();

        assert_eq!(
            client.absolute_storage_url("/object/sign/docs/user-a/x.png?token=abc"),
            "https://project.example.co/storage/v1/object/sign/docs/user-a/x.png?token=abc"
        );
        assert_eq!(
            client.absolute_storage_url("https://cdn.example.co/x?token=abc"),
            "https://cdn.example.co/x?token=abc"
        );
    }

    #[test]
    fn test_error_message_prefers_json_message_field() {
        let body = r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#;
        assert_eq!(error_message(body), "Object not found");
        assert_eq!(error_message("plain failure"), "plain failure");

        let long = "x".repeat(500);
        assert!(error_message(&long).len() <= MAX_ERROR_MESSAGE_LEN + 3);
    }
}

// ============================================================================
// Guard registry
// ============================================================================

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_guards_sends_filter_order_and_limit() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/guards"))
            .and(query_param("select", "*"))
            .and(query_param("is_active", "eq.true"))
            .and(query_param("order", "rating.desc.nullslast"))
            .and(query_param("limit", "20"))
            .and(header("apikey", SERVICE_KEY))
            .and(header("authorization", "Bearer service-role-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "g-1",
                    "full_name": "Ada Guard",
                    "armed": true,
                    "rating": 4.8,
                    "certifications": ["first-aid"],
                    "is_active": true,
                    "last_active_at": "2024-05-01T10:00:00Z"
                },
                { "id": "g-2", "rating": null, "is_active": true }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .list_guards(&CandidateQuery::default())
            .await
            .expect("registry call should succeed");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name.as_deref(), Some("Ada Guard"));
        assert_eq!(records[0].rating, Some(4.8));
        assert_eq!(records[1].rating, None);
    }

    #[tokio::test]
    async fn test_list_guards_status_error_carries_message() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/guards"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({ "message": "database unavailable" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_guards(&CandidateQuery::default())
            .await
            .unwrap_err();

        match &err {
            UpstreamError::Status { status, message, .. } => {
                assert_eq!(*status, 503);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("Expected status error, got {:?}", other),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_list_guards_malformed_body_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/guards"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_guards(&CandidateQuery::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Decode { .. }));
    }
}

// ============================================================================
// Identity resolution
// ============================================================================

mod identity_tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_returns_user_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", SERVICE_KEY))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "user-a", "email": "a@example.com" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let identity = client_for(&server).resolve("user-token").await.unwrap();

        assert_eq!(identity, Some(IdentityId::new("user-a").unwrap()));
    }

    #[tokio::test]
    async fn test_rejected_token_resolves_to_none() {
        for status in [401u16, 403] {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path("/auth/v1/user"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let identity = client_for(&server).resolve("expired").await.unwrap();
            assert_eq!(identity, None, "status {} should mean no identity", status);
        }
    }

    #[tokio::test]
    async fn test_provider_outage_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).resolve("user-token").await;

        assert!(matches!(
            result,
            Err(UpstreamError::Status { status: 500, .. })
        ));
    }
}

// ============================================================================
// Storage signing
// ============================================================================

mod signing_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_signed_url_returns_absolute_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/guard-documents/user-a/id.png"))
            .and(header("apikey", SERVICE_KEY))
            .and(body_json(serde_json::json!({ "expiresIn": 3600 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signedURL": "/object/sign/guard-documents/user-a/id.png?token=abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = client_for(&server)
            .create_signed_url("guard-documents", "user-a/id.png", 3600)
            .await
            .unwrap();

        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/sign/guard-documents/user-a/id.png?token=abc",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_path_segments_are_percent_encoded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/docs/user-a/id%20card.png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signedURL": "/object/sign/docs/user-a/id%20card.png?token=abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .create_signed_url("docs", "user-a/id card.png", 60)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_object_surfaces_storage_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/docs/user-a/missing.png"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "statusCode": "404",
                "error": "not_found",
                "message": "Object not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_signed_url("docs", "user-a/missing.png", 60)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Object not found"));
        assert!(!err.is_transient());
    }
}
