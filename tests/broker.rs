use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use s3bridge::broker::db::config::DbConfig;
use s3bridge::broker::db::factory::DbFactory;
use s3bridge::broker::db::Database;
use s3bridge::broker::engine::{AccessRequest, AuthorizationEngine};
use s3bridge::broker::error::BrokerError;
use s3bridge::broker::identity::VerifiedIdentity;
use s3bridge::broker::issuer::local::LocalIssuer;
use s3bridge::broker::issuer::Lifetime;
use s3bridge::broker::pattern::matches;
use s3bridge::broker::policy::build_policy;
use s3bridge::broker::provision::local::LocalProvisioner;
use s3bridge::broker::registry::{AdminService, ServiceRegistry};
use s3bridge::config::CommonConfig;
use s3bridge::types::service::{NewService, PermissionTier, ServicePatch, ServiceStatus};

const ADMIN: &str = "universal";

fn users(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn open_registry(db: Arc<Database>) -> Arc<ServiceRegistry> {
    let provisioner = Arc::new(LocalProvisioner::new(
        db.clone(),
        "123456789012",
        "service-role",
    ));
    let admin = AdminService {
        name: String::from(ADMIN),
        users: users(&["admin"]),
    };
    let registry = ServiceRegistry::open(db, provisioner, admin, Duration::from_secs(5))
        .await
        .unwrap();
    Arc::new(registry)
}

fn engine(registry: Arc<ServiceRegistry>) -> AuthorizationEngine {
    let lifetime = Lifetime {
        default_secs: 3600,
        max_secs: 3600,
    };
    AuthorizationEngine::new(
        registry,
        Arc::new(LocalIssuer::new()),
        lifetime,
        Duration::from_secs(5),
        "",
    )
}

fn new_service(
    name: &str,
    patterns: &[&str],
    permission: PermissionTier,
    restricted: &[&str],
) -> NewService {
    NewService {
        name: name.to_string(),
        bucket_patterns: patterns.iter().map(|s| s.to_string()).collect(),
        permission,
        restricted_users: users(restricted),
    }
}

fn request(user: &str, service: &str, resource: Option<&str>) -> AccessRequest {
    AccessRequest {
        caller: VerifiedIdentity::new(user),
        service: service.to_string(),
        resource: resource.map(String::from),
        prefix: None,
        duration_secs: None,
    }
}

#[test]
fn test_matcher_properties() {
    for (pattern, resource) in [
        ("analytics-reports", "analytics-reports"),
        ("a.b-c", "a.b-c"),
    ] {
        assert!(matches(pattern, resource));
        assert!(!matches(pattern, &format!("{resource}x")));
        assert!(!matches(pattern, &format!("x{resource}")));
    }
    for resource in ["", "a", "analytics-reports", "*"] {
        assert!(matches("*", resource));
    }
    assert!(!matches("", "anything"));
    assert!(matches("data-**-logs", "data-2024-logs"));
    assert!(!matches("Analytics-*", "analytics-reports"));
}

#[tokio::test]
async fn test_analytics_scenario() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;
    registry
        .create(
            new_service(
                "analytics",
                &["analytics-*"],
                PermissionTier::ReadOnly,
                &["alice", "bob"],
            ),
            false,
        )
        .await
        .unwrap();
    let engine = engine(registry);

    let grant = engine
        .authorize(&request("alice", "analytics", Some("analytics-reports")))
        .await
        .unwrap();
    assert_eq!(grant.policy.actions(), vec!["s3:GetObject", "s3:ListBucket"]);
    assert_eq!(
        grant.policy.resources(),
        vec!["arn:aws:s3:::analytics-*", "arn:aws:s3:::analytics-*/*"]
    );
    assert!(grant.credentials.access_key_id.starts_with("ASIA"));

    let err = engine
        .authorize(&request("carol", "analytics", Some("analytics-reports")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "access_denied");

    let err = engine
        .authorize(&request("alice", "analytics", Some("other-bucket")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "resource_not_authorized");
}

#[tokio::test]
async fn test_webapp_scenario() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;
    registry
        .create(
            new_service(
                "webapp",
                &["webapp-*", "shared-data-*"],
                PermissionTier::ReadWrite,
                &[],
            ),
            false,
        )
        .await
        .unwrap();
    let engine = engine(registry);

    for user in ["alice", "bob", "carol", "dave"] {
        let grant = engine
            .authorize(&request(user, "webapp", Some("shared-data-logs")))
            .await
            .unwrap();
        assert_eq!(
            grant.policy.resources(),
            vec!["arn:aws:s3:::shared-data-*", "arn:aws:s3:::shared-data-*/*"]
        );
    }
}

#[tokio::test]
async fn test_admin_service_stays_restricted() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;

    for restricted in [users(&[]), users(&["alice"])] {
        let patch = ServicePatch {
            restricted_users: Some(restricted),
            ..Default::default()
        };
        let err = registry.update(ADMIN, patch).await.unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }

    let admin = registry.get(ADMIN).unwrap();
    assert_eq!(admin.restricted_users, users(&["admin"]));
    assert_eq!(admin.permission, PermissionTier::Admin);

    let engine = engine(registry);
    assert!(engine
        .authorize(&request("admin", ADMIN, Some("any-bucket")))
        .await
        .is_ok());
    assert!(engine
        .authorize(&request("alice", ADMIN, Some("any-bucket")))
        .await
        .is_err());
}

#[tokio::test]
async fn test_registry_lifecycle() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;

    let new = new_service("reports", &["reports-*"], PermissionTier::ReadOnly, &["alice"]);
    registry.create(new.clone(), false).await.unwrap();
    assert_eq!(
        registry.create(new, false).await.unwrap_err(),
        BrokerError::DuplicateService(String::from("reports"))
    );

    // Force replaces every field, nothing is merged.
    let replacement = new_service("reports", &["archive-*"], PermissionTier::ReadWrite, &[]);
    registry.create(replacement, true).await.unwrap();
    let service = registry.get("reports").unwrap();
    assert_eq!(service.bucket_patterns, vec![String::from("archive-*")]);
    assert_eq!(service.permission, PermissionTier::ReadWrite);
    assert!(service.restricted_users.is_empty());

    let patch = ServicePatch {
        bucket_patterns: Some(vec![String::from("reports-*"), String::from("exports-*")]),
        ..Default::default()
    };
    registry.update("reports", patch).await.unwrap();
    let updated = registry.get("reports").unwrap();
    assert_eq!(
        updated.bucket_patterns,
        vec![String::from("reports-*"), String::from("exports-*")]
    );
    assert_eq!(updated.permission, service.permission);
    assert_eq!(updated.restricted_users, service.restricted_users);
    assert_eq!(updated.role, service.role);

    assert_eq!(registry.status("reports").await.unwrap(), ServiceStatus::Active);

    registry.delete("reports", false).await.unwrap();
    assert_eq!(
        registry.get("reports").unwrap_err(),
        BrokerError::ServiceNotFound(String::from("reports"))
    );
    assert_eq!(registry.status("reports").await.unwrap(), ServiceStatus::Inactive);
    assert_eq!(
        registry.delete("reports", false).await.unwrap_err(),
        BrokerError::ServiceNotFound(String::from("reports"))
    );

    let report = registry.delete("reports", true).await.unwrap();
    assert!(!report.removed);
}

#[tokio::test]
async fn test_policy_from_registry() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;
    registry
        .create(
            new_service("logs", &["logs-*", "audit-*"], PermissionTier::Admin, &[]),
            false,
        )
        .await
        .unwrap();

    let service = registry.get("logs").unwrap();
    for resource in ["backup", "log-1", "audit"] {
        let err = build_policy(&service, Some(resource), None).unwrap_err();
        assert_eq!(err.kind(), "resource_not_authorized", "{resource}");
    }
    let policy = build_policy(&service, Some("audit-2024"), None).unwrap();
    assert_eq!(policy.actions(), vec!["s3:*"]);
}

#[tokio::test]
async fn test_concurrent_authorize_during_edits() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;
    registry
        .create(
            new_service("shared", &["shared-*"], PermissionTier::ReadOnly, &[]),
            false,
        )
        .await
        .unwrap();
    let engine = Arc::new(engine(registry.clone()));

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("user-{i}");
            engine
                .authorize(&request(&user, "shared", Some("shared-data")))
                .await
        }));
    }
    for tier in [PermissionTier::ReadWrite, PermissionTier::ReadOnly] {
        let patch = ServicePatch {
            permission: Some(tier),
            ..Default::default()
        };
        registry.update("shared", patch).await.unwrap();
    }

    for handle in handles {
        let grant = handle.await.unwrap().unwrap();
        // Every grant reflects one whole version of the service.
        let actions = grant.policy.actions();
        assert!(
            actions == vec!["s3:GetObject", "s3:ListBucket"]
                || actions
                    == vec!["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:ListBucket"],
            "{actions:?}"
        );
    }
}

#[tokio::test]
async fn test_closed_registry() {
    let registry = open_registry(Arc::new(Database::memory().unwrap())).await;
    registry
        .create(
            new_service("kept", &["kept-*"], PermissionTier::ReadOnly, &[]),
            false,
        )
        .await
        .unwrap();
    registry.close().await.unwrap();

    // Reads keep working from the last snapshot.
    assert!(registry.get("kept").is_ok());

    let err = registry
        .create(
            new_service("lost", &["lost-*"], PermissionTier::ReadOnly, &[]),
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "registry_unavailable");
}

#[tokio::test]
async fn test_registry_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("s3bridge-reopen-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let mut cfg = DbConfig::default();
    cfg.sqlite.path = format!("{}", dir.join("broker.db").display());

    let registry = open_registry(DbFactory::new().build_db(&cfg).unwrap()).await;
    registry
        .create(
            new_service("durable", &["durable-*"], PermissionTier::ReadOnly, &["alice"]),
            false,
        )
        .await
        .unwrap();
    let before = registry.get("durable").unwrap();
    registry.close().await.unwrap();
    drop(registry);

    let registry = open_registry(DbFactory::new().build_db(&cfg).unwrap()).await;
    assert_eq!(registry.get("durable").unwrap(), before);
    assert_eq!(registry.status("durable").await.unwrap(), ServiceStatus::Active);
    registry.close().await.unwrap();

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_running_broker_sees_edits_from_another_process() {
    let dir = std::env::temp_dir().join(format!("s3bridge-shared-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let mut cfg = DbConfig::default();
    cfg.sqlite.path = format!("{}", dir.join("broker.db").display());

    // The broker and the admin CLI each hold their own connection.
    let server = open_registry(DbFactory::new().build_db(&cfg).unwrap()).await;
    let cli = open_registry(DbFactory::new().build_db(&cfg).unwrap()).await;

    cli.create(
        new_service("analytics", &["analytics-*"], PermissionTier::ReadOnly, &["alice", "bob"]),
        false,
    )
    .await
    .unwrap();
    let engine = engine(server.clone());
    assert!(engine
        .authorize(&request("bob", "analytics", Some("analytics-reports")))
        .await
        .is_ok());

    let patch = ServicePatch {
        restricted_users: Some(users(&["alice"])),
        ..Default::default()
    };
    cli.update("analytics", patch).await.unwrap();
    let err = engine
        .authorize(&request("bob", "analytics", Some("analytics-reports")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "access_denied");
    assert_eq!(server.get("analytics").unwrap().restricted_users, users(&["alice"]));

    cli.delete("analytics", false).await.unwrap();
    let err = engine
        .authorize(&request("alice", "analytics", Some("analytics-reports")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "service_not_found");

    cli.close().await.unwrap();
    server.close().await.unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
}
