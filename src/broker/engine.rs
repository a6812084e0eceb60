use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time;

use crate::time::current_timestamp;
use crate::types::credential::CredentialBundle;

use super::error::{BrokerError, BrokerResult};
use super::identity::VerifiedIdentity;
use super::issuer::{session_name, CredentialIssuer, IssueRequest, Lifetime};
use super::policy::{build_policy, PolicyDocument};
use super::registry::ServiceRegistry;

/// One credential request. Only ever built from an identity that already
/// passed verification.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub caller: VerifiedIdentity,
    pub service: String,

    /// Bucket the caller wants to reach; `None` asks for the whole service.
    pub resource: Option<String>,

    /// Key prefix further narrowing object access.
    pub prefix: Option<String>,

    pub duration_secs: Option<u64>,
}

/// Granted credentials together with the document they are scoped by.
#[derive(Debug, Clone)]
pub struct Grant {
    pub credentials: CredentialBundle,
    pub policy: PolicyDocument,
    pub duration_secs: u64,
}

/// Steps of one authorization. `Rejected` may follow any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzStage {
    ReceivedRequest,
    IdentityAccepted,
    ServiceResolved,
    RestrictionChecked,
    PolicyBuilt,
    CredentialsIssued,
    Rejected,
}

impl fmt::Display for AuthzStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReceivedRequest => "received-request",
            Self::IdentityAccepted => "identity-accepted",
            Self::ServiceResolved => "service-resolved",
            Self::RestrictionChecked => "restriction-checked",
            Self::PolicyBuilt => "policy-built",
            Self::CredentialsIssued => "credentials-issued",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Decides credential requests. Holds no per-request state, so one engine
/// serves any number of concurrent callers.
pub struct AuthorizationEngine {
    registry: Arc<ServiceRegistry>,
    issuer: Arc<dyn CredentialIssuer>,
    lifetime: Lifetime,
    timeout: Duration,
    session_prefix: String,
}

impl AuthorizationEngine {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        issuer: Arc<dyn CredentialIssuer>,
        lifetime: Lifetime,
        timeout: Duration,
        session_prefix: &str,
    ) -> Self {
        Self {
            registry,
            issuer,
            lifetime,
            timeout,
            session_prefix: session_prefix.to_string(),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Runs the request through every step and writes exactly one audit line.
    pub async fn authorize(&self, req: &AccessRequest) -> BrokerResult<Grant> {
        let mut stage = AuthzStage::ReceivedRequest;
        let result = self.run(req, &mut stage).await;

        let resource = req.resource.as_deref().unwrap_or("*");
        match result {
            Ok(ref grant) => info!(
                "Grant user={} service={} resource={} actions={} expiration={}",
                req.caller,
                req.service,
                resource,
                grant.policy.actions().join(","),
                grant.credentials.expiration.to_rfc3339()
            ),
            Err(ref err) => warn!(
                "Reject user={} service={} resource={} kind={} stage={stage}: {err}",
                req.caller,
                req.service,
                resource,
                err.kind()
            ),
        }
        result
    }

    async fn run(&self, req: &AccessRequest, stage: &mut AuthzStage) -> BrokerResult<Grant> {
        self.advance(stage, AuthzStage::IdentityAccepted, req);

        let service = self.registry.get(&req.service)?;
        self.advance(stage, AuthzStage::ServiceResolved, req);

        if !service.allows(req.caller.as_str()) {
            return Err(BrokerError::AccessDenied {
                user: req.caller.to_string(),
                service: service.name,
            });
        }
        self.advance(stage, AuthzStage::RestrictionChecked, req);

        let policy = build_policy(&service, req.resource.as_deref(), req.prefix.as_deref())?;
        self.advance(stage, AuthzStage::PolicyBuilt, req);

        let duration_secs = self.lifetime.bound(req.duration_secs);
        let issue_req = IssueRequest {
            role: service.role.clone(),
            policy: policy.to_json().map_err(BrokerError::issuance)?,
            session_name: session_name(&self.session_prefix, &service.name, current_timestamp()),
            duration_secs,
        };
        let credentials = match time::timeout(self.timeout, self.issuer.issue(&issue_req)).await {
            Ok(Ok(credentials)) => credentials,
            Ok(Err(err)) => return Err(BrokerError::issuance(err)),
            Err(_) => {
                return Err(BrokerError::IssuanceFailed(format!(
                    "timed out after {:?}",
                    self.timeout
                )));
            }
        };
        self.advance(stage, AuthzStage::CredentialsIssued, req);

        Ok(Grant {
            credentials,
            policy,
            duration_secs,
        })
    }

    fn advance(&self, stage: &mut AuthzStage, next: AuthzStage, req: &AccessRequest) {
        debug!(
            "Authorize user={} service={}: {} -> {next}",
            req.caller, req.service, *stage
        );
        *stage = next;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::DateTime;

    use crate::broker::db::Database;
    use crate::broker::issuer::local::LocalIssuer;
    use crate::broker::provision::local::LocalProvisioner;
    use crate::broker::registry::AdminService;
    use crate::types::service::{NewService, PermissionTier};

    use super::*;

    /// Records every request and answers with fixed credentials.
    #[derive(Default)]
    struct RecordingIssuer {
        requests: StdMutex<Vec<IssueRequest>>,
    }

    #[async_trait]
    impl CredentialIssuer for RecordingIssuer {
        async fn issue(&self, req: &IssueRequest) -> Result<CredentialBundle> {
            self.requests.lock().unwrap().push(req.clone());
            Ok(CredentialBundle {
                access_key_id: String::from("ASIATEST"),
                secret_access_key: String::from("secret"),
                session_token: String::from("token"),
                expiration: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            })
        }
    }

    struct FailingIssuer;

    #[async_trait]
    impl CredentialIssuer for FailingIssuer {
        async fn issue(&self, _req: &IssueRequest) -> Result<CredentialBundle> {
            bail!("throttled by provider")
        }
    }

    struct SlowIssuer;

    #[async_trait]
    impl CredentialIssuer for SlowIssuer {
        async fn issue(&self, req: &IssueRequest) -> Result<CredentialBundle> {
            time::sleep(Duration::from_secs(60)).await;
            LocalIssuer::new().issue(req).await
        }
    }

    const LIFETIME: Lifetime = Lifetime {
        default_secs: 3600,
        max_secs: 3600,
    };

    async fn build_registry() -> Arc<ServiceRegistry> {
        let db = Arc::new(Database::memory().unwrap());
        let provisioner = Arc::new(LocalProvisioner::new(
            Arc::clone(&db),
            "123456789012",
            "service-role",
        ));
        let admin = AdminService {
            name: String::from("universal"),
            users: [String::from("admin")].into(),
        };
        let registry = ServiceRegistry::open(db, provisioner, admin, Duration::from_secs(5))
            .await
            .unwrap();

        let services = [
            ("analytics", vec!["analytics-*"], PermissionTier::ReadOnly, vec!["alice", "bob"]),
            ("webapp", vec!["webapp-*", "shared-data-*"], PermissionTier::ReadWrite, vec![]),
        ];
        for (name, patterns, permission, users) in services {
            let new = NewService {
                name: name.to_string(),
                bucket_patterns: patterns.into_iter().map(String::from).collect(),
                permission,
                restricted_users: users.into_iter().map(String::from).collect::<BTreeSet<_>>(),
            };
            registry.create(new, false).await.unwrap();
        }
        Arc::new(registry)
    }

    async fn build_engine(issuer: Arc<dyn CredentialIssuer>) -> AuthorizationEngine {
        let registry = build_registry().await;
        AuthorizationEngine::new(registry, issuer, LIFETIME, Duration::from_secs(1), "")
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

    #[tokio::test]
    async fn test_restricted_service() {
        let issuer = Arc::new(RecordingIssuer::default());
        let engine = build_engine(issuer.clone()).await;

        let grant = engine
            .authorize(&request("alice", "analytics", Some("analytics-reports")))
            .await
            .unwrap();
        assert_eq!(grant.policy.actions(), vec!["s3:GetObject", "s3:ListBucket"]);
        assert_eq!(
            grant.policy.resources(),
            vec!["arn:aws:s3:::analytics-*", "arn:aws:s3:::analytics-*/*"]
        );
        assert_eq!(grant.credentials.access_key_id, "ASIATEST");

        let err = engine
            .authorize(&request("carol", "analytics", Some("analytics-reports")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BrokerError::AccessDenied {
                user: String::from("carol"),
                service: String::from("analytics"),
            }
        );

        let err = engine
            .authorize(&request("alice", "analytics", Some("other-bucket")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BrokerError::ResourceNotAuthorized {
                service: String::from("analytics"),
                resource: String::from("other-bucket"),
            }
        );

        // Only the granted request reached the issuer.
        let requests = issuer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].role,
            "arn:aws:iam::123456789012:role/service-role/analytics-s3-access-role"
        );
        assert!(requests[0].session_name.starts_with("analytics-session-"));
        assert_eq!(requests[0].duration_secs, 3600);
        let policy: PolicyDocument = serde_json::from_str(&requests[0].policy).unwrap();
        assert_eq!(policy, grant.policy);
    }

    #[tokio::test]
    async fn test_unrestricted_service() {
        let engine = build_engine(Arc::new(RecordingIssuer::default())).await;

        for user in ["alice", "carol", "someone-else"] {
            let grant = engine
                .authorize(&request(user, "webapp", Some("shared-data-logs")))
                .await
                .unwrap();
            assert_eq!(
                grant.policy.resources(),
                vec!["arn:aws:s3:::shared-data-*", "arn:aws:s3:::shared-data-*/*"]
            );
            assert_eq!(
                grant.policy.actions(),
                vec!["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:ListBucket"]
            );
        }

        // Whole-service request covers every pattern.
        let grant = engine.authorize(&request("carol", "webapp", None)).await.unwrap();
        assert_eq!(grant.policy.resources().len(), 4);
    }

    #[tokio::test]
    async fn test_admin_service() {
        let engine = build_engine(Arc::new(RecordingIssuer::default())).await;

        let grant = engine
            .authorize(&request("admin", "universal", Some("any-bucket")))
            .await
            .unwrap();
        assert_eq!(grant.policy.actions(), vec!["s3:*"]);

        let err = engine
            .authorize(&request("alice", "universal", Some("any-bucket")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "access_denied");
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let engine = build_engine(Arc::new(RecordingIssuer::default())).await;
        let err = engine
            .authorize(&request("alice", "missing", None))
            .await
            .unwrap_err();
        assert_eq!(err, BrokerError::ServiceNotFound(String::from("missing")));
    }

    #[tokio::test]
    async fn test_duration_and_prefix() {
        let issuer = Arc::new(RecordingIssuer::default());
        let engine = build_engine(issuer.clone()).await;

        let mut req = request("bob", "analytics", Some("analytics-2024"));
        req.prefix = Some(String::from("team/"));
        for (requested, expect) in [(Some(60), 900), (Some(1800), 1800), (Some(86400), 3600)] {
            req.duration_secs = requested;
            let grant = engine.authorize(&req).await.unwrap();
            assert_eq!(grant.duration_secs, expect);
            assert_eq!(
                grant.policy.resources(),
                vec!["arn:aws:s3:::analytics-*", "arn:aws:s3:::analytics-*/team/*"]
            );
        }

        let durations: Vec<u64> = issuer
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.duration_secs)
            .collect();
        assert_eq!(durations, vec![900, 1800, 3600]);
    }

    #[tokio::test]
    async fn test_issuance_failure() {
        let engine = build_engine(Arc::new(FailingIssuer)).await;
        let err = engine
            .authorize(&request("alice", "analytics", Some("analytics-reports")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BrokerError::IssuanceFailed(String::from("throttled by provider"))
        );
    }

    #[tokio::test]
    async fn test_issuance_timeout() {
        let registry = build_registry().await;
        let engine = AuthorizationEngine::new(
            registry,
            Arc::new(SlowIssuer),
            LIFETIME,
            Duration::from_millis(100),
            "",
        );
        let err = engine
            .authorize(&request("alice", "analytics", Some("analytics-reports")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "issuance_failed");
    }

    #[tokio::test]
    async fn test_registry_edit_applies_immediately() {
        let engine = build_engine(Arc::new(RecordingIssuer::default())).await;
        let registry = Arc::clone(engine.registry());

        let patch = crate::types::service::ServicePatch {
            restricted_users: Some(BTreeSet::new()),
            ..Default::default()
        };
        registry.update("analytics", patch).await.unwrap();
        assert!(engine
            .authorize(&request("carol", "analytics", Some("analytics-reports")))
            .await
            .is_ok());

        registry.delete("analytics", false).await.unwrap();
        let err = engine
            .authorize(&request("alice", "analytics", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "service_not_found");
    }
}
