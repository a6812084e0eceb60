use crate::types::service::PermissionTier;

pub const GET_OBJECT: &str = "s3:GetObject";
pub const PUT_OBJECT: &str = "s3:PutObject";
pub const DELETE_OBJECT: &str = "s3:DeleteObject";
pub const LIST_BUCKET: &str = "s3:ListBucket";
pub const ALL_ACTIONS: &str = "s3:*";

const READ_ONLY: &[&str] = &[GET_OBJECT, LIST_BUCKET];
const READ_WRITE: &[&str] = &[GET_OBJECT, PUT_OBJECT, DELETE_OBJECT, LIST_BUCKET];
const ADMIN: &[&str] = &[ALL_ACTIONS];

/// The minimal S3 action set granted by a tier.
pub fn resolve_actions(tier: PermissionTier) -> &'static [&'static str] {
    match tier {
        PermissionTier::ReadOnly => READ_ONLY,
        PermissionTier::ReadWrite => READ_WRITE,
        PermissionTier::Admin => ADMIN,
    }
}
