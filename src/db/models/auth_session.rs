use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthSession {
    pub token: Uuid,
    pub user_id: i32,
    pub expires_at: OffsetDateTime,
}

impl AuthSession {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
