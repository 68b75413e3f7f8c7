//! User model. A user is either anonymous (cookie session) or authenticated
//! (subject claim from the hosted auth platform).

use roastme_core::credits::PlanTier;
use roastme_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    #[serde(skip_serializing)]
    pub auth_subject: Option<String>,
    #[serde(skip_serializing)]
    pub anonymous_session: Option<Uuid>,
    pub email: Option<String>,
    pub credits: i32,
    pub plan: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn is_anonymous(&self) -> bool {
        self.auth_subject.is_none()
    }

    pub fn plan_tier(&self) -> PlanTier {
        PlanTier::from_db(&self.plan)
    }
}
