use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::DBClient, models::usermodel::User};

const USER_COLUMNS: &str = "id, name, email, phone, role, status, created_at, updated_at";

#[async_trait]
pub trait UserExt: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(user_ids.to_vec())
            .fetch_all(&self.pool)
            .await
    }
}
