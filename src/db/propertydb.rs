use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::DBClient, models::propertymodel::PropertySummary};

const PROPERTY_SUMMARY_COLUMNS: &str =
    "id, title, property_type, price, images, street, city, district, country";

#[async_trait]
pub trait PropertyExt: Send + Sync {
    async fn get_property_summary(
        &self,
        property_id: Uuid,
    ) -> Result<Option<PropertySummary>, sqlx::Error>;

    async fn get_property_summaries(
        &self,
        property_ids: &[Uuid],
    ) -> Result<Vec<PropertySummary>, sqlx::Error>;
}

#[async_trait]
impl PropertyExt for DBClient {
    async fn get_property_summary(
        &self,
        property_id: Uuid,
    ) -> Result<Option<PropertySummary>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM properties WHERE id = $1",
            PROPERTY_SUMMARY_COLUMNS
        );

        sqlx::query_as::<_, PropertySummary>(&sql)
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_property_summaries(
        &self,
        property_ids: &[Uuid],
    ) -> Result<Vec<PropertySummary>, sqlx::Error> {
        if property_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM properties WHERE id = ANY($1)",
            PROPERTY_SUMMARY_COLUMNS
        );

        sqlx::query_as::<_, PropertySummary>(&sql)
            .bind(property_ids.to_vec())
            .fetch_all(&self.pool)
            .await
    }
}
