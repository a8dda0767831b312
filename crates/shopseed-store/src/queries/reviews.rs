use shopseed_generate::entities::ReviewRecord;

use crate::error::Result;
use crate::models::ReviewRow;
use crate::store::Store;

impl Store {
    pub async fn insert_reviews(&self, records: &[ReviewRecord]) -> Result<Vec<ReviewRow>> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let row = sqlx::query_as::<_, ReviewRow>(
                "insert into reviews (user_id, product_id, star_rating, comment) \
                 values ($1, $2, $3, $4) \
                 returning id, user_id, product_id, star_rating, comment, created_at",
            )
            .bind(record.user_id)
            .bind(record.product_id)
            .bind(record.star_rating)
            .bind(&record.comment)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }
}
