use shopseed_generate::entities::AddressRecord;

use crate::error::Result;
use crate::models::AddressRow;
use crate::store::Store;

impl Store {
    pub async fn insert_addresses(
        &self,
        user_id: i64,
        records: &[AddressRecord],
    ) -> Result<Vec<AddressRow>> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let row = sqlx::query_as::<_, AddressRow>(
                "insert into addresses \
                 (user_id, label, address1, address2, city, state, zipcode, country) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8) \
                 returning id, user_id, label, address1, address2, city, state, zipcode, \
                 country, created_at",
            )
            .bind(user_id)
            .bind(&record.label)
            .bind(&record.address1)
            .bind(&record.address2)
            .bind(&record.city)
            .bind(&record.state)
            .bind(&record.zipcode)
            .bind(&record.country)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }
}
