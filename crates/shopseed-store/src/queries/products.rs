use shopseed_generate::entities::ProductRecord;

use crate::error::{Result, StoreError};
use crate::models::{PricedProduct, ProductRow, ProductSummary};
use crate::store::Store;

const PRODUCT_COLUMNS: &str = "id, name, category, price, rating, quantity, description, \
     prompt, in_stock, image_url, created_at";

/// Stock counts arrive as JSON numbers; store them as non-negative integers.
fn stock_count(quantity: f64) -> i32 {
    quantity.round().clamp(0.0, i32::MAX as f64) as i32
}

impl Store {
    /// Insert a validated batch in one transaction, preserving order.
    pub async fn insert_products(&self, records: &[ProductRecord]) -> Result<Vec<ProductRow>> {
        let sql = format!(
            "insert into products \
             (name, category, price, rating, quantity, description, prompt, in_stock) \
             values ($1, $2, $3, $4, $5, $6, $7, true) \
             returning {PRODUCT_COLUMNS}"
        );
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let row = sqlx::query_as::<_, ProductRow>(&sql)
                .bind(&record.name)
                .bind(&record.category)
                .bind(record.price)
                .bind(record.rating)
                .bind(stock_count(record.quantity))
                .bind(&record.description)
                .bind(&record.prompt)
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn product(&self, id: i64) -> Result<ProductRow> {
        let sql = format!("select {PRODUCT_COLUMNS} from products where id = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "product",
                id,
            })
    }

    pub async fn products_without_image(&self) -> Result<Vec<ProductRow>> {
        let sql = format!(
            "select {PRODUCT_COLUMNS} from products \
             where image_url is null or image_url = '' order by id"
        );
        Ok(sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn set_product_image(&self, id: i64, url: &str) -> Result<()> {
        let result = sqlx::query("update products set image_url = $1 where id = $2")
            .bind(url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id,
            });
        }
        Ok(())
    }

    /// Up to `limit` products in random order.
    pub async fn random_products(&self, limit: i64) -> Result<Vec<ProductSummary>> {
        Ok(sqlx::query_as::<_, ProductSummary>(
            "select id, name, description from products order by random() limit $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn priced_products(&self) -> Result<Vec<PricedProduct>> {
        Ok(
            sqlx::query_as::<_, PricedProduct>("select id, price from products order by id")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
