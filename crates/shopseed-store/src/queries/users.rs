use shopseed_generate::entities::UserRecord;

use crate::error::{Result, StoreError};
use crate::models::{UserAddresses, UserRow};
use crate::store::Store;
use crate::unique::Identity;

const USER_COLUMNS: &str = "id, first_name, last_name, username, email, password, role, \
     money_num, favorite_product, prompt, image_url, created_at";

impl Store {
    /// Insert one user under the given identity, which may differ from the
    /// generated one after a uniqueness conflict.
    pub async fn insert_user(&self, record: &UserRecord, identity: &Identity) -> Result<UserRow> {
        let sql = format!(
            "insert into users \
             (first_name, last_name, username, email, password, role, money_num, favorite_product, prompt) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             returning {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&record.first_name)
            .bind(&record.last_name)
            .bind(&identity.username)
            .bind(&identity.email)
            .bind(&record.password)
            .bind(record.role.as_str())
            .bind(record.money_num)
            .bind(&record.favorite_product)
            .bind(&record.prompt)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn user(&self, id: i64) -> Result<UserRow> {
        let sql = format!("select {USER_COLUMNS} from users where id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    pub async fn users_without_image(&self) -> Result<Vec<UserRow>> {
        let sql = format!(
            "select {USER_COLUMNS} from users \
             where image_url is null or image_url = '' order by id"
        );
        Ok(sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn set_user_image(&self, id: i64, url: &str) -> Result<()> {
        let result = sqlx::query("update users set image_url = $1 where id = $2")
            .bind(url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    pub async fn users_without_addresses(&self) -> Result<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "select u.id from users u \
             where not exists (select 1 from addresses a where a.user_id = u.id) \
             order by u.id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn users_without_reviews(&self) -> Result<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "select u.id from users u \
             where not exists (select 1 from reviews r where r.user_id = u.id) \
             order by u.id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Users that own at least one address, with their address ids.
    pub async fn users_with_addresses(&self) -> Result<Vec<UserAddresses>> {
        let rows = sqlx::query_as::<_, (i64, Vec<i64>)>(
            "select user_id, array_agg(id order by id) \
             from addresses group by user_id order by user_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, address_ids)| UserAddresses {
                user_id,
                address_ids,
            })
            .collect())
    }
}
