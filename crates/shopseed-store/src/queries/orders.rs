use crate::error::Result;
use crate::models::{NewOrderItem, OrderRow, OrderStatus, PaymentRow, PaymentStatus};
use crate::store::Store;

const ORDER_COLUMNS: &str =
    "id, user_id, status, shipping_address_id, billing_address_id, total, created_at";

impl Store {
    pub async fn insert_order(
        &self,
        user_id: i64,
        status: OrderStatus,
        shipping_address_id: i64,
        billing_address_id: i64,
    ) -> Result<OrderRow> {
        let sql = format!(
            "insert into orders (user_id, status, shipping_address_id, billing_address_id, total) \
             values ($1, $2, $3, $4, 0) returning {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .bind(shipping_address_id)
            .bind(billing_address_id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn orders_without_items(&self) -> Result<Vec<OrderRow>> {
        let sql = format!(
            "select {ORDER_COLUMNS} from orders o \
             where not exists (select 1 from order_items i where i.order_id = o.id) \
             order by id"
        );
        Ok(sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Insert the lines of one order and set its total, atomically.
    pub async fn add_order_items(&self, order_id: i64, items: &[NewOrderItem]) -> Result<OrderRow> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                "insert into order_items (order_id, product_id, quantity, price) \
                 values ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }
        let sql = format!(
            "update orders set total = coalesce( \
               (select sum(price * quantity) from order_items where order_id = $1), 0) \
             where id = $1 returning {ORDER_COLUMNS}"
        );
        let order = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn orders_without_payments(&self) -> Result<Vec<OrderRow>> {
        let sql = format!(
            "select {ORDER_COLUMNS} from orders o \
             where not exists (select 1 from payments p where p.order_id = o.id) \
             order by id"
        );
        Ok(sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn insert_payment(
        &self,
        order_id: i64,
        amount: f64,
        status: PaymentStatus,
        intent_id: &str,
    ) -> Result<PaymentRow> {
        Ok(sqlx::query_as::<_, PaymentRow>(
            "insert into payments (order_id, amount, status, intent_id) \
             values ($1, $2, $3, $4) \
             returning id, order_id, amount, status, intent_id, created_at",
        )
        .bind(order_id)
        .bind(amount)
        .bind(status.as_str())
        .bind(intent_id)
        .fetch_one(&self.pool)
        .await?)
    }
}
