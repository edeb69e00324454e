use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::PaymentGatewayError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, PaymentGatewayError> {
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (name, price, currency) VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.currency)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, PaymentGatewayError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}
