#![allow(dead_code)]

use cosmosdal::{memory::InMemoryStore, prelude::*};
use serde_json::{Value, json};

pub const DATABASE: &str = "my_db";
pub const COLLECTION: &str = "my_collection";

/// A layer over a fresh store holding `my_db/my_collection`, created with `options`.
pub async fn dal_with_collection(options: CollectionOptions) -> CosmosDal<InMemoryStore> {
    let dal = CosmosDal::new(InMemoryStore::new());

    dal.databases().create(DATABASE).await.unwrap();
    dal.collections()
        .create(COLLECTION, DATABASE, options)
        .await
        .unwrap();

    dal
}

pub fn order(id: &str, subtotal: f64, product_id: i64) -> Value {
    json!({
        "id": id,
        "account_number": "Account1",
        "purchase_order_number": "PO18009186470",
        "order_date": "2005-07-01T00:00:00",
        "subtotal": subtotal,
        "tax_amount": 12.5838,
        "freight": 472.3108,
        "total_due": 985.018,
        "items": [
            {
                "order_qty": 1,
                "product_id": product_id,
                "unit_price": 418.4589,
                "line_price": 418.4589
            }
        ],
    })
}
