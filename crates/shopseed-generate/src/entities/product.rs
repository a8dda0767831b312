use serde::{Deserialize, Serialize};
use shopseed_core::{FieldSpec, RecordSchema};

use crate::backend::{CompletionRequest, TextBackend};
use crate::engine::{Directives, EntityKind};
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub rating: f64,
    /// Stock count. Models sometimes answer with a float, so it is kept as
    /// a number and rounded when stored.
    pub quantity: f64,
    pub description: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct ProductEntity {
    schema: RecordSchema,
}

impl Default for ProductEntity {
    fn default() -> Self {
        Self {
            schema: RecordSchema::new("product")
                .field(FieldSpec::text("name"))
                .field(FieldSpec::text("category"))
                .field(FieldSpec::number("price"))
                .field(FieldSpec::number("rating"))
                .field(FieldSpec::number("quantity"))
                .field(FieldSpec::lenient("description"))
                .field(FieldSpec::lenient("prompt")),
        }
    }
}

const PRODUCT_SYSTEM: &str = "\
You only output valid JSON arrays of e-commerce product data.
No extra text, no code blocks, no partial objects, no trailing commas.
Each product has exactly these keys: name, category, price, rating, quantity, description, prompt.

- \"description\": at least 3 sentences
- \"prompt\": at least 15 words describing how the product looks and where it is shown

Check the JSON syntax carefully. If you run out of space, still close the array.";

impl EntityKind for ProductEntity {
    type Record = ProductRecord;

    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn directives(&self, count: usize) -> Directives {
        let user = format!(
            r#"Generate {count} unique, high-quality products as a JSON array. One item looks like:

{{
  "name": "Sample Product",
  "category": "Sample Category",
  "price": 12.99,
  "rating": 4.2,
  "quantity": 50,
  "description": "Sentence one. Sentence two. Sentence three.",
  "prompt": "At least 15 words about the product's appearance, setting, or style."
}}

Return only the JSON array with {count} such objects. No code blocks or markdown."#
        );
        Directives {
            system: PRODUCT_SYSTEM.to_string(),
            user,
        }
    }
}

/// Ask the backend for a short marketing blurb about a product.
pub async fn describe_product(backend: &dyn TextBackend, details: &str) -> Result<String> {
    let request = CompletionRequest {
        system: "You write short, persuasive marketing blurbs for products.".to_string(),
        user: format!("Write a concise yet compelling product description for: {details}"),
        max_tokens: 1_000,
    };
    let text = backend.complete(&request).await?.into_text().await?;
    Ok(text.trim().to_string())
}
