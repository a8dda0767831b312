use serde::{Deserialize, Serialize};
use shopseed_core::{FieldSpec, RecordSchema};

use crate::engine::{Directives, EntityKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub label: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct AddressEntity {
    schema: RecordSchema,
}

impl Default for AddressEntity {
    fn default() -> Self {
        Self {
            schema: RecordSchema::new("address")
                .field(FieldSpec::defaulted("label", "Home"))
                .field(FieldSpec::text("address1"))
                .field(FieldSpec::defaulted("address2", ""))
                .field(FieldSpec::text("city"))
                .field(FieldSpec::defaulted("state", ""))
                .field(FieldSpec::text("zipcode"))
                .field(FieldSpec::text("country")),
        }
    }
}

const ADDRESS_SYSTEM: &str = "\
You only output valid JSON arrays of address data.
No extra text, code blocks, partial objects, or trailing commas.
Each address has these keys:
  \"label\", \"address1\", \"address2\", \"city\", \"state\", \"zipcode\", \"country\"

Rules:
1. If you cannot fill a key, set it to an empty string.
2. \"label\" is something like \"Home\", \"Work\" or \"Billing\".
3. \"address1\" is the street address, \"address2\" the apartment or suite and may be empty.
4. \"country\" is mandatory, e.g. \"USA\".";

impl EntityKind for AddressEntity {
    type Record = AddressRecord;

    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn directives(&self, count: usize) -> Directives {
        let user = format!(
            r#"Generate {count} fictional addresses as a JSON array. One item looks like:

{{
  "label": "Home",
  "address1": "123 Main St",
  "address2": "Apt 4B",
  "city": "Springfield",
  "state": "IL",
  "zipcode": "62704",
  "country": "USA"
}}

Return only the JSON array with {count} such objects."#
        );
        Directives {
            system: ADDRESS_SYSTEM.to_string(),
            user,
        }
    }

    fn max_tokens(&self) -> u32 {
        3_000
    }
}
