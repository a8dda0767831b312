use std::fmt;

use serde::{Deserialize, Serialize};
use shopseed_core::{FieldSpec, RecordSchema};

use crate::engine::{Directives, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub money_num: f64,
    pub favorite_product: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct UserEntity {
    schema: RecordSchema,
}

impl Default for UserEntity {
    fn default() -> Self {
        Self {
            schema: RecordSchema::new("user")
                .field(FieldSpec::text("firstName"))
                .field(FieldSpec::text("lastName"))
                .field(FieldSpec::text("username"))
                .field(FieldSpec::email("email"))
                .field(FieldSpec::text_min("password", 4))
                .field(FieldSpec::one_of("role", &["USER", "ADMIN"]))
                .field(FieldSpec::number("moneyNum"))
                .field(FieldSpec::lenient("favoriteProduct"))
                .field(FieldSpec::lenient("prompt")),
        }
    }
}

const USER_SYSTEM: &str = "\
You only output valid JSON arrays of user data.
No extra text, no code blocks, no partial objects, no trailing commas.
Each user has exactly these keys:
  \"firstName\", \"lastName\", \"username\", \"email\", \"password\", \"role\", \"moneyNum\", \"favoriteProduct\", \"prompt\"

Rules:
1. Every field is a non-empty string except moneyNum, which is a number.
2. If you cannot fill a field, use a placeholder such as \"Unknown\".
3. \"role\" is either \"USER\" or \"ADMIN\".
4. \"prompt\" is at least 15 words describing the person's face and style.
5. Usernames are unique within the array. So are emails.
6. End with a valid JSON array and nothing after it.";

impl EntityKind for UserEntity {
    type Record = UserRecord;

    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn directives(&self, count: usize) -> Directives {
        let user = format!(
            r#"Generate {count} unique fictional users as a JSON array. One item looks like:

{{
  "firstName": "Alice",
  "lastName": "Johnson",
  "username": "alice123",
  "email": "alice@example.com",
  "password": "Passw0rd!",
  "role": "USER",
  "moneyNum": 250.75,
  "favoriteProduct": "Fancy Laptop Case",
  "prompt": "Brown hair, green eyes, round glasses, a friendly smile and a modern style with floral tones."
}}

No code blocks or markdown. Return only the JSON array with {count} such objects."#
        );
        Directives {
            system: USER_SYSTEM.to_string(),
            user,
        }
    }
}
