use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of record an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSubject {
    User,
    Product,
}

impl ImageSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSubject::User => "user",
            ImageSubject::Product => "product",
        }
    }

    /// Route segment under `/api` that serves this subject.
    pub fn route(self) -> &'static str {
        match self {
            ImageSubject::User => "users",
            ImageSubject::Product => "products",
        }
    }

    /// Object key for an image stored at `millis`.
    pub fn object_key(self, id: i64, millis: i64) -> String {
        format!("{0}_images/{0}_{id}_{millis}.png", self.as_str())
    }
}

impl fmt::Display for ImageSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record that should receive an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageTarget {
    pub subject: ImageSubject,
    pub id: i64,
}

impl ImageTarget {
    pub fn user(id: i64) -> Self {
        Self {
            subject: ImageSubject::User,
            id,
        }
    }

    pub fn product(id: i64) -> Self {
        Self {
            subject: ImageSubject::Product,
            id,
        }
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.id)
    }
}
