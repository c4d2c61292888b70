use std::fmt;

use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateUserBody {
    pub name: String,
    pub job: String,
}

/// Registration payload. Missing fields are left out of the JSON entirely.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl RegistrationBody {
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

/// Ids come back as numbers from `/register` and as strings from `/users`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    Text(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{n}"),
            Id::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Every field any of the endpoints answers with, success or error.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseModel {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub job: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub token: Option<String>,
    pub error: Option<String>,
}
