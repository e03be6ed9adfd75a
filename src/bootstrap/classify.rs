use std::fmt;

/// SQLSTATE codes that mean the database, schema or table is not provisioned yet.
pub const MISSING_SCHEMA_CODES: &[&str] = &[
    "3D000", // invalid_catalog_name
    "42P01", // undefined_table
    "3F000", // invalid_schema_name
    "08001", // sqlclient_unable_to_establish_sqlconnection
    "08006", // connection_failure
    "28P01", // invalid_password, seen when credentials are reset after provisioning
];

const MISSING_SCHEMA_PHRASES: &[&str] = &[
    "does not exist",
    "undefined table",
    "invalid catalog name",
    "invalid schema name",
];

pub const DUPLICATE_DATABASE: &str = "42P04";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    pub code: Option<String>,
    pub message: String,
}

impl DbError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn with_code(code: &str, message: impl Into<String>) -> Self {
        Self::new(Some(code), message)
    }

    pub fn plain(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    pub fn is_missing_schema(&self) -> bool {
        is_missing_schema(self.code.as_deref(), &self.message)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (SQLSTATE {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Classifies a failure by vendor code first, then by message text.
pub fn is_missing_schema(code: Option<&str>, message: &str) -> bool {
    if code.is_some_and(|c| MISSING_SCHEMA_CODES.contains(&c)) {
        return true;
    }
    let message = message.to_lowercase();
    MISSING_SCHEMA_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}

impl std::error::Error for DbError {}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        let code = err.code().map(|state| state.code().to_string());
        let message = match err.as_db_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };
        Self { code, message }
    }
}
