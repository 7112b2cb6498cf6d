use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(pub String);

impl core::fmt::Display for MerchantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MerchantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Read-only reference data; the ledger only needs the id and the display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    pub fn new(id: &str, name: &str, kind: &str, address: &str) -> Self {
        let now = Utc::now();
        Self {
            id: MerchantId::from(id),
            name: name.to_owned(),
            kind: kind.to_owned(),
            address: address.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }
}
