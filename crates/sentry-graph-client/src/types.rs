use crate::errors::ClientError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A decoded provider record together with the JSON it was decoded from.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRecord<T> {
    pub data: T,
    pub raw: Value,
}

pub fn decode_record<T: DeserializeOwned>(
    endpoint: &str,
    raw: Value,
) -> Result<SourceRecord<T>, ClientError> {
    let data = T::deserialize(&raw).map_err(|err| ClientError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("record decode failed: {err}"),
    })?;
    Ok(SourceRecord { data, raw })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentryOrganization {
    #[serde(deserialize_with = "provider_id")]
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentryProjectRef {
    #[serde(deserialize_with = "provider_id")]
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentryTeam {
    #[serde(deserialize_with = "provider_id")]
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "memberCount")]
    pub member_count: Option<i64>,
    #[serde(default)]
    pub projects: Vec<SentryProjectRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentryProject {
    #[serde(deserialize_with = "provider_id")]
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

/// An organization member as returned by the members, users and team
/// members endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentryMember {
    #[serde(deserialize_with = "provider_id")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub pending: Option<bool>,
}

// Sentry sends ids as strings, but fixtures and older API versions use
// integers.
fn provider_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}
