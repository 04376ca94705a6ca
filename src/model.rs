//! Value objects supplied by the caller: the identifier behind a QR code and
//! the organisation an onboarding sheet is printed for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque identifier appended to the base URI of a scannable code.
///
/// Construction validates the value; any string that gets through can be
/// encoded (it is percent-escaped as a single path segment later on).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScannableId(String);

impl ScannableId {
    /// Longest identifier accepted, in characters. Keeps the encoded URI well
    /// below the capacity of a high error-correction symbol.
    pub const MAX_LEN: usize = 100;

    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::Encoding("identifier is empty".to_string()));
        }
        let len = value.chars().count();
        if len > Self::MAX_LEN {
            return Err(Error::Encoding(format!(
                "identifier is {len} characters long, the limit is {}",
                Self::MAX_LEN
            )));
        }
        if let Some(c) = value.chars().find(|c| c.is_control()) {
            return Err(Error::Encoding(format!(
                "identifier contains control character {:?}",
                c
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScannableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScannableId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ScannableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ScannableId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ScannableId> for String {
    fn from(id: ScannableId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(pub String);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Postal address. Parts may be empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub premise: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    pub fn new(
        premise: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        region: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            premise: premise.into(),
            street: street.into(),
            city: city.into(),
            region: region.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    /// Display lines with empty parts skipped, e.g.
    /// `["12 Elm St", "Manchester, New Hampshire 03101", "USA"]`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        let first = join_non_empty(&[&self.premise, &self.street], " ");
        if !first.is_empty() {
            lines.push(first);
        }

        let locality = join_non_empty(&[&self.city, &self.region], ", ");
        let locality = join_non_empty(&[&locality, &self.postal_code], " ");
        if !locality.is_empty() {
            lines.push(locality);
        }

        if !self.country.trim().is_empty() {
            lines.push(self.country.trim().to_string());
        }
        lines
    }
}

fn join_non_empty(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
}

impl ContactInfo {
    pub fn new(email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            phone: phone.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub address: Address,
    pub contact_name: String,
    pub contact_info: ContactInfo,
}
