use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Summary keys the backend uses to label a group, in lookup order.
pub const GROUP_KEY_FIELDS: &[&str] = &["Isbn", "Seller"];

/// Backend primary key of a scraped offer. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DetailId(i64);

impl DetailId {
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::InvalidDetailId(id.to_string()));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl FromStr for DetailId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let id = trimmed
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidDetailId(trimmed.to_string()))?;
        Self::new(id)
    }
}

impl TryFrom<i64> for DetailId {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DetailId> for i64 {
    fn from(id: DetailId) -> Self {
        id.0
    }
}

impl fmt::Display for DetailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterestState {
    #[default]
    Pending,
    Interested,
    NotInterested,
}

impl InterestState {
    pub const ALL: [Self; 3] = [Self::Pending, Self::Interested, Self::NotInterested];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Interested => "interested",
            Self::NotInterested => "not_interested",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Interested => "Interested",
            Self::NotInterested => "Not interested",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Interested | Self::NotInterested)
    }

    /// Next state after `control` is activated. Each control toggles between
    /// its own terminal state and `Pending`; activating it from the other
    /// terminal state takes over the field, which resets the other control.
    #[must_use]
    pub const fn after(self, control: InterestControl) -> Self {
        match (control, self) {
            (InterestControl::MarkInterested, Self::Interested) => Self::Pending,
            (InterestControl::MarkInterested, Self::Pending | Self::NotInterested) => {
                Self::Interested
            }
            (InterestControl::MarkNotInterested, Self::NotInterested) => Self::Pending,
            (InterestControl::MarkNotInterested, Self::Pending | Self::Interested) => {
                Self::NotInterested
            }
        }
    }

    #[must_use]
    pub const fn display(self) -> ControlDisplay {
        ControlDisplay {
            interested_active: matches!(self, Self::Interested),
            not_interested_active: matches!(self, Self::NotInterested),
        }
    }
}

impl FromStr for InterestState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" | "" => Ok(Self::Pending),
            "interested" => Ok(Self::Interested),
            "not_interested" | "notinterested" => Ok(Self::NotInterested),
            other => Err(ValidationError::UnknownInterest(other.to_string())),
        }
    }
}

impl fmt::Display for InterestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two independent interest controls rendered on a listing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestControl {
    /// The star.
    MarkInterested,
    /// The dismiss cross.
    MarkNotInterested,
}

impl InterestControl {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarkInterested => "mark_interested",
            Self::MarkNotInterested => "mark_not_interested",
        }
    }
}

impl fmt::Display for InterestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two interest controls render as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControlDisplay {
    pub interested_active: bool,
    pub not_interested_active: bool,
}

#[must_use]
pub const fn toggle_contact(current: bool) -> bool {
    !current
}

/// A listing field the tracker mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Interest,
    Contact,
}

impl Field {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interest => "interest",
            Self::Contact => "contact",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One tracked book offer. Only `interest` and `contact` are ever mutated;
/// everything else is carried through for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub detail_id: DetailId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interest: InterestState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contact: bool,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl Listing {
    #[must_use]
    pub fn new(detail_id: DetailId) -> Self {
        Self {
            detail_id,
            interest: InterestState::Pending,
            contact: false,
            display: Map::new(),
        }
    }

    #[must_use]
    pub fn with_interest(mut self, interest: InterestState) -> Self {
        self.interest = interest;
        self
    }

    #[must_use]
    pub fn with_contact(mut self, contact: bool) -> Self {
        self.contact = contact;
        self
    }

    #[must_use]
    pub fn with_display(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.display.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn display_str(&self, key: &str) -> Option<&str> {
        self.display.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingGroup {
    pub results: Vec<Listing>,
    /// Per-group figures (`Available Books`, `Average Price`, ...) as sent.
    #[serde(flatten)]
    pub summary: Map<String, Value>,
}

impl ListingGroup {
    #[must_use]
    pub fn new(key_field: &str, key: impl Into<String>, results: Vec<Listing>) -> Self {
        let mut summary = Map::new();
        summary.insert(key_field.to_string(), Value::String(key.into()));
        Self { results, summary }
    }

    #[must_use]
    pub fn ungrouped(results: Vec<Listing>) -> Self {
        Self {
            results,
            summary: Map::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        GROUP_KEY_FIELDS
            .iter()
            .find_map(|field| self.summary.get(*field).and_then(Value::as_str))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsPayload {
    Grouped(Vec<ListingGroup>),
    Flat(Vec<Listing>),
}

/// Parses a results body. Grouped responses are kept as sent; a flat list of
/// listings (no `group_by`) becomes a single unlabelled group.
pub fn parse_results(body: &[u8]) -> Result<Vec<ListingGroup>, serde_json::Error> {
    let payload: ResultsPayload = serde_json::from_slice(body)?;
    Ok(match payload {
        ResultsPayload::Grouped(groups) => groups,
        ResultsPayload::Flat(listings) if listings.is_empty() => Vec::new(),
        ResultsPayload::Flat(listings) => vec![ListingGroup::ungrouped(listings)],
    })
}
