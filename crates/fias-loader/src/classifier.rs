//! File name classification
//!
//! Archive members are named `<tag>_<yyyymmdd>_<suffix>`. A [`Classifier`]
//! holds an ordered list of `(pattern, key)` rules and returns the key of the
//! first pattern that matches the final path component.

use std::path::Path;

use regex::Regex;

use crate::schema::SchemaKey;

/// FIAS rules in priority order. Deletion extracts come first so that a tag
/// that is a prefix of another never shadows the longer one.
pub const FIAS_RULES: &[(&str, SchemaKey)] = &[
    (r"^AS_DEL_ADDROBJ_[0-9]{8}_.+", SchemaKey::DeletedAddressObject),
    (r"^AS_DEL_HOUSEINT_[0-9]{8}_.+", SchemaKey::DeletedHouseInterval),
    (r"^AS_DEL_HOUSE_[0-9]{8}_.+", SchemaKey::DeletedHouse),
    (r"^AS_DEL_NORMDOC_[0-9]{8}_.+", SchemaKey::DeletedNormativeDocument),
    (r"^AS_ACTSTAT_[0-9]{8}_.+", SchemaKey::ActualStatus),
    (r"^AS_ADDROBJ_[0-9]{8}_.+", SchemaKey::AddressObject),
    (r"^AS_CENTERST_[0-9]{8}_.+", SchemaKey::CenterStatus),
    (r"^AS_CURENTST_[0-9]{8}_.+", SchemaKey::CurrentStatus),
    (r"^AS_ESTSTAT_[0-9]{8}_.+", SchemaKey::EstateStatus),
    (r"^AS_HOUSEINT_[0-9]{8}_.+", SchemaKey::HouseInterval),
    (r"^AS_HOUSE_[0-9]{8}_.+", SchemaKey::House),
    (r"^AS_HSTSTAT_[0-9]{8}_.+", SchemaKey::HouseStateStatus),
    (r"^AS_INTVSTAT_[0-9]{8}_.+", SchemaKey::IntervalStatus),
    (r"^AS_LANDMARK_[0-9]{8}_.+", SchemaKey::Landmark),
    (r"^AS_NDOCTYPE_[0-9]{8}_.+", SchemaKey::NormativeDocumentType),
    (r"^AS_NORMDOC_[0-9]{8}_.+", SchemaKey::NormativeDocument),
    (r"^AS_OPERSTAT_[0-9]{8}_.+", SchemaKey::OperationStatus),
    (r"^AS_SOCRBASE_[0-9]{8}_.+", SchemaKey::AddressObjectType),
    (r"^AS_STRSTAT_[0-9]{8}_.+", SchemaKey::StructureStatus),
    (r"^AS_STEAD_[0-9]{8}_.+", SchemaKey::Stead),
    (r"^AS_ROOM_[0-9]{8}_.+", SchemaKey::Room),
];

/// Ordered rule table; first match wins
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(Regex, SchemaKey)>,
}

impl Classifier {
    /// Compile `rules`, keeping their order
    pub fn new(rules: &[(&str, SchemaKey)]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|(pattern, key)| Ok((Regex::new(pattern)?, *key)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    pub fn fias() -> Result<Self, regex::Error> {
        Self::new(FIAS_RULES)
    }

    pub fn classify(&self, file_name: &str) -> Option<SchemaKey> {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(file_name))
            .map(|(_, key)| *key)
    }

    /// Classify by the final component of `path` only
    pub fn classify_path(&self, path: &Path) -> Option<SchemaKey> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.classify(name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
