//! FIAS record catalogue
//!
//! Each [`SchemaKey`] names one kind of archive member and maps to the
//! element, table and columns used to load it. Deletion extracts share the
//! record shape of their live counterparts but land in their own tables.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::{Column, RecordSchema};

/// Classification key linking a file name to a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaKey {
    ActualStatus,
    AddressObject,
    CenterStatus,
    CurrentStatus,
    DeletedAddressObject,
    DeletedHouse,
    DeletedHouseInterval,
    DeletedNormativeDocument,
    EstateStatus,
    House,
    HouseInterval,
    HouseStateStatus,
    IntervalStatus,
    Landmark,
    NormativeDocumentType,
    NormativeDocument,
    OperationStatus,
    AddressObjectType,
    StructureStatus,
    Stead,
    Room,
}

impl SchemaKey {
    pub const ALL: [SchemaKey; 21] = [
        SchemaKey::ActualStatus,
        SchemaKey::AddressObject,
        SchemaKey::CenterStatus,
        SchemaKey::CurrentStatus,
        SchemaKey::DeletedAddressObject,
        SchemaKey::DeletedHouse,
        SchemaKey::DeletedHouseInterval,
        SchemaKey::DeletedNormativeDocument,
        SchemaKey::EstateStatus,
        SchemaKey::House,
        SchemaKey::HouseInterval,
        SchemaKey::HouseStateStatus,
        SchemaKey::IntervalStatus,
        SchemaKey::Landmark,
        SchemaKey::NormativeDocumentType,
        SchemaKey::NormativeDocument,
        SchemaKey::OperationStatus,
        SchemaKey::AddressObjectType,
        SchemaKey::StructureStatus,
        SchemaKey::Stead,
        SchemaKey::Room,
    ];

    /// File tag used in archive member names, e.g. `AS_DEL_HOUSE`
    pub fn tag(self) -> &'static str {
        match self {
            SchemaKey::ActualStatus => "AS_ACTSTAT",
            SchemaKey::AddressObject => "AS_ADDROBJ",
            SchemaKey::CenterStatus => "AS_CENTERST",
            SchemaKey::CurrentStatus => "AS_CURENTST",
            SchemaKey::DeletedAddressObject => "AS_DEL_ADDROBJ",
            SchemaKey::DeletedHouse => "AS_DEL_HOUSE",
            SchemaKey::DeletedHouseInterval => "AS_DEL_HOUSEINT",
            SchemaKey::DeletedNormativeDocument => "AS_DEL_NORMDOC",
            SchemaKey::EstateStatus => "AS_ESTSTAT",
            SchemaKey::House => "AS_HOUSE",
            SchemaKey::HouseInterval => "AS_HOUSEINT",
            SchemaKey::HouseStateStatus => "AS_HSTSTAT",
            SchemaKey::IntervalStatus => "AS_INTVSTAT",
            SchemaKey::Landmark => "AS_LANDMARK",
            SchemaKey::NormativeDocumentType => "AS_NDOCTYPE",
            SchemaKey::NormativeDocument => "AS_NORMDOC",
            SchemaKey::OperationStatus => "AS_OPERSTAT",
            SchemaKey::AddressObjectType => "AS_SOCRBASE",
            SchemaKey::StructureStatus => "AS_STRSTAT",
            SchemaKey::Stead => "AS_STEAD",
            SchemaKey::Room => "AS_ROOM",
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SchemaKey {
    type Err = String;

    /// Accepts the file tag with or without the `AS_` prefix, any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        SchemaKey::ALL
            .into_iter()
            .find(|key| {
                key.tag() == wanted || key.tag().strip_prefix("AS_") == Some(wanted.as_str())
            })
            .ok_or_else(|| format!("unknown schema key: {s}"))
    }
}

/// Classification key -> record schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaKey, RecordSchema>,
}

impl SchemaRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The full FIAS catalogue
    pub fn fias() -> Self {
        let mut registry = Self::new();
        for key in SchemaKey::ALL {
            registry.register(key, fias_schema(key));
        }
        registry
    }

    pub fn register(&mut self, key: SchemaKey, schema: RecordSchema) -> &mut Self {
        self.schemas.insert(key, schema);
        self
    }

    pub fn get(&self, key: SchemaKey) -> Option<&RecordSchema> {
        self.schemas.get(&key)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn fias_schema(key: SchemaKey) -> RecordSchema {
    let (table, element, columns) = match key {
        SchemaKey::ActualStatus => ("actual_status", "ActualStatus", ACTUAL_STATUS),
        SchemaKey::AddressObject => ("address_objects", "Object", ADDRESS_OBJECT),
        SchemaKey::CenterStatus => ("center_status", "CenterStatus", CENTER_STATUS),
        SchemaKey::CurrentStatus => ("current_status", "CurrentStatus", CURRENT_STATUS),
        SchemaKey::DeletedAddressObject => ("del_address_objects", "Object", ADDRESS_OBJECT),
        SchemaKey::DeletedHouse => ("del_house", "House", HOUSE),
        SchemaKey::DeletedHouseInterval => ("del_house_interval", "HouseInterval", HOUSE_INTERVAL),
        SchemaKey::DeletedNormativeDocument => {
            ("del_normative_document", "NormativeDocument", NORMATIVE_DOCUMENT)
        }
        SchemaKey::EstateStatus => ("estate_status", "EstateStatus", ESTATE_STATUS),
        SchemaKey::House => ("house", "House", HOUSE),
        SchemaKey::HouseInterval => ("house_interval", "HouseInterval", HOUSE_INTERVAL),
        SchemaKey::HouseStateStatus => {
            ("house_state_status", "HouseStateStatus", HOUSE_STATE_STATUS)
        }
        SchemaKey::IntervalStatus => ("interval_status", "IntervalStatus", INTERVAL_STATUS),
        SchemaKey::Landmark => ("landmark", "Landmark", LANDMARK),
        SchemaKey::NormativeDocumentType => {
            ("normative_document_type", "NormativeDocumentType", NORMATIVE_DOCUMENT_TYPE)
        }
        SchemaKey::NormativeDocument => {
            ("normative_document", "NormativeDocument", NORMATIVE_DOCUMENT)
        }
        SchemaKey::OperationStatus => ("operation_status", "OperationStatus", OPERATION_STATUS),
        SchemaKey::AddressObjectType => {
            ("address_object_type", "AddressObjectType", ADDRESS_OBJECT_TYPE)
        }
        SchemaKey::StructureStatus => ("structure_status", "StructureStatus", STRUCTURE_STATUS),
        SchemaKey::Stead => ("steads", "Stead", STEAD),
        SchemaKey::Room => ("rooms", "Room", ROOM),
    };

    RecordSchema { table, element, columns }
}

// ============================================================================
// Column catalogue
// ============================================================================

const ACTUAL_STATUS: &[Column] = &[
    Column::integer("actstatid", "ACTSTATID"),
    Column::text("name", "NAME"),
];

const ADDRESS_OBJECT: &[Column] = &[
    Column::text("aoguid", "AOGUID"),
    Column::text("formalname", "FORMALNAME"),
    Column::text("regioncode", "REGIONCODE"),
    Column::text("autocode", "AUTOCODE"),
    Column::text("areacode", "AREACODE"),
    Column::text("citycode", "CITYCODE"),
    Column::text("ctarcode", "CTARCODE"),
    Column::text("placecode", "PLACECODE"),
    Column::text("streetcode", "STREETCODE"),
    Column::text("extrcode", "EXTRCODE"),
    Column::text("sextcode", "SEXTCODE"),
    Column::text("offname", "OFFNAME"),
    Column::text("postalcode", "POSTALCODE"),
    Column::text("ifnsfl", "IFNSFL"),
    Column::text("terrifnsfl", "TERRIFNSFL"),
    Column::text("ifnsul", "IFNSUL"),
    Column::text("terrifnsul", "TERRIFNSUL"),
    Column::text("okato", "OKATO"),
    Column::text("oktmo", "OKTMO"),
    Column::text("updatedate", "UPDATEDATE"),
    Column::text("shortname", "SHORTNAME"),
    Column::integer("aolevel", "AOLEVEL"),
    Column::text("parentguid", "PARENTGUID"),
    Column::text("aoid", "AOID"),
    Column::text("previd", "PREVID"),
    Column::text("nextid", "NEXTID"),
    Column::text("code", "CODE"),
    Column::text("plaincode", "PLAINCODE"),
    Column::integer("actstatus", "ACTSTATUS"),
    Column::integer("centstatus", "CENTSTATUS"),
    Column::integer("operstatus", "OPERSTATUS"),
    Column::integer("currstatus", "CURRSTATUS"),
    Column::text("startdate", "STARTDATE"),
    Column::text("enddate", "ENDDATE"),
    Column::text("normdoc", "NORMDOC"),
    Column::byte("livestatus", "LIVESTATUS"),
    Column::text("cadnum", "CADNUM"),
    Column::integer("divtype", "DIVTYPE"),
];

const CENTER_STATUS: &[Column] = &[
    Column::integer("centerstid", "CENTERSTID"),
    Column::text("name", "NAME"),
];

const CURRENT_STATUS: &[Column] = &[
    Column::integer("curentstid", "CURENTSTID"),
    Column::text("name", "NAME"),
];

const ESTATE_STATUS: &[Column] = &[
    Column::integer("eststatid", "ESTSTATID"),
    Column::text("name", "NAME"),
    Column::text("shortname", "SHORTNAME"),
];

const HOUSE: &[Column] = &[
    Column::text("postalcode", "POSTALCODE"),
    Column::text("regioncode", "REGIONCODE"),
    Column::text("ifnsfl", "IFNSFL"),
    Column::text("terrifnsfl", "TERRIFNSFL"),
    Column::text("ifnsul", "IFNSUL"),
    Column::text("terrifnsul", "TERRIFNSUL"),
    Column::text("okato", "OKATO"),
    Column::text("oktmo", "OKTMO"),
    Column::text("updatedate", "UPDATEDATE"),
    Column::text("housenum", "HOUSENUM"),
    Column::integer("eststatus", "ESTSTATUS"),
    Column::text("buildnum", "BUILDNUM"),
    Column::text("strucnum", "STRUCNUM"),
    Column::integer("strstatus", "STRSTATUS"),
    Column::text("houseid", "HOUSEID"),
    Column::text("houseguid", "HOUSEGUID"),
    Column::text("aoguid", "AOGUID"),
    Column::text("startdate", "STARTDATE"),
    Column::text("enddate", "ENDDATE"),
    Column::integer("statstatus", "STATSTATUS"),
    Column::text("normdoc", "NORMDOC"),
    Column::integer("counter", "COUNTER"),
    Column::text("cadnum", "CADNUM"),
    // Existing house tables spell the column "dvitype"; the extract attribute is DIVTYPE
    Column::integer("dvitype", "DIVTYPE"),
];

const HOUSE_INTERVAL: &[Column] = &[
    Column::text("postalcode", "POSTALCODE"),
    Column::text("ifnsfl", "IFNSFL"),
    Column::text("terrifnsfl", "TERRIFNSFL"),
    Column::text("ifnsul", "IFNSUL"),
    Column::text("terrifnsul", "TERRIFNSUL"),
    Column::text("okato", "OKATO"),
    Column::text("oktmo", "OKTMO"),
    Column::text("updatedate", "UPDATEDATE"),
    Column::integer("intstart", "INTSTART"),
    Column::integer("intend", "INTEND"),
    Column::text("houseintid", "HOUSEINTID"),
    Column::text("intguid", "INTGUID"),
    Column::text("aoguid", "AOGUID"),
    Column::text("startdate", "STARTDATE"),
    Column::text("enddate", "ENDDATE"),
    Column::integer("intstatus", "INTSTATUS"),
    Column::text("normdoc", "NORMDOC"),
    Column::integer("counter", "COUNTER"),
];

const HOUSE_STATE_STATUS: &[Column] = &[
    Column::integer("housestid", "HOUSESTID"),
    Column::text("name", "NAME"),
];

const INTERVAL_STATUS: &[Column] = &[
    Column::integer("intvstatid", "INTVSTATID"),
    Column::text("name", "NAME"),
];

const LANDMARK: &[Column] = &[
    Column::text("location", "LOCATION"),
    Column::text("regioncode", "REGIONCODE"),
    Column::text("postalcode", "POSTALCODE"),
    Column::text("ifnsfl", "IFNSFL"),
    Column::text("terrifnsfl", "TERRIFNSFL"),
    Column::text("ifnsul", "IFNSUL"),
    Column::text("terrifnsul", "TERRIFNSUL"),
    Column::text("okato", "OKATO"),
    Column::text("oktmo", "OKTMO"),
    Column::text("updatedate", "UPDATEDATE"),
    Column::text("landid", "LANDID"),
    Column::text("landguid", "LANDGUID"),
    Column::text("aoguid", "AOGUID"),
    Column::text("startdate", "STARTDATE"),
    Column::text("enddate", "ENDDATE"),
    Column::text("normdoc", "NORMDOC"),
    Column::text("cadnum", "CADNUM"),
];

const NORMATIVE_DOCUMENT_TYPE: &[Column] = &[
    Column::integer("ndtypeid", "NDTYPEID"),
    Column::text("name", "NAME"),
];

const NORMATIVE_DOCUMENT: &[Column] = &[
    Column::text("normdocid", "NORMDOCID"),
    Column::text("docname", "DOCNAME"),
    Column::text("docdate", "DOCDATE"),
    Column::text("docnum", "DOCNUM"),
    Column::integer("doctype", "DOCTYPE"),
    Column::integer("docimgid", "DOCIMGID"),
];

const OPERATION_STATUS: &[Column] = &[
    Column::integer("operstatid", "OPERSTATID"),
    Column::text("name", "NAME"),
];

const ROOM: &[Column] = &[
    Column::text("roomguid", "ROOMGUID"),
    Column::text("flatnumber", "FLATNUMBER"),
    Column::integer("flattype", "FLATTYPE"),
    Column::text("roomnumber", "ROOMNUMBER"),
    Column::integer("roomtype", "ROOMTYPE"),
    Column::text("regioncode", "REGIONCODE"),
    Column::text("postalcode", "POSTALCODE"),
    Column::text("updatedate", "UPDATEDATE"),
    Column::text("houseguid", "HOUSEGUID"),
    Column::text("roomid", "ROOMID"),
    Column::text("previd", "PREVID"),
    Column::text("nextid", "NEXTID"),
    Column::text("startdate", "STARTDATE"),
    Column::text("enddate", "ENDDATE"),
    Column::text("livestatus", "LIVESTATUS"),
    Column::text("normdoc", "NORMDOC"),
    Column::integer("operstatus", "OPERSTATUS"),
    Column::text("cadnum", "CADNUM"),
    Column::text("roomcadnum", "ROOMCADNUM"),
];

const ADDRESS_OBJECT_TYPE: &[Column] = &[
    Column::integer("level", "LEVEL"),
    Column::text("scname", "SCNAME"),
    Column::text("socrname", "SOCRNAME"),
    Column::text("kodtst", "KOD_T_ST"),
];

const STEAD: &[Column] = &[
    Column::text("steadguid", "STEADGUID"),
    Column::text("number", "NUMBER"),
    Column::text("regioncode", "REGIONCODE"),
    Column::text("postalcode", "POSTALCODE"),
    Column::text("ifnsfl", "IFNSFL"),
    Column::text("terrifnsfl", "TERRIFNSFL"),
    Column::text("ifnsul", "IFNSUL"),
    Column::text("terrifnsul", "TERRIFNSUL"),
    Column::text("okato", "OKATO"),
    Column::text("oktmo", "OKTMO"),
    Column::text("updatedate", "UPDATEDATE"),
    Column::text("parentguid", "PARENTGUID"),
    Column::text("steadid", "STEADID"),
    Column::text("previd", "PREVID"),
    Column::text("nextid", "NEXTID"),
    Column::integer("operstatus", "OPERSTATUS"),
    Column::text("startdate", "STARTDATE"),
    Column::text("enddate", "ENDDATE"),
    Column::text("normdoc", "NORMDOC"),
    Column::byte("livestatus", "LIVESTATUS"),
    Column::text("cadnum", "CADNUM"),
    Column::integer("divtype", "DIVTYPE"),
];

const STRUCTURE_STATUS: &[Column] = &[
    Column::integer("strstatid", "STRSTATID"),
    Column::text("name", "NAME"),
    Column::text("shortname", "SHORTNAME"),
];
