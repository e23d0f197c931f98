use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::dne::cep::normalize_cep;
use crate::dne::reference::ReferenceTables;

fn field(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or("").trim().to_string()
}

/// Provenance tag carried by every stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "localidade")]
    Locality,
    #[serde(rename = "logradouro")]
    Street,
    #[serde(rename = "grande_usuario")]
    LargeUser,
    #[serde(rename = "unid_oper")]
    OperationalUnit,
    #[serde(rename = "cpc")]
    Cpc,
}

impl Origin {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Origin::Locality => "localidade",
            Origin::Street => "logradouro",
            Origin::LargeUser => "grande_usuario",
            Origin::OperationalUnit => "unid_oper",
            Origin::Cpc => "cpc",
        }
    }
}

/// The unified address document persisted per CEP. Field names match the
/// public JSON contract; empty optional fields are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDocument {
    pub cep: String,
    #[serde(default)]
    pub logradouro: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub complemento: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bairro: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cidade: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uf: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub codigo_ibge: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tipo_logradouro: String,
    pub tipo_origem: Origin,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nome_origem: String,
}

impl AddressDocument {
    fn empty(cep: String, origin: Origin) -> Self {
        Self {
            cep,
            logradouro: String::new(),
            complemento: String::new(),
            bairro: String::new(),
            cidade: String::new(),
            uf: String::new(),
            codigo_ibge: String::new(),
            tipo_logradouro: String::new(),
            tipo_origem: origin,
            nome_origem: String::new(),
        }
    }
}

/// A city/town row from LOG_LOCALIDADE.TXT.
#[derive(Debug, Clone)]
pub struct Locality {
    pub code: String,
    pub uf: String,
    pub name: String,
    /// Normalized at load time; empty when the locality has no general CEP.
    pub general_cep: String,
    pub situation: String,
    pub kind: String,
    pub sub_code: String,
    pub short_name: String,
    pub ibge_code: String,
}

impl Locality {
    pub const MIN_FIELDS: usize = 9;

    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() < Self::MIN_FIELDS {
            return None;
        }
        Some(Self {
            code: field(record, 0),
            uf: field(record, 1),
            name: field(record, 2),
            general_cep: normalize_cep(&field(record, 3)).unwrap_or_default(),
            situation: field(record, 4),
            kind: field(record, 5),
            sub_code: field(record, 6),
            short_name: field(record, 7),
            ibge_code: field(record, 8),
        })
    }

    /// Emits the city-level document for localities that carry a general CEP.
    pub fn general_cep_document(&self) -> Option<AddressDocument> {
        if self.general_cep.is_empty() {
            return None;
        }
        let mut document = AddressDocument::empty(self.general_cep.clone(), Origin::Locality);
        document.cidade = self.name.clone();
        document.uf = self.uf.clone();
        document.codigo_ibge = self.ibge_code.clone();
        Some(document)
    }
}

/// A neighborhood row from LOG_BAIRRO.TXT.
#[derive(Debug, Clone)]
pub struct District {
    pub code: String,
    pub uf: String,
    pub locality_code: String,
    pub name: String,
    pub short_name: String,
}

impl District {
    pub const MIN_FIELDS: usize = 4;

    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() < Self::MIN_FIELDS {
            return None;
        }
        Some(Self {
            code: field(record, 0),
            uf: field(record, 1),
            locality_code: field(record, 2),
            name: field(record, 3),
            short_name: field(record, 4),
        })
    }
}

/// A per-street row from LOG_LOGRADOURO_<UF>.TXT, one per (street, cep) pair.
#[derive(Debug, Clone)]
pub struct StreetRecord {
    pub code: String,
    pub uf: String,
    pub locality_code: String,
    pub district_start_code: String,
    pub district_end_code: String,
    pub name: String,
    pub complement: String,
    /// Normalized at parse time; empty when the row's CEP is rejected.
    pub cep: String,
    pub street_type: String,
    pub type_usage_flag: String,
    pub short_name: String,
}

impl StreetRecord {
    pub const MIN_FIELDS: usize = 8;

    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() < Self::MIN_FIELDS {
            return None;
        }
        Some(Self {
            code: field(record, 0),
            uf: field(record, 1),
            locality_code: field(record, 2),
            district_start_code: field(record, 3),
            district_end_code: field(record, 4),
            name: field(record, 5),
            complement: field(record, 6),
            cep: normalize_cep(&field(record, 7)).unwrap_or_default(),
            street_type: field(record, 8),
            type_usage_flag: field(record, 9),
            short_name: field(record, 10),
        })
    }

    /// The display line for the street. The DNE carries the street type
    /// ("Avenida", "Rua") separately from the name, with a per-row flag
    /// saying whether the type belongs in the display form. An empty flag
    /// keeps the type, which matches how the upstream directory is used.
    fn display_line(&self) -> String {
        if !self.street_type.is_empty()
            && matches!(self.type_usage_flag.as_str(), "S" | "s" | "")
        {
            format!("{} {}", self.street_type, self.name)
                .trim()
                .to_string()
        } else {
            self.name.clone()
        }
    }

    pub fn document(&self, tables: &ReferenceTables) -> Option<AddressDocument> {
        if self.cep.is_empty() {
            return None;
        }
        let mut document = AddressDocument::empty(self.cep.clone(), Origin::Street);
        document.logradouro = self.display_line();
        document.complemento = self.complement.clone();
        document.tipo_logradouro = self.street_type.clone();
        if let Some(district) = tables.district(&self.district_start_code) {
            document.bairro = district.name.clone();
        }
        if let Some(locality) = tables.locality(&self.locality_code) {
            document.cidade = locality.name.clone();
            document.uf = locality.uf.clone();
            document.codigo_ibge = locality.ibge_code.clone();
        }
        Some(document)
    }
}

/// A special-destination row: large users (LOG_GRANDE_USUARIO.TXT) and
/// operational units (LOG_UNID_OPER.TXT) share this column layout.
#[derive(Debug, Clone)]
pub struct DestinationRecord {
    pub code: String,
    pub uf: String,
    pub locality_code: String,
    pub district_code: String,
    pub street_code: String,
    pub name: String,
    pub address: String,
    /// Normalized at parse time; empty when the row's CEP is rejected.
    pub cep: String,
    pub short_name: String,
}

impl DestinationRecord {
    pub const MIN_FIELDS: usize = 8;

    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() < Self::MIN_FIELDS {
            return None;
        }
        Some(Self {
            code: field(record, 0),
            uf: field(record, 1),
            locality_code: field(record, 2),
            district_code: field(record, 3),
            street_code: field(record, 4),
            name: field(record, 5),
            address: field(record, 6),
            cep: normalize_cep(&field(record, 7)).unwrap_or_default(),
            short_name: field(record, 8),
        })
    }

    pub fn document(&self, tables: &ReferenceTables, origin: Origin) -> Option<AddressDocument> {
        if self.cep.is_empty() {
            return None;
        }
        let mut document = AddressDocument::empty(self.cep.clone(), origin);
        document.logradouro = self.address.clone();
        document.nome_origem = self.name.clone();
        if let Some(district) = tables.district(&self.district_code) {
            document.bairro = district.name.clone();
        }
        if let Some(locality) = tables.locality(&self.locality_code) {
            document.cidade = locality.name.clone();
            document.uf = locality.uf.clone();
            document.codigo_ibge = locality.ibge_code.clone();
        }
        Some(document)
    }
}

/// A community postal sub-center row from LOG_CPC.TXT. CPC rows carry no
/// district reference, so the projected document has an empty `bairro`.
#[derive(Debug, Clone)]
pub struct CpcRecord {
    pub code: String,
    pub uf: String,
    pub locality_code: String,
    pub name: String,
    pub address: String,
    /// Normalized at parse time; empty when the row's CEP is rejected.
    pub cep: String,
}

impl CpcRecord {
    pub const MIN_FIELDS: usize = 6;

    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() < Self::MIN_FIELDS {
            return None;
        }
        Some(Self {
            code: field(record, 0),
            uf: field(record, 1),
            locality_code: field(record, 2),
            name: field(record, 3),
            address: field(record, 4),
            cep: normalize_cep(&field(record, 5)).unwrap_or_default(),
        })
    }

    pub fn document(&self, tables: &ReferenceTables) -> Option<AddressDocument> {
        if self.cep.is_empty() {
            return None;
        }
        let mut document = AddressDocument::empty(self.cep.clone(), Origin::Cpc);
        document.logradouro = self.address.clone();
        document.nome_origem = self.name.clone();
        if let Some(locality) = tables.locality(&self.locality_code) {
            document.cidade = locality.name.clone();
            document.uf = locality.uf.clone();
            document.codigo_ibge = locality.ibge_code.clone();
        }
        Some(document)
    }
}
