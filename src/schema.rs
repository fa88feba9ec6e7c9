//! Dataset kinds and the logical schema each one expects.
//!
//! A [`RecordSchema`] lists the logical fields of a registry, the header
//! synonyms used to find each one, the positional fallbacks, and the
//! [`FieldRole`] that decides which canonicalization rule applies to it.
//! [`DatasetProfile`] carries the per-kind policy knobs.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::canon::{PhoneRules, ShortPhonePolicy};

/// What a logical field holds, and therefore how it is canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Region,
    TaxId,
    PostalCode,
    City,
    CityCode,
    Text,
    Address,
    AddressNumber,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
    /// Header synonyms, the field's own name first.
    pub synonyms: &'static [&'static str],
    /// Column used when no header matches and the table is wide enough.
    pub positional_fallback: Option<usize>,
}

impl FieldSpec {
    const fn new(name: &'static str, role: FieldRole, synonyms: &'static [&'static str]) -> Self {
        Self {
            name,
            role,
            synonyms,
            positional_fallback: None,
        }
    }

    const fn at_position(mut self, index: usize) -> Self {
        self.positional_fallback = Some(index);
        self
    }
}

const UF: FieldSpec = FieldSpec::new(
    "uf",
    FieldRole::Region,
    &["uf", "estado", "sigla_uf", "state", "region"],
);
const DOCUMENT: FieldSpec = FieldSpec::new(
    "document",
    FieldRole::TaxId,
    &["document", "cpf_cnpj", "cpfcnpj", "cnpjcpf", "documento", "doc", "tax_id"],
);
const POSTAL_CODE: FieldSpec = FieldSpec::new(
    "postal_code",
    FieldRole::PostalCode,
    &["postal_code", "cep", "codigo_postal", "zip"],
);
const CITY: FieldSpec = FieldSpec::new(
    "city",
    FieldRole::City,
    &["city", "cidade", "municipio"],
)
.at_position(5);
const CITY_CODE: FieldSpec = FieldSpec::new(
    "city_code",
    FieldRole::CityCode,
    &[
        "city_code",
        "codigo_cidade",
        "cod_cidade",
        "codigo_municipio",
        "cod_municipio",
        "ibge",
    ],
)
.at_position(6);
const CLIENT_NAME: FieldSpec = FieldSpec::new(
    "name",
    FieldRole::Text,
    &[
        "name",
        "razao_nome",
        "razao",
        "razao social",
        "razao_social",
        "nome",
        "nome_razao",
    ],
);
const SUPPLIER_NAME: FieldSpec = FieldSpec::new(
    "name",
    FieldRole::Text,
    &["name", "nome", "razao", "razao_social"],
);
const TRADE_NAME: FieldSpec = FieldSpec::new(
    "trade_name",
    FieldRole::Text,
    &["trade_name", "fantasia_apelido", "fantasia", "apelido", "nome_fantasia"],
);
const ADDRESS: FieldSpec = FieldSpec::new(
    "address",
    FieldRole::Address,
    &["address", "endereco", "logradouro"],
);
const NEIGHBORHOOD: FieldSpec = FieldSpec::new(
    "neighborhood",
    FieldRole::Text,
    &["neighborhood", "bairro"],
);
const COMPLEMENT: FieldSpec = FieldSpec::new(
    "complement",
    FieldRole::Text,
    &["complement", "complemento", "compl"],
);
const CONTACT: FieldSpec = FieldSpec::new(
    "contact",
    FieldRole::Text,
    &["contact", "contato", "responsavel"],
);
const CLIENT_PHONE: FieldSpec = FieldSpec::new(
    "phone_primary",
    FieldRole::Phone,
    &[
        "phone_primary",
        "tel_principal",
        "telefone",
        "telefone1",
        "tel1",
        "fone",
        "fone1",
    ],
);
const SUPPLIER_PHONE: FieldSpec = FieldSpec::new(
    "phone_primary",
    FieldRole::Phone,
    &["phone_primary", "fone", "telefone", "telefone1", "tel1"],
);
const PHONE_BUSINESS: FieldSpec = FieldSpec::new(
    "phone_business",
    FieldRole::Phone,
    &["phone_business", "tel_comercial", "telefone2", "tel2", "fone2"],
);
const ADDRESS_NUMBER: FieldSpec = FieldSpec::new(
    "address_number",
    FieldRole::AddressNumber,
    &["address_number", "numero", "num"],
);

const CLIENT_FIELDS: &[FieldSpec] = &[
    UF,
    DOCUMENT,
    POSTAL_CODE,
    CITY,
    CITY_CODE,
    CLIENT_NAME,
    ADDRESS,
    NEIGHBORHOOD,
    COMPLEMENT,
    CONTACT,
    TRADE_NAME,
    CLIENT_PHONE,
    PHONE_BUSINESS,
    ADDRESS_NUMBER,
];

const SUPPLIER_FIELDS: &[FieldSpec] = &[
    UF,
    DOCUMENT,
    POSTAL_CODE,
    CITY,
    CITY_CODE,
    SUPPLIER_NAME,
    TRADE_NAME,
    ADDRESS,
    NEIGHBORHOOD,
    CONTACT,
    SUPPLIER_PHONE,
    ADDRESS_NUMBER,
];

/// An ordered set of logical fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }

    /// Fields holding the given role, in schema order.
    pub fn fields_with_role(&self, role: FieldRole) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields.iter().filter(move |field| field.role == role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    #[default]
    Client,
    Supplier,
}

impl DatasetKind {
    pub fn schema(self) -> RecordSchema {
        match self {
            DatasetKind::Client => RecordSchema::new(CLIENT_FIELDS.to_vec()),
            DatasetKind::Supplier => RecordSchema::new(SUPPLIER_FIELDS.to_vec()),
        }
    }

    pub fn profile(self) -> DatasetProfile {
        match self {
            DatasetKind::Client => DatasetProfile {
                phone: PhoneRules {
                    min_digits: 8,
                    short_numbers: ShortPhonePolicy::KeepDigits,
                    spaced: false,
                },
                repair_text_encoding: false,
                keep_unmaskable_documents: false,
            },
            DatasetKind::Supplier => DatasetProfile {
                phone: PhoneRules {
                    min_digits: 7,
                    short_numbers: ShortPhonePolicy::Blank,
                    spaced: true,
                },
                repair_text_encoding: true,
                keep_unmaskable_documents: true,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Client => "client",
            DatasetKind::Supplier => "supplier",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind canonicalization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetProfile {
    pub phone: PhoneRules,
    /// Run mojibake repair on free text and city names.
    pub repair_text_encoding: bool,
    /// Keep a document whose digits fit no mask instead of blanking it.
    pub keep_unmaskable_documents: bool,
}
