//! One full canonicalization run over an in-memory table.
//!
//! The run moves through three phases, each consuming the previous one:
//!
//! 1. [`RecordPipeline::setup`] resolves columns, widens the table with
//!    synthesized columns and normalizes the defaults.
//! 2. [`RecordPipeline::transform`] walks the rows in order and rewrites
//!    their cells in place.
//! 3. [`TransformedRun::finalize`] hands back the table, the change log and
//!    the run summary.
//!
//! Nothing in phases 2 and 3 can fail.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    canon::{
        extract_address_number, extract_digits_from_str, mask_phone, mask_postal_code,
        mask_tax_id, normalize_area_code, POSTAL_CODE_DIGITS,
    },
    data::{CellValue, Table},
    reference::ReferenceIndex,
    resolve::{ColumnMap, resolve_columns},
    schema::{DatasetKind, DatasetProfile, FieldRole, RecordSchema},
    text::{repair_mojibake, sanitize_text, title_case},
};

/// Fallback values used when a row and the reference both come up empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub region: String,
    pub city: String,
    pub city_code: String,
    pub postal_code: String,
    pub area_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDefaults {
    pub region: Option<String>,
    pub city: Option<String>,
    pub city_code: Option<String>,
    pub postal_code: String,
    pub area_code: String,
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl RunDefaults {
    /// Upper-cases the region, runs the city through the reference's name
    /// normalizer (shown in title case), masks the postal code and reduces
    /// the area code to two digits.
    pub fn normalize(&self, index: &ReferenceIndex) -> NormalizedDefaults {
        let postal_digits = format!(
            "{:0>width$}",
            extract_digits_from_str(&self.postal_code),
            width = POSTAL_CODE_DIGITS
        );
        NormalizedDefaults {
            region: non_empty(self.region.trim().to_uppercase()),
            city: non_empty(title_case(&index.name_key(&self.city))),
            city_code: non_empty(self.city_code.trim().to_string()),
            postal_code: mask_postal_code(&CellValue::text(postal_digits), ""),
            area_code: normalize_area_code(&self.area_code),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub schema: RecordSchema,
    pub profile: DatasetProfile,
    pub defaults: RunDefaults,
}

impl PipelineOptions {
    pub fn for_kind(kind: DatasetKind, defaults: RunDefaults) -> Self {
        Self {
            schema: kind.schema(),
            profile: kind.profile(),
            defaults,
        }
    }
}

/// Names of the columns that had to be created because no header matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeLog {
    pub created_columns: Vec<String>,
}

impl ChangeLog {
    pub fn is_empty(&self) -> bool {
        self.created_columns.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    /// Cells whose rendered value changed, per logical field.
    pub rewritten: BTreeMap<String, usize>,
    /// Cells filled from a configured default, per logical field.
    pub defaults_applied: BTreeMap<String, usize>,
    pub reference_hits: usize,
    pub reference_misses: usize,
    pub created_columns: Vec<String>,
}

impl RunSummary {
    fn rewritten(&mut self, field: &str) {
        *self.rewritten.entry(field.to_string()).or_insert(0) += 1;
    }

    fn defaulted(&mut self, field: &str) {
        *self.defaults_applied.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn total_rewritten(&self) -> usize {
        self.rewritten.values().sum()
    }
}

/// Column positions of the fields each rule touches, looked up once.
#[derive(Debug, Clone, Default)]
struct FieldSlots {
    region: Option<Slot>,
    document: Option<Slot>,
    postal_code: Option<Slot>,
    city: Option<Slot>,
    city_code: Option<Slot>,
    address: Option<Slot>,
    address_number: Option<Slot>,
    text: Vec<Slot>,
    phones: Vec<Slot>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    field: &'static str,
    index: usize,
}

impl FieldSlots {
    fn locate(schema: &RecordSchema, columns: &ColumnMap) -> Self {
        let slot_for = |role: FieldRole| -> Vec<Slot> {
            schema
                .fields_with_role(role)
                .filter_map(|field| {
                    columns.index_of(field.name).map(|index| Slot {
                        field: field.name,
                        index,
                    })
                })
                .collect()
        };
        let first = |role: FieldRole| slot_for(role).into_iter().next();
        let mut text = slot_for(FieldRole::Text);
        text.extend(slot_for(FieldRole::Address));
        text.sort_by_key(|slot| slot.index);
        FieldSlots {
            region: first(FieldRole::Region),
            document: first(FieldRole::TaxId),
            postal_code: first(FieldRole::PostalCode),
            city: first(FieldRole::City),
            city_code: first(FieldRole::CityCode),
            address: first(FieldRole::Address),
            address_number: first(FieldRole::AddressNumber),
            text,
            phones: slot_for(FieldRole::Phone),
        }
    }
}

/// Writes `value` into the cell, counting the rewrite when the rendered
/// value changes. An empty string clears the cell.
fn store(row: &mut [CellValue], slot: Slot, value: String, summary: &mut RunSummary) {
    let cell = &mut row[slot.index];
    if cell.as_display() != value {
        summary.rewritten(slot.field);
    }
    *cell = if value.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(value)
    };
}

/// Setup is done: columns resolved, table widened, defaults normalized.
pub struct RecordPipeline {
    table: Table,
    profile: DatasetProfile,
    slots: FieldSlots,
    index: ReferenceIndex,
    defaults: NormalizedDefaults,
    change_log: ChangeLog,
}

impl RecordPipeline {
    pub fn setup(mut table: Table, index: ReferenceIndex, options: &PipelineOptions) -> Self {
        table.conform_rows();
        let resolution = resolve_columns(&table.headers, &options.schema);
        resolution.apply(&mut table);
        let change_log = ChangeLog {
            created_columns: resolution.created_headers(),
        };
        if !change_log.is_empty() {
            info!(
                "Created {} column(s) with no matching header: {}",
                change_log.created_columns.len(),
                change_log.created_columns.join(", ")
            );
        }
        let defaults = options.defaults.normalize(&index);
        debug!("Normalized defaults: {:?}", defaults);
        let slots = FieldSlots::locate(&options.schema, &resolution.map);
        RecordPipeline {
            table,
            profile: options.profile,
            slots,
            index,
            defaults,
            change_log,
        }
    }

    /// Canonicalizes every row in file order.
    pub fn transform(mut self) -> TransformedRun {
        let mut summary = RunSummary::default();
        let mut rows = std::mem::take(&mut self.table.rows);
        for row in &mut rows {
            self.canonicalize_row(row, &mut summary);
            summary.rows += 1;
        }
        self.table.rows = rows;
        summary.created_columns = self.change_log.created_columns.clone();
        info!(
            "Canonicalized {} row(s); {} cell(s) rewritten, {} reference hit(s), {} miss(es)",
            summary.rows,
            summary.total_rewritten(),
            summary.reference_hits,
            summary.reference_misses
        );
        TransformedRun {
            table: self.table,
            change_log: self.change_log,
            summary,
        }
    }

    fn canonicalize_row(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        self.apply_document(row, summary);
        self.apply_postal_code(row, summary);
        self.apply_city(row, summary);
        self.apply_city_code(row, summary);
        self.apply_region(row, summary);
        self.apply_address_number(row, summary);
        self.apply_text(row, summary);
        self.apply_phones(row, summary);
    }

    fn present(row: &[CellValue], slot: Option<Slot>) -> Option<String> {
        let slot = slot?;
        let cell = &row[slot.index];
        cell.is_present().then(|| cell.as_display())
    }

    fn apply_document(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        let Some(slot) = self.slots.document else {
            return;
        };
        if row[slot.index].is_blank() {
            row[slot.index] = CellValue::Empty;
            return;
        }
        let masked = mask_tax_id(&row[slot.index]);
        if masked.is_empty() && self.profile.keep_unmaskable_documents {
            return;
        }
        store(row, slot, masked, summary);
    }

    fn apply_postal_code(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        let Some(slot) = self.slots.postal_code else {
            return;
        };
        if row[slot.index].is_blank() {
            summary.defaulted(slot.field);
            store(row, slot, self.defaults.postal_code.clone(), summary);
        } else {
            let masked = mask_postal_code(&row[slot.index], &self.defaults.postal_code);
            store(row, slot, masked, summary);
        }
    }

    fn apply_city(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        let Some(slot) = self.slots.city else {
            return;
        };
        if let Some(city) = Self::present(row, Some(slot)) {
            if self.profile.repair_text_encoding {
                let repaired = repair_mojibake(&city).into_owned();
                store(row, slot, repaired, summary);
            }
            return;
        }
        let from_code = Self::present(row, self.slots.city_code)
            .and_then(|code| self.index.name_for_code(&code))
            .map(title_case);
        if let Some(name) = from_code {
            summary.reference_hits += 1;
            store(row, slot, name, summary);
        } else if let Some(city) = &self.defaults.city {
            summary.defaulted(slot.field);
            store(row, slot, city.clone(), summary);
        }
    }

    fn apply_city_code(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        let Some(slot) = self.slots.city_code else {
            return;
        };
        if row[slot.index].is_present() {
            return;
        }
        let found = Self::present(row, self.slots.city)
            .and_then(|city| self.index.code_for_name(&city).map(str::to_string));
        match found {
            Some(code) => {
                summary.reference_hits += 1;
                store(row, slot, code, summary);
            }
            None => {
                summary.reference_misses += 1;
                if let Some(code) = &self.defaults.city_code {
                    summary.defaulted(slot.field);
                    store(row, slot, code.clone(), summary);
                }
            }
        }
    }

    fn apply_region(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        let Some(slot) = self.slots.region else {
            return;
        };
        if row[slot.index].is_present() {
            return;
        }
        let by_code = Self::present(row, self.slots.city_code)
            .and_then(|code| self.index.region_for_code(&code).map(str::to_string));
        let by_name = || {
            Self::present(row, self.slots.city)
                .and_then(|city| self.index.region_for_name(&city).map(str::to_string))
        };
        if let Some(region) = by_code.or_else(by_name) {
            summary.reference_hits += 1;
            store(row, slot, region, summary);
        } else if let Some(region) = &self.defaults.region {
            summary.defaulted(slot.field);
            store(row, slot, region.clone(), summary);
        }
    }

    fn apply_address_number(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        let (Some(number_slot), Some(address_slot)) =
            (self.slots.address_number, self.slots.address)
        else {
            return;
        };
        if row[number_slot.index].is_present() {
            return;
        }
        let Some(address) = Self::present(row, Some(address_slot)) else {
            return;
        };
        if let Some(extracted) = extract_address_number(&address) {
            store(row, number_slot, extracted.number, summary);
            store(row, address_slot, extracted.remainder, summary);
        }
    }

    fn apply_text(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        for slot in &self.slots.text {
            if let Some(value) = Self::present(row, Some(*slot)) {
                let cleaned = sanitize_text(&value, self.profile.repair_text_encoding);
                store(row, *slot, cleaned, summary);
            }
        }
    }

    fn apply_phones(&self, row: &mut [CellValue], summary: &mut RunSummary) {
        for slot in &self.slots.phones {
            if row[slot.index].is_blank() {
                row[slot.index] = CellValue::Empty;
                continue;
            }
            let masked = mask_phone(&row[slot.index], &self.defaults.area_code, &self.profile.phone);
            store(row, *slot, masked, summary);
        }
    }
}

/// Transform is done; only the hand-off remains.
pub struct TransformedRun {
    table: Table,
    change_log: ChangeLog,
    summary: RunSummary,
}

impl TransformedRun {
    pub fn finalize(self) -> PipelineOutput {
        PipelineOutput {
            table: self.table,
            change_log: self.change_log,
            summary: self.summary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: Table,
    pub change_log: ChangeLog,
    pub summary: RunSummary,
}

/// Runs setup, transform and finalize back to back.
pub fn run_pipeline(table: Table, index: ReferenceIndex, options: &PipelineOptions) -> PipelineOutput {
    RecordPipeline::setup(table, index, options)
        .transform()
        .finalize()
}
