//! Run settings persisted as YAML.
//!
//! A settings file carries everything a `clean` run needs besides the input
//! table itself. Values given on the command line override the file, and the
//! merged result can be saved back for the next run.

use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    pipeline::{PipelineOptions, RunDefaults},
    reference::{DEFAULT_SCAN_WIDTH, FixedLayout, ReferenceStrategy},
    schema::{DatasetKind, DatasetProfile},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum StrategyChoice {
    #[default]
    Fixed,
    Auto,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    pub path: Option<PathBuf>,
    pub strategy: StrategyChoice,
    pub name_column: Option<usize>,
    pub code_column: Option<usize>,
    pub region_column: Option<usize>,
    pub strip_region_suffix: Option<bool>,
    pub scan_width: Option<usize>,
}

impl ReferenceSettings {
    pub fn strategy(&self) -> ReferenceStrategy {
        match self.strategy {
            StrategyChoice::Fixed => {
                let base = FixedLayout::default();
                ReferenceStrategy::Fixed(FixedLayout {
                    name_column: self.name_column.unwrap_or(base.name_column),
                    code_column: self.code_column.unwrap_or(base.code_column),
                    region_column: self.region_column.or(base.region_column),
                    strip_region_suffix: self
                        .strip_region_suffix
                        .unwrap_or(base.strip_region_suffix),
                })
            }
            StrategyChoice::Auto => ReferenceStrategy::AutoDetect {
                scan_width: self.scan_width.unwrap_or(DEFAULT_SCAN_WIDTH),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub kind: DatasetKind,
    pub reference: ReferenceSettings,
    pub defaults: RunDefaults,
    /// Overrides the kind's minimum phone length.
    pub phone_min_digits: Option<usize>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings: Settings = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings file {path:?}"))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating settings file {path:?}"))?;
        serde_yaml::to_writer(file, self)
            .with_context(|| format!("Writing settings file {path:?}"))?;
        Ok(())
    }

    pub fn profile(&self) -> DatasetProfile {
        let mut profile = self.kind.profile();
        if let Some(min_digits) = self.phone_min_digits {
            profile.phone.min_digits = min_digits;
        }
        profile
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            schema: self.kind.schema(),
            profile: self.profile(),
            defaults: self.defaults.clone(),
        }
    }
}

/// Replaces `target` when the command line supplied a value.
pub fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
