//! Batch feature conversion and scoring.
//!
//! Items are converted independently. A bad item becomes an [`ItemFailure`]
//! that is counted in the [`BatchReport`]; it never aborts the batch.

use crate::classifier::Label;
use crate::config::BatchConfig;
use crate::decision::Verdict;
use crate::detector::PhishingDetector;
use crate::error::{DetectorError, Result};
use crate::features::{FeatureExtractor, FeatureName, FeatureVector, FEATURE_COUNT};
use rayon::prelude::*;
use std::io::Write;

/// One email as it arrives from a dataset, before any decoding.
#[derive(Debug, Clone)]
pub enum RawEmail {
    Missing,
    /// The source could not be read; carries the reason.
    Unreadable(String),
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct LabelledEmail {
    pub email: RawEmail,
    /// `None` when the dataset label could not be interpreted.
    pub label: Option<Label>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub index: usize,
    pub reason: String,
}

pub type ItemOutcome = std::result::Result<FeatureVector, ItemFailure>;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub index: usize,
    pub vector: FeatureVector,
    pub label: Option<Label>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub rows: Vec<FeatureRow>,
    pub failures: Vec<ItemFailure>,
    pub unknown_labels: usize,
    pub lossy_decodes: usize,
    /// Rows in which each feature was nonzero, in training order.
    pub feature_hits: [usize; FEATURE_COUNT],
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.rows.len()
    }

    pub fn count_label(&self, label: Label) -> usize {
        self.rows.iter().filter(|r| r.label == Some(label)).count()
    }

    /// Share of rows carrying each feature, in percent.
    pub fn hit_percentages(&self) -> Vec<(FeatureName, f64)> {
        let total = self.rows.len();
        FeatureName::ALL
            .iter()
            .zip(self.feature_hits.iter())
            .map(|(&name, &hits)| {
                let pct = if total == 0 {
                    0.0
                } else {
                    hits as f64 / total as f64 * 100.0
                };
                (name, pct)
            })
            .collect()
    }

    fn record(&mut self, row: FeatureRow) {
        for (hits, &value) in self.feature_hits.iter_mut().zip(row.vector.values()) {
            if value > 0 {
                *hits += 1;
            }
        }
        self.rows.push(row);
    }
}

/// Convert one raw email. Returns the vector and whether decoding was lossy.
fn convert_item(
    extractor: &FeatureExtractor,
    index: usize,
    email: &RawEmail,
) -> std::result::Result<(FeatureVector, bool), ItemFailure> {
    match email {
        RawEmail::Missing => Err(ItemFailure {
            index,
            reason: "missing email text".to_string(),
        }),
        RawEmail::Unreadable(reason) => Err(ItemFailure {
            index,
            reason: reason.clone(),
        }),
        RawEmail::Text(text) => Ok((extractor.extract(text), false)),
        RawEmail::Bytes(bytes) => {
            let lossy = std::str::from_utf8(bytes).is_err();
            Ok((extractor.extract_bytes(bytes), lossy))
        }
    }
}

/// Outcome of converting one raw email.
pub fn convert_one(index: usize, email: &RawEmail) -> ItemOutcome {
    convert_item(&FeatureExtractor::new(), index, email).map(|(vector, _)| vector)
}

fn build_pool(config: &BatchConfig) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = config.threads {
        builder = builder.num_threads(threads);
    }
    builder
        .build()
        .map_err(|e| DetectorError::Config(format!("failed to build thread pool: {}", e)))
}

fn convert_all(
    emails: &[(&RawEmail, Option<Label>)],
    skip_unlabelled: bool,
    config: &BatchConfig,
) -> Result<BatchReport> {
    let extractor = FeatureExtractor::new();
    let pool = build_pool(config)?;
    let outcomes: Vec<_> = pool.install(|| {
        emails
            .par_iter()
            .enumerate()
            .map(|(index, (email, label))| {
                if skip_unlabelled && label.is_none() {
                    return None;
                }
                Some(convert_item(&extractor, index, email).map(|(v, lossy)| (v, lossy, *label)))
            })
            .collect()
    });

    let mut report = BatchReport::default();
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            None => report.unknown_labels += 1,
            Some(Ok((vector, lossy, label))) => {
                if lossy {
                    report.lossy_decodes += 1;
                }
                report.record(FeatureRow {
                    index,
                    vector,
                    label,
                });
            }
            Some(Err(failure)) => {
                if report.failures.len() < config.max_reported_errors {
                    log::warn!("Skipping email {}: {}", failure.index, failure.reason);
                }
                report.failures.push(failure);
            }
        }
    }

    log::info!(
        "Converted {} emails ({} failed, {} unknown labels, {} lossy decodes)",
        report.processed(),
        report.failures.len(),
        report.unknown_labels,
        report.lossy_decodes
    );
    Ok(report)
}

/// Extract features from unlabelled emails.
pub fn extract_batch(emails: &[RawEmail], config: &BatchConfig) -> Result<BatchReport> {
    let items: Vec<_> = emails.iter().map(|e| (e, None::<Label>)).collect();
    convert_all(&items, false, config)
}

/// Extract features for training. Rows without a usable label are skipped.
pub fn convert_labelled(emails: &[LabelledEmail], config: &BatchConfig) -> Result<BatchReport> {
    let items: Vec<_> = emails.iter().map(|e| (&e.email, e.label)).collect();
    convert_all(&items, true, config)
}

/// Score many emails in parallel. Results keep the input order.
pub fn score_batch(
    detector: &PhishingDetector,
    texts: &[String],
    config: &BatchConfig,
) -> Result<Vec<(usize, Verdict)>> {
    let pool = build_pool(config)?;
    Ok(pool.install(|| {
        texts
            .par_iter()
            .enumerate()
            .map(|(index, text)| (index, detector.analyze(text).verdict))
            .collect()
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// The 15 features only.
    Inference,
    /// The 15 features followed by a `label` column.
    Training,
}

pub fn interchange_header(schema: Schema) -> String {
    let mut columns: Vec<&str> = FeatureName::ALL.iter().map(|n| n.as_str()).collect();
    if schema == Schema::Training {
        columns.push("label");
    }
    columns.join(",")
}

/// Write rows in the feature interchange format shared with model training.
pub fn write_interchange<W: Write>(
    writer: &mut W,
    rows: &[FeatureRow],
    schema: Schema,
) -> Result<()> {
    writeln!(writer, "{}", interchange_header(schema))?;
    for row in rows {
        let mut line = row
            .vector
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        if schema == Schema::Training {
            let label = row.label.ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("row {} has no label", row.index),
                )
            })?;
            line.push(',');
            line.push_str(&label.class_index().to_string());
        }
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}

/// Parse one data line of the interchange format.
pub fn parse_interchange_row(
    line: &str,
    schema: Schema,
) -> Result<(FeatureVector, Option<Label>)> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    let expected = match schema {
        Schema::Inference => FEATURE_COUNT,
        Schema::Training => FEATURE_COUNT + 1,
    };
    if fields.len() != expected {
        return Err(DetectorError::InvalidRow(format!(
            "expected {} columns, got {}",
            expected,
            fields.len()
        )));
    }

    let mut values = [0u8; FEATURE_COUNT];
    for (slot, field) in values.iter_mut().zip(fields.iter()) {
        *slot = field.trim().parse().map_err(|_| {
            DetectorError::InvalidRow(format!("bad feature value '{}'", field))
        })?;
    }
    let vector = FeatureVector::from_values(values)
        .map_err(|e| DetectorError::InvalidRow(e.to_string()))?;

    let label = match schema {
        Schema::Inference => None,
        Schema::Training => {
            let index: u8 = fields[FEATURE_COUNT].trim().parse().map_err(|_| {
                DetectorError::InvalidRow(format!("bad label '{}'", fields[FEATURE_COUNT]))
            })?;
            let label = Label::from_class_index(index)
                .map_err(|_| DetectorError::InvalidRow(format!("unknown label {}", index)))?;
            Some(label)
        }
    };
    Ok((vector, label))
}
