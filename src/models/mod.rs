// AI Text Detector Data Models
// Labels, predictions, explanations, documents, trend rows and API payloads

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::InferenceError;

/// Tolerance for the probability-sum invariant.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

// ============ Class Labels ============

/// The three provenance categories, in the order the classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    #[serde(rename = "Human-written")]
    HumanWritten,
    #[serde(rename = "AI-paraphrased")]
    AiParaphrased,
    #[serde(rename = "AI-generated")]
    AiGenerated,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 3] = [
        ClassLabel::HumanWritten,
        ClassLabel::AiParaphrased,
        ClassLabel::AiGenerated,
    ];

    pub fn ordinal(self) -> usize {
        match self {
            Self::HumanWritten => 0,
            Self::AiParaphrased => 1,
            Self::AiGenerated => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::HumanWritten => "Human-written",
            Self::AiParaphrased => "AI-paraphrased",
            Self::AiGenerated => "AI-generated",
        }
    }

    /// Name used by the training corpus and the label-mapping config.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::HumanWritten => "human",
            Self::AiParaphrased => "ai_paraphrased",
            Self::AiGenerated => "ai_generated",
        }
    }

    /// Column name of this label's share in the trend CSV.
    pub fn percent_column(self) -> &'static str {
        match self {
            Self::HumanWritten => "human_percent",
            Self::AiParaphrased => "ai_paraphrased_percent",
            Self::AiGenerated => "ai_generated_percent",
        }
    }

    /// Accepts display names and short names, case-insensitively.
    pub fn parse(val: &str) -> Option<Self> {
        let key = val.trim().to_lowercase().replace('-', "_");
        match key.as_str() {
            "human" | "human_written" => Some(Self::HumanWritten),
            "ai_paraphrased" => Some(Self::AiParaphrased),
            "ai_generated" => Some(Self::AiGenerated),
            _ => None,
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============ Probability Distribution ============

/// One probability per label, indexed by `ClassLabel::ordinal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityDistribution {
    values: [f64; 3],
}

impl ProbabilityDistribution {
    pub fn new(values: [f64; 3]) -> Result<Self, InferenceError> {
        if values.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(InferenceError::InvalidDistribution(format!(
                "probabilities must be finite and non-negative: {:?}",
                values
            )));
        }
        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(InferenceError::InvalidDistribution(format!(
                "probabilities sum to {} instead of 1",
                sum
            )));
        }
        Ok(Self { values })
    }

    pub fn get(&self, label: ClassLabel) -> f64 {
        self.values[label.ordinal()]
    }

    /// Highest-probability label; ties resolve to the earlier label.
    pub fn argmax(&self) -> ClassLabel {
        let mut best = ClassLabel::HumanWritten;
        for label in ClassLabel::ALL {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassLabel, f64)> + '_ {
        ClassLabel::ALL.into_iter().map(move |l| (l, self.get(l)))
    }

    pub fn to_map(&self) -> BTreeMap<ClassLabel, f64> {
        self.iter().collect()
    }
}

impl Serialize for ProbabilityDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        for (label, p) in self.iter() {
            map.serialize_entry(label.display_name(), &p)?;
        }
        map.end()
    }
}

// ============ Prediction ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: ClassLabel,
    pub confidence: f64,
    pub distribution: ProbabilityDistribution,
}

impl Prediction {
    pub fn from_distribution(distribution: ProbabilityDistribution) -> Self {
        let label = distribution.argmax();
        Self {
            label,
            confidence: distribution.get(label),
            distribution,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationItem {
    #[serde(rename = "word")]
    pub token: String,
    pub weight: f64,
}

// ============ Documents ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Txt,
    Html,
    Docx,
    Pdf,
}

impl DocumentFormat {
    /// Resolve a format from the uploaded file name's extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename.trim())
            .extension()?
            .to_str()?
            .to_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Txt),
            "html" | "htm" => Some(Self::Html),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Txt => "txt",
            Self::Html => "html",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub raw_bytes: Vec<u8>,
    pub declared_format: DocumentFormat,
    pub extracted_text: String,
}

// ============ Trends ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendRecord {
    pub year: i32,
    pub cleaned_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyAggregate {
    pub year: i32,
    pub count_per_label: BTreeMap<ClassLabel, u64>,
    pub total: u64,
    pub percent_per_label: BTreeMap<ClassLabel, f64>,
}

impl YearlyAggregate {
    /// Builds the row for one year; every label gets a cell, empty years report 0%.
    pub fn from_counts(year: i32, counts: [u64; 3]) -> Self {
        let total: u64 = counts.iter().sum();
        let count_per_label = ClassLabel::ALL
            .into_iter()
            .map(|l| (l, counts[l.ordinal()]))
            .collect();
        let percent_per_label = ClassLabel::ALL
            .into_iter()
            .map(|l| {
                let pct = if total == 0 {
                    0.0
                } else {
                    counts[l.ordinal()] as f64 / total as f64
                };
                (l, pct)
            })
            .collect();
        Self {
            year,
            count_per_label,
            total,
            percent_per_label,
        }
    }

    pub fn count(&self, label: ClassLabel) -> u64 {
        self.count_per_label.get(&label).copied().unwrap_or(0)
    }

    pub fn percent(&self, label: ClassLabel) -> f64 {
        self.percent_per_label.get(&label).copied().unwrap_or(0.0)
    }
}

// ============ Session Log ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    /// ISO-8601, second precision, UTC.
    pub timestamp: String,
    pub input_text: String,
    pub predicted_label: ClassLabel,
}

// ============ API Payloads ============

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextAnalysisResponse {
    pub prediction: ClassLabel,
    pub confidence: f64,
    pub probabilities: ProbabilityDistribution,
    pub explanation: Vec<ExplanationItem>,
}

/// Bulk-document result. Carries no explanation by construction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysisResponse {
    pub prediction: ClassLabel,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_loaded: bool,
    pub labels: Vec<ClassLabel>,
}

/// Output of the command-line predictor.
#[derive(Debug, Clone, Serialize)]
pub struct CliPrediction {
    pub input_text: String,
    pub predicted_label: ClassLabel,
    pub class_probabilities: ProbabilityDistribution,
}
