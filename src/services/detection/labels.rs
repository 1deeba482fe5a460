// Label Mapping
// Validated bijection between model output indices and the closed label set

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::models::ClassLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMap {
    by_index: [ClassLabel; 3],
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            by_index: ClassLabel::ALL,
        }
    }
}

impl LabelMap {
    /// Build from a `name -> index` mapping. Fails unless it covers every label exactly once
    /// and the indices are exactly `0..3`.
    pub fn from_mapping(mapping: &BTreeMap<String, usize>) -> Result<Self, ConfigError> {
        if mapping.len() != ClassLabel::ALL.len() {
            return Err(ConfigError::LabelMapping(format!(
                "expected {} labels, got {}",
                ClassLabel::ALL.len(),
                mapping.len()
            )));
        }

        let mut slots: [Option<ClassLabel>; 3] = [None; 3];
        for (name, &index) in mapping {
            let label = ClassLabel::parse(name)
                .ok_or_else(|| ConfigError::LabelMapping(format!("unknown label '{}'", name)))?;
            let slot = slots.get_mut(index).ok_or_else(|| {
                ConfigError::LabelMapping(format!("index {} for '{}' is out of range", index, name))
            })?;
            if slot.is_some() {
                return Err(ConfigError::LabelMapping(format!("index {} assigned twice", index)));
            }
            *slot = Some(label);
        }

        let mut by_index = ClassLabel::ALL;
        for (i, slot) in slots.iter().enumerate() {
            by_index[i] = slot.ok_or_else(|| ConfigError::LabelMapping(format!("index {} unassigned", i)))?;
        }
        for label in ClassLabel::ALL {
            if !by_index.contains(&label) {
                return Err(ConfigError::LabelMapping(format!("label '{}' is not mapped", label)));
            }
        }

        Ok(Self { by_index })
    }

    /// Reorder model-index probabilities into label order.
    pub fn to_label_order(&self, by_model_index: &[f64]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, label) in self.by_index.iter().enumerate() {
            out[label.ordinal()] = by_model_index[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_identity_mapping() {
        let map = LabelMap::from_mapping(&mapping(&[
            ("human", 0),
            ("ai_paraphrased", 1),
            ("ai_generated", 2),
        ]))
        .unwrap();
        assert_eq!(map, LabelMap::default());
        assert_eq!(map.to_label_order(&[0.1, 0.2, 0.7]), [0.1, 0.2, 0.7]);
    }

    #[test]
    fn test_permuted_mapping_reorders() {
        let map = LabelMap::from_mapping(&mapping(&[
            ("AI-generated", 0),
            ("Human-written", 1),
            ("AI-paraphrased", 2),
        ]))
        .unwrap();
        assert_eq!(map.to_label_order(&[0.7, 0.2, 0.1]), [0.2, 0.1, 0.7]);
    }

    #[test]
    fn test_rejects_wrong_cardinality() {
        let err = LabelMap::from_mapping(&mapping(&[("human", 0), ("ai_generated", 1)]));
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_out_of_range_indices() {
        assert!(LabelMap::from_mapping(&mapping(&[
            ("human", 0),
            ("ai_paraphrased", 0),
            ("ai_generated", 2),
        ]))
        .is_err());
        assert!(LabelMap::from_mapping(&mapping(&[
            ("human", 0),
            ("ai_paraphrased", 1),
            ("ai_generated", 3),
        ]))
        .is_err());
    }

    #[test]
    fn test_rejects_label_mapped_twice() {
        assert!(LabelMap::from_mapping(&mapping(&[
            ("human", 0),
            ("Human-written", 1),
            ("ai_generated", 2),
        ]))
        .is_err());
    }
}
