//! Supported datasets and how each one is scored.

use std::fmt;

use segbench_metric::ClassPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};

/// Number of Oxford-IIIT Pets trimap classes (pet, background, border).
pub const PETS_CLASSES: usize = 3;

/// Number of Pascal VOC classes including background.
pub const VOC_CLASSES: usize = 21;

/// Label of pixels that belong to no class.
pub const VOID_LABEL: i64 = 255;

/// The dataset a benchmark runs on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Oxford-IIIT Pets test split with 1-indexed trimaps.
    #[default]
    Pets,
    /// Pascal VOC 2012 segmentation validation split.
    Voc,
    /// Generic `images/` and `masks/` directories with index masks.
    Folder { num_classes: usize },
}

impl DatasetKind {
    /// Resolve a dataset name. `num_classes` only applies to `folder`.
    pub fn from_name(name: &str, num_classes: Option<usize>) -> DatasetResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pets" | "oxford-pets" => Ok(Self::Pets),
            "voc" | "pascal-voc" => Ok(Self::Voc),
            "folder" => {
                let num_classes = num_classes.unwrap_or(2);
                if num_classes < 2 {
                    return Err(DatasetError::InvalidClassCount { num_classes });
                }
                Ok(Self::Folder { num_classes })
            }
            _ => Err(DatasetError::UnknownDataset {
                name: name.to_string(),
            }),
        }
    }

    /// Short name used in logs and report file names.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pets => "pets",
            Self::Voc => "voc",
            Self::Folder { .. } => "folder",
        }
    }

    /// Number of output channels a model needs for this dataset.
    pub const fn num_classes(&self) -> usize {
        match self {
            Self::Pets => PETS_CLASSES,
            Self::Voc => VOC_CLASSES,
            Self::Folder { num_classes } => *num_classes,
        }
    }

    /// Value added to argmax predictions so they share the target's indexing.
    pub const fn label_offset(&self) -> i64 {
        match self {
            Self::Pets => 1,
            Self::Voc | Self::Folder { .. } => 0,
        }
    }

    /// Which classes are scored and how they are weighted.
    pub fn policy(&self) -> ClassPolicy {
        match self {
            Self::Pets => ClassPolicy::pets(),
            Self::Voc | Self::Folder { .. } => ClassPolicy::indexed(self.num_classes()),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use segbench_metric::ClassRange;

    use super::*;

    #[rstest]
    #[case("pets", None, DatasetKind::Pets)]
    #[case("VOC", None, DatasetKind::Voc)]
    #[case("folder", Some(4), DatasetKind::Folder { num_classes: 4 })]
    #[case("folder", None, DatasetKind::Folder { num_classes: 2 })]
    fn names_resolve(
        #[case] name: &str,
        #[case] num_classes: Option<usize>,
        #[case] expected: DatasetKind,
    ) {
        assert_eq!(DatasetKind::from_name(name, num_classes).unwrap(), expected);
    }

    #[test]
    fn unknown_dataset_is_rejected() {
        let err = DatasetKind::from_name("coco", None).unwrap_err();

        assert!(matches!(err, DatasetError::UnknownDataset { .. }));
        assert!(err.to_string().contains("coco"));
    }

    #[test]
    fn single_class_folder_is_rejected() {
        assert!(matches!(
            DatasetKind::from_name("folder", Some(1)),
            Err(DatasetError::InvalidClassCount { num_classes: 1 })
        ));
    }

    #[test]
    fn pets_is_one_indexed_and_keeps_background() {
        let kind = DatasetKind::Pets;
        let policy = kind.policy();

        assert_eq!(kind.num_classes(), 3);
        assert_eq!(kind.label_offset(), 1);
        assert_eq!(policy.range, ClassRange::ObservedSpan);
        assert!(!policy.skip_background);
    }

    #[test]
    fn voc_scores_twenty_foreground_classes() {
        let policy = DatasetKind::Voc.policy();

        assert_eq!(DatasetKind::Voc.label_offset(), 0);
        assert_eq!(policy.range, ClassRange::Fixed(VOC_CLASSES));
        assert!(policy.skip_background);
    }
}
