use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct EnumParseError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(EnumParseError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Category {
    Cardiac => "cardiac",
    Vascular => "vascular",
    Lab => "lab",
    ImagingCt => "imaging_ct",
    ImagingMri => "imaging_mri",
    ImagingUltrasound => "imaging_ultrasound",
    ImagingXray => "imaging_xray",
    Pulmonary => "pulmonary",
    Neurophysiology => "neurophysiology",
    Endoscopy => "endoscopy",
    Pathology => "pathology",
    Other => "other",
});

str_enum!(SeverityStatus {
    Normal => "normal",
    MildlyAbnormal => "mildly_abnormal",
    ModeratelyAbnormal => "moderately_abnormal",
    SeverelyAbnormal => "severely_abnormal",
    Undetermined => "undetermined",
});

str_enum!(AbnormalityDirection {
    Normal => "normal",
    AboveNormal => "above_normal",
    BelowNormal => "below_normal",
});

str_enum!(Sex {
    Male => "male",
    Female => "female",
});

str_enum!(HandlerKind {
    Specialized => "specialized",
    Generic => "generic",
});

str_enum!(InputMode {
    Pdf => "pdf",
    Text => "text",
    Image => "image",
});

str_enum!(PageType {
    Text => "text",
    Scanned => "scanned",
    Mixed => "mixed",
});

str_enum!(ExtractionMethod {
    PdfDirect => "pdf_direct",
    Ocr => "ocr",
    PlainText => "plain_text",
    Split => "split",
});

impl SeverityStatus {
    /// Ordinal used for severity comparisons. Undetermined ranks with normal
    /// because it carries no evidence of abnormality.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Normal | Self::Undetermined => 0,
            Self::MildlyAbnormal => 1,
            Self::ModeratelyAbnormal => 2,
            Self::SeverelyAbnormal => 3,
        }
    }

    pub fn is_abnormal(&self) -> bool {
        self.rank() > 0
    }
}

impl Sex {
    /// Lenient parse of the labels found in reports and request payloads.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "m" | "male" | "man" => Some(Self::Male),
            "f" | "female" | "woman" => Some(Self::Female),
            _ => None,
        }
    }
}
