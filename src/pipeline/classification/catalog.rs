//! The built-in handler set.
//!
//! Specialized handlers register first so that, at equal scores, registration
//! order favours them. Generic entries follow, most specific modality first
//! (for example `chest_xray` before `xray`).

use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::models::enums::Category;

use super::extractors::{DEXA, MAMMOGRAPHY};
use super::generic::{ExtractorPlugin, GenericHandler};
use super::handlers::{
    ArterialDopplerHandler, CardiacMriHandler, CarotidDopplerHandler, EchoHandler,
    LabResultsHandler, StressTestHandler, VenousDuplexHandler,
};
use super::registry::TypeRegistry;
use super::ClassificationError;

/// One keyword-only report type.
pub struct CatalogEntry {
    pub id: &'static str,
    pub display_name: &'static str,
    pub category: Category,
    pub specialty: &'static str,
    pub keywords: &'static [&'static str],
    pub negative_keywords: &'static [&'static str],
    pub extractor: Option<ExtractorPlugin>,
}

impl CatalogEntry {
    const fn cardiac(
        id: &'static str,
        display_name: &'static str,
        keywords: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            display_name,
            category: Category::Cardiac,
            specialty: "cardiology",
            keywords,
            negative_keywords: &[],
            extractor: None,
        }
    }

    const fn new(
        id: &'static str,
        display_name: &'static str,
        category: Category,
        specialty: &'static str,
        keywords: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            display_name,
            category,
            specialty,
            keywords,
            negative_keywords: &[],
            extractor: None,
        }
    }

    const fn negatives(self, negative_keywords: &'static [&'static str]) -> Self {
        Self {
            negative_keywords,
            ..self
        }
    }

    const fn extractor(self, plugin: ExtractorPlugin) -> Self {
        Self {
            extractor: Some(plugin),
            ..self
        }
    }

    pub fn build(&self, config: &ClassifierConfig) -> GenericHandler {
        let handler = GenericHandler::new(self.id, self.display_name, self.category, self.keywords)
            .with_specialty(self.specialty)
            .with_negative_keywords(self.negative_keywords)
            .with_weights(config.scoring.clone());
        match self.extractor {
            Some(plugin) => handler.with_extractor(plugin),
            None => handler,
        }
    }
}

pub static GENERIC_CATALOG: &[CatalogEntry] = &[
    // Cardiac
    CatalogEntry::cardiac(
        "cta_coronary",
        "CTA Coronary",
        &["coronary ct", "coronary cta", "ct coronary", "coronary ct angiography"],
    ),
    CatalogEntry::cardiac(
        "ekg",
        "EKG / ECG",
        &[
            "ekg",
            "ecg",
            "electrocardiogram",
            "12-lead",
            "12 lead",
            "sinus rhythm",
            "qrs",
            "qt interval",
            "st segment",
        ],
    )
    .negatives(&["holter", "stress test", "treadmill"]),
    CatalogEntry::cardiac(
        "holter_monitor",
        "Holter Monitor",
        &[
            "holter",
            "ambulatory monitor",
            "24-hour monitor",
            "48-hour monitor",
            "continuous monitoring",
        ],
    ),
    CatalogEntry::cardiac(
        "right_heart_cath",
        "Right Heart Catheterization",
        &[
            "right heart cath",
            "right heart catheterization",
            "swan-ganz",
            "pulmonary artery pressure",
            "pulmonary capillary wedge",
            "pcwp",
            "cardiac output",
            "fick",
        ],
    ),
    CatalogEntry::cardiac(
        "left_heart_cath",
        "Left Heart Catheterization",
        &[
            "left heart cath",
            "coronary angiography",
            "coronary angiogram",
            "cardiac catheterization",
            "cardiac cath",
            "lvedp",
            "left main",
            "circumflex",
        ],
    )
    .negatives(&["right heart catheterization"]),
    CatalogEntry::cardiac(
        "ct_calcium_score",
        "CT Calcium Score",
        &[
            "calcium score",
            "agatston",
            "agatston score",
            "coronary calcium",
            "cac score",
            "calcium scoring",
        ],
    ),
    CatalogEntry::cardiac(
        "tee",
        "Transesophageal Echocardiogram",
        &["transesophageal", "tee", "tee echo"],
    )
    .negatives(&["transthoracic"]),
    CatalogEntry::cardiac(
        "event_monitor",
        "Event Monitor",
        &["event monitor", "event recorder", "loop recorder", "zio patch", "cardiac monitor"],
    ),
    // CT
    CatalogEntry::new(
        "ct_chest",
        "CT Chest",
        Category::ImagingCt,
        "radiology",
        &["ct chest", "chest ct", "ct thorax", "pulmonary embolism", "ct pulmonary", "ctpa"],
    ),
    CatalogEntry::new(
        "cta",
        "CT Angiography",
        Category::ImagingCt,
        "radiology",
        &[
            "ct angiography",
            "cta pulmonary",
            "cta aorta",
            "cta carotid",
            "cta renal",
            "cta extremity",
            "cta runoff",
            "ct angiogram",
        ],
    )
    .negatives(&["coronary"]),
    CatalogEntry::new(
        "ct_scan",
        "CT Scan",
        Category::ImagingCt,
        "radiology",
        &[
            "ct scan",
            "computed tomography",
            "ct head",
            "ct brain",
            "ct abdomen",
            "ct pelvis",
            "ct spine",
            "ct cervical",
            "ct lumbar",
            "ct thoracic",
            "ct extremity",
            "ct neck",
            "ct sinus",
            "ct without contrast",
            "ct with contrast",
        ],
    ),
    // MRI
    CatalogEntry::new(
        "mra",
        "MR Angiography",
        Category::ImagingMri,
        "radiology",
        &[
            "mra",
            "mr angiography",
            "magnetic resonance angiography",
            "mra brain",
            "mra neck",
            "mra aorta",
            "mra renal",
        ],
    ),
    CatalogEntry::new(
        "mri",
        "MRI",
        Category::ImagingMri,
        "radiology",
        &[
            "mri",
            "magnetic resonance imaging",
            "mri brain",
            "mri spine",
            "mri knee",
            "mri shoulder",
            "mri hip",
            "mri ankle",
            "mri wrist",
            "mri abdomen",
            "mri pelvis",
            "mri cervical",
            "mri lumbar",
            "mri thoracic",
        ],
    )
    .negatives(&["cardiac mri", "cardiac magnetic resonance"]),
    // Ultrasound
    CatalogEntry::new(
        "renal_artery_doppler",
        "Renal Artery Doppler",
        Category::ImagingUltrasound,
        "cardiology",
        &["renal artery", "renal doppler", "renal resistive index"],
    ),
    CatalogEntry::new(
        "abdominal_aorta",
        "Abdominal Aorta Ultrasound",
        Category::ImagingUltrasound,
        "cardiology",
        &[
            "abdominal aorta",
            "aaa screening",
            "aortic aneurysm",
            "aortic ultrasound",
            "aortic diameter",
        ],
    ),
    CatalogEntry::new(
        "ultrasound",
        "Ultrasound",
        Category::ImagingUltrasound,
        "radiology",
        &[
            "ultrasound",
            "sonography",
            "sonogram",
            "thyroid ultrasound",
            "renal ultrasound",
            "pelvic ultrasound",
            "obstetric ultrasound",
            "breast ultrasound",
            "abdominal ultrasound",
            "testicular ultrasound",
            "scrotal ultrasound",
            "soft tissue ultrasound",
        ],
    )
    .negatives(&["echocardiogram", "carotid", "venous duplex", "arterial doppler"]),
    // X-ray
    CatalogEntry::new(
        "chest_xray",
        "Chest X-Ray",
        Category::ImagingXray,
        "radiology",
        &[
            "chest x-ray",
            "chest xray",
            "cxr",
            "chest radiograph",
            "pa and lateral",
            "portable chest",
        ],
    ),
    CatalogEntry::new(
        "dexa",
        "DEXA / Bone Density",
        Category::ImagingXray,
        "radiology",
        &[
            "dexa",
            "dxa",
            "bone density",
            "bone densitometry",
            "dual-energy x-ray absorptiometry",
            "t-score",
            "z-score",
            "osteoporosis screening",
        ],
    )
    .extractor(DEXA),
    CatalogEntry::new(
        "mammography",
        "Mammography",
        Category::ImagingXray,
        "radiology",
        &[
            "mammography",
            "mammogram",
            "breast imaging",
            "bi-rads",
            "birads",
            "screening mammogram",
            "diagnostic mammogram",
            "tomosynthesis",
        ],
    )
    .extractor(MAMMOGRAPHY),
    CatalogEntry::new(
        "xray",
        "X-Ray",
        Category::ImagingXray,
        "radiology",
        &[
            "x-ray",
            "radiograph",
            "plain film",
            "skeletal survey",
            "bone xray",
            "spine xray",
            "abdominal xray",
            "kub",
            "knee xray",
            "shoulder xray",
            "hip xray",
            "ankle xray",
            "hand xray",
            "foot xray",
        ],
    )
    .negatives(&["chest x-ray", "chest radiograph", "mammogram", "dexa"]),
    // Pulmonary
    CatalogEntry::new(
        "pft",
        "Pulmonary Function Test",
        Category::Pulmonary,
        "pulmonology",
        &[
            "pulmonary function",
            "pft",
            "spirometry",
            "fev1",
            "fvc",
            "dlco",
            "lung volumes",
        ],
    ),
    CatalogEntry::new(
        "sleep_study",
        "Sleep Study",
        Category::Neurophysiology,
        "pulmonology",
        &[
            "polysomnography",
            "sleep study",
            "polysomnogram",
            "sleep apnea",
            "ahi",
            "apnea-hypopnea",
            "apnea hypopnea",
        ],
    ),
    // Neurophysiology
    CatalogEntry::new(
        "eeg",
        "EEG",
        Category::Neurophysiology,
        "neurology",
        &[
            "eeg",
            "electroencephalogram",
            "electroencephalography",
            "brain wave",
            "epilepsy monitoring",
            "seizure study",
        ],
    )
    .negatives(&["polysomnography"]),
    CatalogEntry::new(
        "emg_ncs",
        "EMG / Nerve Conduction Study",
        Category::Neurophysiology,
        "neurology",
        &[
            "emg",
            "electromyography",
            "nerve conduction",
            "ncs",
            "nerve conduction study",
            "electrodiagnostic",
        ],
    ),
    // Endoscopy
    CatalogEntry::new(
        "endoscopy",
        "Endoscopy / Colonoscopy",
        Category::Endoscopy,
        "gastroenterology",
        &[
            "colonoscopy",
            "endoscopy",
            "egd",
            "esophagogastroduodenoscopy",
            "upper endoscopy",
            "sigmoidoscopy",
            "polypectomy",
            "gastroscopy",
            "bronchoscopy",
        ],
    ),
    // Pathology
    CatalogEntry::new(
        "pathology",
        "Pathology / Biopsy Report",
        Category::Pathology,
        "pathology",
        &[
            "pathology",
            "biopsy",
            "histopathology",
            "cytology",
            "surgical pathology",
            "microscopic examination",
            "immunohistochemistry",
            "pap smear",
        ],
    ),
];

/// Register every built-in handler with weights from `config`.
pub fn builtin_registry(config: &ClassifierConfig) -> Result<TypeRegistry, ClassificationError> {
    config.validate()?;
    let weights = config.scoring.clone();
    let mut registry = TypeRegistry::new(config.detection.clone());

    registry.register(Arc::new(EchoHandler::new(weights.clone())?));
    registry.register(Arc::new(LabResultsHandler::new(weights.clone())?));
    registry.register(Arc::new(CardiacMriHandler::new(weights.clone())?));
    registry.register(Arc::new(StressTestHandler::new(weights.clone())?));
    registry.register(Arc::new(CarotidDopplerHandler::new(weights.clone())?));
    registry.register(Arc::new(ArterialDopplerHandler::new(weights.clone())?));
    registry.register(Arc::new(VenousDuplexHandler::new(weights)?));

    for entry in GENERIC_CATALOG {
        registry.register(Arc::new(entry.build(config)));
    }

    tracing::info!(handlers = registry.len(), "Built-in report registry ready");
    Ok(registry)
}
