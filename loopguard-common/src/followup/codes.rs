//! Modality and body-region code canonicalization
//!
//! Both fields stay free-form short codes. Known aliases collapse to one
//! canonical spelling so worklist filters and metrics group them together;
//! anything unrecognized is kept as typed (trimmed, case-normalized).

/// DICOM-style modality codes recognized without aliasing
const MODALITY_CODES: &[&str] = &["CT", "MR", "XR", "US", "NM", "PT", "MG", "FL", "DX", "CR"];

const MODALITY_ALIASES: &[(&str, &str)] = &[
    ("XRAY", "XR"),
    ("X-RAY", "XR"),
    ("RADIOGRAPH", "XR"),
    ("MRI", "MR"),
    ("ULTRASOUND", "US"),
    ("ECHO", "US"),
    ("CAT", "CT"),
    ("CAT SCAN", "CT"),
    ("PET", "PT"),
    ("PET SCAN", "PT"),
    ("MAMMO", "MG"),
];

const BODY_REGION_ALIASES: &[(&str, &str)] = &[
    ("cspine", "c-spine"),
    ("c_spine", "c-spine"),
    ("cervical_spine", "c-spine"),
    ("tspine", "t-spine"),
    ("t_spine", "t-spine"),
    ("thoracic_spine", "t-spine"),
    ("lspine", "l-spine"),
    ("l_spine", "l-spine"),
    ("lumbar_spine", "l-spine"),
    ("abd", "abdomen"),
    ("cxr", "chest"),
];

/// Canonical upper-case modality code (`"mri"` → `"MR"`)
pub fn canonical_modality(raw: &str) -> String {
    let normalized = raw.trim().to_ascii_uppercase();
    if MODALITY_CODES.contains(&normalized.as_str()) {
        return normalized;
    }
    MODALITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, code)| code.to_string())
        .unwrap_or(normalized)
}

/// Canonical lower-case body region (`"Abd"` → `"abdomen"`, `"Whole Body"` → `"whole_body"`)
pub fn canonical_body_region(raw: &str) -> String {
    let normalized = raw
        .trim()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    BODY_REGION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, region)| region.to_string())
        .unwrap_or(normalized)
}

/// Human-readable modality name for display; unknown codes pass through
pub fn modality_display_name(code: &str) -> &str {
    match code {
        "CT" => "CT Scan",
        "MR" => "MRI",
        "XR" => "X-Ray",
        "US" => "Ultrasound",
        "NM" => "Nuclear Medicine",
        "PT" => "PET Scan",
        "MG" => "Mammography",
        "FL" => "Fluoroscopy",
        "DX" => "Digital X-Ray",
        "CR" => "Computed Radiography",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_aliases() {
        assert_eq!(canonical_modality("mri"), "MR");
        assert_eq!(canonical_modality(" X-Ray "), "XR");
        assert_eq!(canonical_modality("pet scan"), "PT");
        assert_eq!(canonical_modality("Mammo"), "MG");
        assert_eq!(canonical_modality("ct"), "CT");
    }

    #[test]
    fn test_unknown_modality_kept_free_form() {
        assert_eq!(canonical_modality("dexa"), "DEXA");
    }

    #[test]
    fn test_body_region_aliases() {
        assert_eq!(canonical_body_region("CSpine"), "c-spine");
        assert_eq!(canonical_body_region("lumbar spine"), "l-spine");
        assert_eq!(canonical_body_region("ABD"), "abdomen");
        assert_eq!(canonical_body_region("cxr"), "chest");
        assert_eq!(canonical_body_region("Chest"), "chest");
    }

    #[test]
    fn test_body_region_spaces_become_underscores() {
        assert_eq!(canonical_body_region("  Whole   Body "), "whole_body");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(modality_display_name("MR"), "MRI");
        assert_eq!(modality_display_name("DEXA"), "DEXA");
    }
}
