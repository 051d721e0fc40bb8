use serde::{Deserialize, Serialize};

/// A decoded raster image handed to the engine for template extraction.
///
/// `depth` is bits per pixel: 8 for grayscale (`data` holds W*H intensity
/// bytes) or 24 for RGB (`data` holds 3*W*H bytes, RGBRGB...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub data: Vec<u8>,
}

impl Image {
    /// Expected byte length of `data` for the declared dimensions.
    pub fn size(&self) -> usize {
        self.width as usize * self.height as usize * (self.depth as usize / 8)
    }
}

/// Intended use of a template, provided as input to template generation.
/// The engine may encode differently per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateRole {
    /// Gallery enrollment for 1:N search.
    Enrollment1N,
    /// Probe template for 1:N search.
    Search1N,
    /// Gallery enrollment for 1:1 verification.
    Enrollment11,
    /// Probe template for 1:1 verification.
    Verification11,
}

/// The closed status-code vocabulary an engine reports from every call.
///
/// Only `Success` permits downstream use of the accompanying output.
/// The integer encoding is stable and is what gets written into logs
/// and candidate files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReturnCode {
    Success = 0,
    /// Error reading configuration files.
    ConfigError = 1,
    /// Elective refusal to process the input.
    RefuseInput = 2,
    /// Involuntary failure to process the image.
    ExtractError = 3,
    /// Cannot parse the input data.
    ParseError = 4,
    /// Elective refusal to produce a template.
    TemplateCreationError = 5,
    /// Either input template came from failed feature extraction.
    VerifTemplateError = 6,
    /// The engine cannot support the number of input images.
    NumDataError = 7,
    /// Template file is an incorrect format or defective.
    TemplateFormatError = 8,
    /// An operation on the enrollment directory failed.
    EnrollDirError = 9,
    /// Cannot locate the input data.
    InputLocationError = 10,
    /// Problem setting or accessing the GPU.
    GpuError = 11,
    /// Vendor-defined failure.
    VendorError = 12,
}

impl ReturnCode {
    /// Stable integer encoding used in persisted artifacts.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReturnCode::Success => "success",
            ReturnCode::ConfigError => "error reading configuration files",
            ReturnCode::RefuseInput => "elective refusal to process the input",
            ReturnCode::ExtractError => "involuntary failure to process the image",
            ReturnCode::ParseError => "cannot parse the input data",
            ReturnCode::TemplateCreationError => "elective refusal to produce a template",
            ReturnCode::VerifTemplateError => {
                "input template came from failed feature extraction"
            }
            ReturnCode::NumDataError => "number of input images not supported",
            ReturnCode::TemplateFormatError => "template format incorrect or defective",
            ReturnCode::EnrollDirError => "operation on the enrollment directory failed",
            ReturnCode::InputLocationError => "cannot locate the input data",
            ReturnCode::GpuError => "problem setting or accessing the GPU",
            ReturnCode::VendorError => "vendor-defined error",
        };
        f.write_str(s)
    }
}

/// Status returned by every engine call, with an optional free-form
/// diagnostic string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatus {
    pub code: ReturnCode,
    pub info: String,
}

impl ReturnStatus {
    pub fn ok() -> Self {
        Self {
            code: ReturnCode::Success,
            info: String::new(),
        }
    }

    pub fn new(code: ReturnCode, info: impl Into<String>) -> Self {
        Self {
            code,
            info: info.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ReturnCode::Success
    }
}

/// Estimated eye centers for a face image.
///
/// Presence is signaled by the per-eye flag, never by a sentinel
/// coordinate; an out-of-range estimate must leave the flag unset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EyePair {
    pub is_left_assigned: bool,
    pub is_right_assigned: bool,
    pub xleft: u16,
    pub yleft: u16,
    pub xright: u16,
    pub yright: u16,
}

/// One ranked hypothesis from an identification search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// False when the engine could not populate this slot.
    pub is_assigned: bool,
    /// Subject id from the enrollment manifest.
    pub template_id: String,
    /// Higher means more likely the same person. Scale is engine-defined.
    pub similarity_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_encoding_is_stable() {
        // These integers appear in persisted artifacts; they must not drift.
        assert_eq!(ReturnCode::Success.as_i32(), 0);
        assert_eq!(ReturnCode::ConfigError.as_i32(), 1);
        assert_eq!(ReturnCode::ExtractError.as_i32(), 3);
        assert_eq!(ReturnCode::EnrollDirError.as_i32(), 9);
        assert_eq!(ReturnCode::InputLocationError.as_i32(), 10);
        assert_eq!(ReturnCode::VendorError.as_i32(), 12);
    }

    #[test]
    fn test_image_size() {
        let rgb = Image {
            width: 4,
            height: 2,
            depth: 24,
            data: vec![0; 24],
        };
        assert_eq!(rgb.size(), 24);

        let gray = Image {
            width: 4,
            height: 2,
            depth: 8,
            data: vec![0; 8],
        };
        assert_eq!(gray.size(), 8);
    }

    #[test]
    fn test_eye_pair_default_unassigned() {
        let eyes = EyePair::default();
        assert!(!eyes.is_left_assigned);
        assert!(!eyes.is_right_assigned);
    }

    #[test]
    fn test_return_status_success() {
        assert!(ReturnStatus::ok().is_success());
        assert!(!ReturnStatus::new(ReturnCode::RefuseInput, "").is_success());
    }
}
