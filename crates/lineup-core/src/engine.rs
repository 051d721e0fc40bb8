//! The capability surface an identification engine exposes to the driver.

use crate::types::{Candidate, EyePair, Image, ReturnStatus, TemplateRole};
use std::path::Path;

/// Output of a template-extraction call.
///
/// A failed extraction still carries a template (possibly zero bytes);
/// the driver stores it like any other and relies on `status` alone to
/// tell success from failure.
#[derive(Debug, Clone)]
pub struct TemplateOutput {
    pub status: ReturnStatus,
    pub template: Vec<u8>,
    pub eyes: EyePair,
}

/// Output of an identification search.
///
/// On success `candidates` holds exactly the requested number of
/// entries in descending similarity order. `decision` is the engine's
/// best guess at whether a mate exists in the enrolled set.
#[derive(Debug, Clone)]
pub struct Identification {
    pub status: ReturnStatus,
    pub candidates: Vec<Candidate>,
    pub decision: bool,
}

/// The fixed contract a 1:N identification engine implements.
///
/// Exactly one concrete provider is linked into the driver binary. All
/// session state lives inside the provider; every initialization call
/// receives its directories explicitly, so from the driver's point of
/// view the capability set is stateless between calls.
///
/// None of these calls fail in the Rust sense: outcomes are reported
/// through the closed [`ReturnCode`](crate::ReturnCode) vocabulary and
/// propagated verbatim into artifacts.
pub trait IdentEngine {
    /// Called once before any enrollment-role `create_template` call.
    fn initialize_enrollment_session(&mut self, config_dir: &Path) -> ReturnStatus;

    /// Produce a template for one image in the given role.
    fn create_template(&mut self, face: &Image, role: TemplateRole) -> TemplateOutput;

    /// One-shot consolidation of the enrolled corpus. After a successful
    /// return the enrollment directory is permanently read-only.
    fn finalize_enrollment(
        &mut self,
        enroll_dir: &Path,
        edb: &Path,
        manifest: &Path,
    ) -> ReturnStatus;

    /// Called once before any search-role `create_template` call. The
    /// engine has read-only access to its finalized enrollment data.
    fn initialize_probe_template_session(
        &mut self,
        config_dir: &Path,
        enroll_dir: &Path,
    ) -> ReturnStatus;

    /// Called once before any `identify_template` call.
    fn initialize_identification_session(
        &mut self,
        config_dir: &Path,
        enroll_dir: &Path,
    ) -> ReturnStatus;

    /// Search a probe template against the enrolled set, returning
    /// `candidate_list_length` ranked candidates.
    fn identify_template(&mut self, probe: &[u8], candidate_list_length: u32) -> Identification;

    /// Select the GPU device for subsequent calls. Engines that do not
    /// use GPUs return success and do nothing.
    fn set_gpu(&mut self, gpu_num: u8) -> ReturnStatus;
}
