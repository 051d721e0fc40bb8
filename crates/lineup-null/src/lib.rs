//! lineup-null — Reference engine for validating the test driver.
//!
//! Produces fixed-payload templates, finalizes by copying the corpus
//! under its own private names, and answers searches by cycling through
//! the enrolled ids with synthetic descending scores. Deterministic by
//! construction so driver tests can assert exact artifacts.

pub mod config;

pub use config::NullConfig;

use lineup_core::{
    Candidate, EyePair, IdentEngine, Identification, Image, ReturnCode, ReturnStatus,
    TemplateOutput, TemplateRole,
};
use std::path::Path;

/// Private names the null engine stores its finalized corpus under.
const EDB_NAME: &str = "null.edb";
const MANIFEST_NAME: &str = "null.manifest";

/// The trivially correct engine.
#[derive(Debug, Default)]
pub struct NullEngine {
    config: NullConfig,
    /// Subject ids loaded from the finalized manifest, in manifest order.
    template_ids: Vec<String>,
    gpu: u8,
    extractions: u64,
}

impl NullEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load_config(&mut self, config_dir: &Path) -> ReturnStatus {
        match NullConfig::load(config_dir) {
            Ok(cfg) => {
                self.config = cfg;
                ReturnStatus::ok()
            }
            Err(e) => ReturnStatus::new(ReturnCode::ConfigError, e.to_string()),
        }
    }
}

impl IdentEngine for NullEngine {
    fn initialize_enrollment_session(&mut self, config_dir: &Path) -> ReturnStatus {
        self.gpu = 0;
        self.extractions = 0;
        tracing::debug!(
            config_dir = %config_dir.display(),
            gpu = self.gpu,
            "null engine: enrollment session"
        );
        self.load_config(config_dir)
    }

    fn create_template(&mut self, _face: &Image, _role: TemplateRole) -> TemplateOutput {
        self.extractions += 1;
        if let Some(n) = self.config.fail_every {
            if n > 0 && self.extractions % u64::from(n) == 0 {
                return TemplateOutput {
                    status: ReturnStatus::new(ReturnCode::ExtractError, "injected failure"),
                    template: Vec::new(),
                    eyes: EyePair::default(),
                };
            }
        }
        TemplateOutput {
            status: ReturnStatus::ok(),
            template: self.config.template_text.clone().into_bytes(),
            eyes: EyePair {
                is_left_assigned: true,
                is_right_assigned: true,
                ..EyePair::default()
            },
        }
    }

    fn finalize_enrollment(
        &mut self,
        enroll_dir: &Path,
        edb: &Path,
        manifest: &Path,
    ) -> ReturnStatus {
        // The driver's corpus must be copied, not referenced; it may be
        // unreadable after this call returns.
        if let Err(e) = std::fs::copy(edb, enroll_dir.join(EDB_NAME)) {
            return ReturnStatus::new(ReturnCode::EnrollDirError, e.to_string());
        }
        if let Err(e) = std::fs::copy(manifest, enroll_dir.join(MANIFEST_NAME)) {
            return ReturnStatus::new(ReturnCode::EnrollDirError, e.to_string());
        }
        tracing::info!(enroll_dir = %enroll_dir.display(), "null engine: corpus finalized");
        ReturnStatus::ok()
    }

    fn initialize_probe_template_session(
        &mut self,
        config_dir: &Path,
        _enroll_dir: &Path,
    ) -> ReturnStatus {
        self.extractions = 0;
        self.load_config(config_dir)
    }

    fn initialize_identification_session(
        &mut self,
        _config_dir: &Path,
        enroll_dir: &Path,
    ) -> ReturnStatus {
        let manifest = enroll_dir.join(MANIFEST_NAME);
        let raw = match std::fs::read_to_string(&manifest) {
            Ok(raw) => raw,
            Err(e) => {
                return ReturnStatus::new(
                    ReturnCode::EnrollDirError,
                    format!("cannot read {}: {e}", manifest.display()),
                );
            }
        };
        // Manifest lines are `id length offset` triples.
        self.template_ids = raw
            .split_whitespace()
            .step_by(3)
            .map(str::to_string)
            .collect();
        tracing::debug!(enrolled = self.template_ids.len(), "null engine: gallery loaded");
        ReturnStatus::ok()
    }

    fn identify_template(&mut self, _probe: &[u8], candidate_list_length: u32) -> Identification {
        if self.template_ids.is_empty() {
            return Identification {
                status: ReturnStatus::new(ReturnCode::VendorError, "empty gallery"),
                candidates: Vec::new(),
                decision: false,
            };
        }
        let candidates = (0..candidate_list_length)
            .map(|i| Candidate {
                is_assigned: true,
                template_id: self.template_ids[i as usize % self.template_ids.len()].clone(),
                similarity_score: f64::from(candidate_list_length - i),
            })
            .collect();
        Identification {
            status: ReturnStatus::ok(),
            candidates,
            decision: true,
        }
    }

    fn set_gpu(&mut self, gpu_num: u8) -> ReturnStatus {
        self.gpu = gpu_num;
        ReturnStatus::ok()
    }
}
