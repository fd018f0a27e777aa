//! Context store — the immutable professional context.
//!
//! Three documents make up the context:
//!
//! 1. **Resume** — full work history (text or PDF)
//! 2. **Profile** — a longer profile export, e.g. a LinkedIn PDF
//! 3. **Summary** — a short hand-written summary
//!
//! All three are required. They are read exactly once at startup into a
//! [`ProfessionalContext`], fingerprinted, and shared behind an `Arc` by every
//! request. Nothing reloads them mid-session.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::error::ContextLoadError;

/// Where the context documents live.
#[derive(Debug, Clone, Default)]
pub struct ContextSources {
    pub resume: PathBuf,
    pub profile: PathBuf,
    pub summary: PathBuf,
}

/// The immutable bundle every responder and evaluator call is grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalContext {
    pub resume_text: String,
    pub profile_text: String,
    pub summary_text: String,

    /// Content fingerprint; drafts and verdicts carry it so a mismatch is detectable
    pub version: String,

    /// Which files were read (for diagnostics)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loaded_files: Vec<String>,
}

impl ProfessionalContext {
    /// Build a context from in-memory documents.
    pub fn from_parts(
        resume_text: impl Into<String>,
        profile_text: impl Into<String>,
        summary_text: impl Into<String>,
    ) -> Self {
        let resume_text = resume_text.into();
        let profile_text = profile_text.into();
        let summary_text = summary_text.into();
        let version = fingerprint(&[&resume_text, &profile_text, &summary_text]);
        Self {
            resume_text,
            profile_text,
            summary_text,
            version,
            loaded_files: Vec::new(),
        }
    }

    /// Render the documents for injection into a prompt.
    ///
    /// ```text
    /// <summary>
    /// ...
    /// </summary>
    ///
    /// <profile>
    /// ...
    /// </profile>
    ///
    /// <resume>
    /// ...
    /// </resume>
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.summary_text.len() + self.profile_text.len() + self.resume_text.len() + 64,
        );
        for (tag, body) in [
            ("summary", &self.summary_text),
            ("profile", &self.profile_text),
            ("resume", &self.resume_text),
        ] {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("<{tag}>\n{}\n</{tag}>\n", body.trim()));
        }
        out
    }

    /// Estimate the token count of the rendered context (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        (self.resume_text.len() + self.profile_text.len() + self.summary_text.len()) / 4
    }

    pub fn diagnostic_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Context Version: {}\n", self.version));
        summary.push_str(&format!("Resume:  {} chars\n", self.resume_text.len()));
        summary.push_str(&format!("Profile: {} chars\n", self.profile_text.len()));
        summary.push_str(&format!("Summary: {} chars\n", self.summary_text.len()));
        summary.push_str(&format!("Estimated Tokens: ~{}\n", self.estimated_tokens()));
        summary.push_str(&format!("Files Loaded: {}\n", self.loaded_files.len()));
        for f in &self.loaded_files {
            summary.push_str(&format!("  - {f}\n"));
        }
        summary
    }
}

/// Loads the professional context, once.
pub struct ContextStore {
    sources: ContextSources,
    loaded: AtomicBool,
}

impl ContextStore {
    pub fn new(sources: ContextSources) -> Self {
        Self {
            sources,
            loaded: AtomicBool::new(false),
        }
    }

    /// Read every document and assemble the context.
    ///
    /// A second call on the same store fails with
    /// [`ContextLoadError::AlreadyLoaded`].
    pub fn load(&self) -> Result<Arc<ProfessionalContext>, ContextLoadError> {
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Err(ContextLoadError::AlreadyLoaded);
        }

        let resume = read_document("resume", &self.sources.resume)?;
        let profile = read_document("profile", &self.sources.profile)?;
        let summary = read_document("summary", &self.sources.summary)?;

        let mut context = ProfessionalContext::from_parts(resume, profile, summary);
        context.loaded_files = [
            &self.sources.resume,
            &self.sources.profile,
            &self.sources.summary,
        ]
        .iter()
        .map(|p| p.display().to_string())
        .collect();

        info!(
            version = %context.version,
            tokens = context.estimated_tokens(),
            "Professional context loaded"
        );

        Ok(Arc::new(context))
    }
}

/// Read one document as text, extracting PDFs.
fn read_document(label: &str, path: &Path) -> Result<String, ContextLoadError> {
    if !path.is_file() {
        return Err(ContextLoadError::Missing {
            label: label.into(),
            path: path.to_path_buf(),
        });
    }

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let raw = if is_pdf {
        read_pdf(label, path)?
    } else {
        std::fs::read_to_string(path).map_err(|e| ContextLoadError::Unreadable {
            label: label.into(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    };

    let text = normalize(&raw);
    if text.is_empty() {
        return Err(ContextLoadError::Empty {
            label: label.into(),
            path: path.to_path_buf(),
        });
    }

    debug!(document = label, file = %path.display(), chars = text.len(), "Loaded context document");
    Ok(text)
}

#[cfg(feature = "pdf")]
fn read_pdf(label: &str, path: &Path) -> Result<String, ContextLoadError> {
    pdf_extract::extract_text(path).map_err(|e| ContextLoadError::Unreadable {
        label: label.into(),
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(_label: &str, path: &Path) -> Result<String, ContextLoadError> {
    Err(ContextLoadError::PdfUnsupported(path.to_path_buf()))
}

/// Unify line endings and drop trailing whitespace on every line.
fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_sources(dir: &Path) -> ContextSources {
        fs::write(dir.join("resume.md"), "Engineer at Acme (2019-2022)\nEngineer at Beta (2022-now)").unwrap();
        fs::write(dir.join("profile.txt"), "Backend engineer focused on data pipelines.\r\n").unwrap();
        fs::write(dir.join("summary.txt"), "Ada builds reliable systems.").unwrap();
        ContextSources {
            resume: dir.join("resume.md"),
            profile: dir.join("profile.txt"),
            summary: dir.join("summary.txt"),
        }
    }

    #[test]
    fn load_reads_all_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContextStore::new(write_sources(tmp.path()));
        let ctx = store.load().unwrap();

        assert!(ctx.resume_text.contains("Acme"));
        assert_eq!(ctx.profile_text, "Backend engineer focused on data pipelines.");
        assert_eq!(ctx.loaded_files.len(), 3);
        assert_eq!(ctx.version.len(), 12);
    }

    #[test]
    fn second_load_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContextStore::new(write_sources(tmp.path()));
        store.load().unwrap();
        assert!(matches!(store.load(), Err(ContextLoadError::AlreadyLoaded)));
    }

    #[test]
    fn missing_document_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sources = write_sources(tmp.path());
        sources.summary = tmp.path().join("nope.txt");
        let err = ContextStore::new(sources).load().unwrap_err();
        assert!(matches!(err, ContextLoadError::Missing { ref label, .. } if label == "summary"));
    }

    #[test]
    fn whitespace_document_is_unparsable() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = write_sources(tmp.path());
        fs::write(&sources.profile, "  \n\t\n").unwrap();
        let err = ContextStore::new(sources).load().unwrap_err();
        assert!(matches!(err, ContextLoadError::Empty { .. }));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn garbage_pdf_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sources = write_sources(tmp.path());
        let pdf = tmp.path().join("linkedin.pdf");
        fs::write(&pdf, b"this is not a pdf").unwrap();
        sources.profile = pdf;
        let err = ContextStore::new(sources).load().unwrap_err();
        assert!(matches!(err, ContextLoadError::Unreadable { .. }));
    }

    #[test]
    fn version_tracks_content() {
        let a = ProfessionalContext::from_parts("r", "p", "s");
        let b = ProfessionalContext::from_parts("r", "p", "s");
        let c = ProfessionalContext::from_parts("r", "p", "s2");
        assert_eq!(a.version, b.version);
        assert_ne!(a.version, c.version);
    }

    #[test]
    fn render_wraps_sections_in_tags() {
        let ctx = ProfessionalContext::from_parts("Worked at Acme", "Profile", "Summary");
        let rendered = ctx.render();
        assert!(rendered.contains("<resume>\nWorked at Acme\n</resume>"));
        assert!(rendered.find("<summary>").unwrap() < rendered.find("<resume>").unwrap());
    }

    #[test]
    fn diagnostic_summary_lists_version() {
        let ctx = ProfessionalContext::from_parts("r", "p", "s");
        assert!(ctx.diagnostic_summary().contains(&ctx.version));
    }
}
