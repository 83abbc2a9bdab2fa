//! Natural-language explanations of impact results and architectures.
//!
//! The explanation service is unreliable by assumption. Every caller goes
//! through [`explain_or_fallback`], which degrades to a template on any
//! failure, so an explanation problem never fails the computation it
//! describes.

use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::GraphMetrics;
use crate::impact::ImpactResult;
use crate::patterns::PatternMatch;
use crate::search::SearchHit;

/// Why an explanation could not be produced.
#[derive(Debug, Error)]
pub enum ExplainError {
    /// No explanation service is configured
    #[error("no explanation service configured")]
    NotConfigured,

    /// The service could not be started or talked to
    #[error("failed to run explanation command: {0}")]
    Io(#[from] std::io::Error),

    /// The service ran and reported failure
    #[error("explanation command failed ({status}): {stderr}")]
    Failed {
        /// Exit status description
        status: String,
        /// Trimmed standard error
        stderr: String,
    },

    /// The service answered with nothing
    #[error("explanation service returned no text")]
    Empty,
}

/// Turns a prompt into explanatory text.
pub trait Explainer: Send + Sync {
    /// Explain `prompt`.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying service.
    fn explain(&self, prompt: &str) -> Result<String, ExplainError>;
}

/// Explainer used when no service is configured; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExplainer;

impl Explainer for NoExplainer {
    fn explain(&self, _prompt: &str) -> Result<String, ExplainError> {
        Err(ExplainError::NotConfigured)
    }
}

/// Runs a shell command with the prompt on stdin and reads the answer from stdout.
#[derive(Debug, Clone)]
pub struct CommandExplainer {
    command: String,
}

impl CommandExplainer {
    /// Use `command`, interpreted by the platform shell.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        }
    }
}

impl Explainer for CommandExplainer {
    fn explain(&self, prompt: &str) -> Result<String, ExplainError> {
        debug!(command = %self.command, prompt_len = prompt.len(), "requesting explanation");
        let mut child = self
            .shell()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Written from a separate thread so a chatty command cannot block on a full stdout pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_string();
            std::thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });
        let output = child.wait_with_output()?;
        let write_result = match writer.map(std::thread::JoinHandle::join) {
            None | Some(Ok(Ok(()))) => Ok(()),
            // The command may legitimately exit without reading its input
            Some(Ok(Err(e))) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            Some(Ok(Err(e))) => Err(ExplainError::Io(e)),
            Some(Err(_)) => Err(ExplainError::Io(std::io::Error::other(
                "prompt writer thread panicked",
            ))),
        };

        if !output.status.success() {
            return Err(ExplainError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        write_result?;
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ExplainError::Empty);
        }
        Ok(text)
    }
}

/// Text of an explanation and whether it came from the template.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Explanation {
    /// Explanation text
    pub text: String,
    /// `true` when the service failed and the template was used
    pub fallback: bool,
}

/// Ask `explainer`, falling back to `fallback()` on any failure.
pub fn explain_or_fallback(
    explainer: &dyn Explainer,
    prompt: &str,
    fallback: impl FnOnce() -> String,
) -> Explanation {
    match explainer.explain(prompt) {
        Ok(text) => Explanation {
            text,
            fallback: false,
        },
        Err(ExplainError::NotConfigured) => Explanation {
            text: fallback(),
            fallback: true,
        },
        Err(e) => {
            warn!(error = %e, "explanation service failed, using template");
            Explanation {
                text: fallback(),
                fallback: true,
            }
        }
    }
}

// ============================================================================
// Prompts and templates
// ============================================================================

/// Files listed in prompts before truncating.
const PROMPT_FILE_LIMIT: usize = 20;

fn push_list(out: &mut String, title: &str, items: &[String]) {
    out.push_str(title);
    out.push_str(":\n");
    if items.is_empty() {
        out.push_str("- (none)\n");
    }
    for item in items.iter().take(PROMPT_FILE_LIMIT) {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
    if items.len() > PROMPT_FILE_LIMIT {
        out.push_str(&format!("- ... and {} more\n", items.len() - PROMPT_FILE_LIMIT));
    }
}

/// Prompt asking for the consequences of a change.
#[must_use]
pub fn impact_prompt(result: &ImpactResult, related: &[SearchHit]) -> String {
    let mut prompt = format!(
        "Analyze the impact of this change using only the evidence below.\n\
         Do not assume behavior that is not shown. Cite files for every claim.\n\n\
         Change: {} {}\nRisk: {} (score {}/100)\n\n",
        result.change_type.as_str(),
        result.file,
        result.risk_level,
        result.risk_score,
    );
    push_list(&mut prompt, "Direct dependents", &result.direct_dependents);
    push_list(&mut prompt, "Indirect dependents (2-3 hops)", &result.indirect_dependents);
    let functions: Vec<String> = result
        .functions_affected
        .functions
        .iter()
        .map(|f| format!("{} (called from {} files)", f.name, f.caller_count))
        .collect();
    push_list(&mut prompt, "Functions declared in the file", &functions);
    let related: Vec<String> = related.iter().map(|hit| hit.id.clone()).collect();
    push_list(&mut prompt, "Related files", &related);
    prompt.push_str("\nExplain what may break and why.");
    prompt
}

/// Template used when an impact explanation cannot be generated.
#[must_use]
pub fn impact_fallback(result: &ImpactResult) -> String {
    format!(
        "{}: affects {} files with {} risk",
        result.change_type.as_str().to_uppercase(),
        result.total_affected,
        result.risk_level
    )
}

/// Prompt asking for an architecture summary.
#[must_use]
pub fn architecture_prompt(metrics: &GraphMetrics, patterns: &[PatternMatch], files: &[String]) -> String {
    let mut prompt = format!(
        "Infer the architecture of a repository using only the evidence below.\n\
         Cite files for every claim.\n\n\
         Files: {}\nDependencies: {}\nAverage coupling: {:.2}\nCycles: {}\n\n",
        metrics.total_files, metrics.total_dependencies, metrics.avg_coupling, metrics.cycle_count,
    );
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| {
            format!(
                "{} detected={} confidence={:.1} [{}]",
                p.pattern,
                p.detected,
                p.confidence,
                p.evidence.join(", ")
            )
        })
        .collect();
    push_list(&mut prompt, "Pattern heuristics", &patterns);
    let coupled: Vec<String> = metrics
        .high_coupling
        .iter()
        .map(|c| format!("{} (in {}, out {})", c.file, c.fan_in, c.fan_out))
        .collect();
    push_list(&mut prompt, "Highly coupled files", &coupled);
    push_list(&mut prompt, "Files", files);
    prompt.push_str("\nDescribe the architectural style and module responsibilities.");
    prompt
}

/// Template used when an architecture summary cannot be generated.
#[must_use]
pub fn architecture_fallback(metrics: &GraphMetrics, patterns: &[PatternMatch]) -> String {
    let detected: Vec<String> = patterns
        .iter()
        .filter(|p| p.detected)
        .map(|p| format!("{} ({:.0}%)", p.pattern, p.confidence * 100.0))
        .collect();
    let style = if detected.is_empty() {
        "no recognizable pattern".to_string()
    } else {
        detected.join(", ")
    };
    format!(
        "{} files, {} dependencies, average coupling {:.2}, {} cycles; architecture: {style}",
        metrics.total_files, metrics.total_dependencies, metrics.avg_coupling, metrics.cycle_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::{FunctionsAffected, ImpactBreakdown};
    use crate::patterns::PatternDetector;
    use crate::types::{ChangeType, RiskLevel};

    fn result() -> ImpactResult {
        ImpactResult {
            file: "config.py".into(),
            change_type: ChangeType::Delete,
            direct_dependents: vec!["a.py".into(), "b.py".into()],
            indirect_dependents: vec!["c.py".into()],
            total_affected: 3,
            functions_affected: FunctionsAffected::default(),
            risk_level: RiskLevel::High,
            risk_score: 60,
            impact_breakdown: ImpactBreakdown::default(),
        }
    }

    struct Failing;

    impl Explainer for Failing {
        fn explain(&self, _prompt: &str) -> Result<String, ExplainError> {
            Err(ExplainError::Empty)
        }
    }

    #[test]
    fn failure_degrades_to_template() {
        let explanation = explain_or_fallback(&Failing, "prompt", || impact_fallback(&result()));
        assert!(explanation.fallback);
        assert_eq!(explanation.text, "DELETE: affects 3 files with high risk");
    }

    #[test]
    fn unconfigured_service_uses_template() {
        let explanation = explain_or_fallback(&NoExplainer, "prompt", || "template".into());
        assert_eq!(
            explanation,
            Explanation {
                text: "template".into(),
                fallback: true
            }
        );
    }

    #[test]
    fn impact_prompt_lists_dependents() {
        let prompt = impact_prompt(&result(), &[]);
        assert!(prompt.contains("Change: delete config.py"));
        assert!(prompt.contains("- a.py\n- b.py\n"));
        assert!(prompt.contains("Related files:\n- (none)\n"));
    }

    #[test]
    fn architecture_fallback_names_detected_patterns() {
        let patterns = PatternDetector::detect(&["app/controllers/u.js", "app/models/u.js"]);
        let metrics = GraphMetrics {
            total_files: 2,
            total_dependencies: 1,
            avg_coupling: 0.5,
            cycle_count: 0,
            cycles: Vec::new(),
            high_coupling: Vec::new(),
        };
        assert_eq!(
            architecture_fallback(&metrics, &patterns),
            "2 files, 1 dependencies, average coupling 0.50, 0 cycles; architecture: mvc (90%)"
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_explainer_pipes_prompt_through_command() {
        let explainer = CommandExplainer::new("tr a-z A-Z");
        assert_eq!(explainer.explain("blast radius").expect("explain"), "BLAST RADIUS");
    }

    #[cfg(unix)]
    #[test]
    fn command_explainer_reports_failure() {
        let explainer = CommandExplainer::new("echo broken >&2; exit 3");
        let err = explainer.explain("x").expect_err("should fail");
        assert!(matches!(err, ExplainError::Failed { ref stderr, .. } if stderr == "broken"));
    }
}
