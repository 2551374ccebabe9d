use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;
use crate::extract::{extract_text, DocumentKind, ExtractError};
use crate::generation::pipeline::{
    ReoptimizeRequest, TailorRequest, DEFAULT_OPTIMIZE_ITERATIONS,
};
use crate::generation::{FlowResult, Pipeline};
use crate::llm_client::GeminiClient;
use crate::templates::TemplateStore;

#[derive(Parser)]
#[command(name = "tailor-api")]
#[command(about = "Tailor LaTeX resumes to job descriptions with a generative model")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Tailor a resume to one job description
    Tailor {
        /// Resume as PDF, DOCX or plain text
        #[arg(long)]
        resume: PathBuf,
        /// Job description as plain text
        #[arg(long)]
        job: PathBuf,
        #[arg(long)]
        company: Option<String>,
        /// Overrides GENAI_API_KEY for this run
        #[arg(long)]
        api_key: Option<String>,
        /// Write the LaTeX here instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Optimize an existing LaTeX resume against a job description
    Reoptimize {
        /// LaTeX resume to improve
        #[arg(long)]
        latex: PathBuf,
        #[arg(long)]
        job: PathBuf,
        /// Evaluation feedback to address
        #[arg(long)]
        feedback: Option<String>,
        /// Optimize passes; stops early when a pass changes nothing
        #[arg(long, default_value_t = DEFAULT_OPTIMIZE_ITERATIONS)]
        iterations: usize,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Build a job-agnostic ATS resume, optionally revised once from feedback
    Base {
        #[arg(long)]
        resume: PathBuf,
        #[arg(long)]
        feedback: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Print the plain text of a PDF or DOCX file
    Extract { file: PathBuf },
}

/// Runs a one-shot subcommand. `Serve` is handled by the caller.
pub async fn handle_command(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Serve { .. } => Ok(()),

        Command::Tailor {
            resume,
            job,
            company,
            api_key,
            out,
        } => {
            let pipeline = build_pipeline(&config)?;
            let request = TailorRequest {
                resume_content: read_document(&resume)?,
                job_description: read_text(&job)?,
                company_name: company,
                api_key,
            };

            let flow = pipeline.tailor(&request).await?;
            report(&flow);
            write_latex(&flow, out.as_deref())
        }

        Command::Reoptimize {
            latex,
            job,
            feedback,
            iterations,
            api_key,
            out,
        } => {
            let pipeline = build_pipeline(&config)?;
            let request = ReoptimizeRequest {
                latex_code: read_text(&latex)?,
                job_description: read_text(&job)?,
                feedback: feedback.unwrap_or_default(),
                api_key,
                iterations,
            };

            let flow = pipeline.reoptimize(&request).await?;
            report(&flow);
            write_latex(&flow, out.as_deref())
        }

        Command::Base {
            resume,
            feedback,
            api_key,
            out,
        } => {
            let pipeline = build_pipeline(&config)?;
            let content = read_document(&resume)?;

            let mut flow = pipeline.base_resume(&content, api_key.as_deref()).await?;
            report(&flow);

            if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
                flow.record.api_key = api_key.filter(|k| !k.trim().is_empty());
                flow = pipeline.apply_feedback(&flow.record, &feedback).await?;
                report(&flow);
            }
            write_latex(&flow, out.as_deref())
        }

        Command::Extract { file } => {
            println!("{}", read_document(&file)?);
            Ok(())
        }
    }
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let generator = GeminiClient::new(config)?;
    if config.genai_api_key.is_none() {
        warn!("GENAI_API_KEY not set; steps without --api-key fall back to mock output");
    }
    let templates = TemplateStore::load(config.template_dir.as_deref());
    Ok(Pipeline::new(
        Arc::new(generator),
        Arc::new(templates),
        config.genai_model.clone(),
    ))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Reads PDF or Word files through the extractor; anything else as UTF-8 text.
fn read_document(path: &Path) -> Result<String> {
    let file_name = path.file_name().and_then(|n| n.to_str());
    match DocumentKind::detect(None, file_name) {
        Ok(kind) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(extract_text(kind, &bytes)?)
        }
        Err(ExtractError::Unsupported(_)) => read_text(path),
        Err(e) => Err(e.into()),
    }
}

fn report(flow: &FlowResult) {
    info!("Score: {}", flow.record.score);
    if !flow.record.feedback.is_empty() {
        info!("Feedback: {}", flow.record.feedback);
    }
    if let Some(message) = &flow.record.optimization_message {
        info!("{message}");
    }
    for warning in flow.warnings.as_slice() {
        warn!("{warning}");
    }
}

fn write_latex(flow: &FlowResult, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, &flow.record.latex_code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", flow.record.latex_code),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["tailor-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_tailor_arguments() {
        let cli = Cli::try_parse_from([
            "tailor-api",
            "tailor",
            "--resume",
            "cv.pdf",
            "--job",
            "jd.txt",
            "--company",
            "Acme",
            "-o",
            "out.tex",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Tailor {
                resume,
                company,
                out,
                api_key,
                ..
            }) => {
                assert_eq!(resume, PathBuf::from("cv.pdf"));
                assert_eq!(company.as_deref(), Some("Acme"));
                assert_eq!(out, Some(PathBuf::from("out.tex")));
                assert!(api_key.is_none());
            }
            _ => panic!("expected tailor"),
        }
    }

    #[test]
    fn test_reoptimize_iterations_default() {
        let cli = Cli::try_parse_from([
            "tailor-api",
            "reoptimize",
            "--latex",
            "cv.tex",
            "--job",
            "jd.txt",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Reoptimize { iterations, .. }) => {
                assert_eq!(iterations, DEFAULT_OPTIMIZE_ITERATIONS)
            }
            _ => panic!("expected reoptimize"),
        }

        let cli = Cli::try_parse_from([
            "tailor-api",
            "reoptimize",
            "--latex",
            "cv.tex",
            "--job",
            "jd.txt",
            "--iterations",
            "4",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Reoptimize { iterations: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_reoptimize_without_credentials_keeps_latex() {
        let dir = tempfile::tempdir().unwrap();
        let latex = dir.path().join("resume.tex");
        let job = dir.path().join("job.txt");
        let out = dir.path().join("out.tex");
        let source = "\\documentclass{article}\n\\begin{document}\nJane\n\\end{document}";
        std::fs::write(&latex, source).unwrap();
        std::fs::write(&job, "Rust engineer").unwrap();

        let command = Command::Reoptimize {
            latex,
            job,
            feedback: None,
            iterations: DEFAULT_OPTIMIZE_ITERATIONS,
            api_key: None,
            out: Some(out.clone()),
        };
        handle_command(command, Config::default()).await.unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap(), source);
    }

    #[test]
    fn test_tailor_requires_job() {
        assert!(Cli::try_parse_from(["tailor-api", "tailor", "--resume", "cv.pdf"]).is_err());
    }

    #[test]
    fn test_plain_text_documents_are_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        std::fs::write(&path, "Jane Doe\njane@example.com").unwrap();
        assert_eq!(read_document(&path).unwrap(), "Jane Doe\njane@example.com");
    }

    #[tokio::test]
    async fn test_tailor_without_credentials_writes_mock_latex() {
        let dir = tempfile::tempdir().unwrap();
        let resume = dir.path().join("resume.txt");
        let job = dir.path().join("job.txt");
        let out = dir.path().join("out.tex");
        std::fs::write(&resume, "Jane Doe\njane@example.com").unwrap();
        std::fs::write(&job, "Rust engineer").unwrap();

        let command = Command::Tailor {
            resume,
            job,
            company: Some("Acme".to_string()),
            api_key: None,
            out: Some(out.clone()),
        };
        handle_command(command, Config::default()).await.unwrap();

        let latex = std::fs::read_to_string(out).unwrap();
        assert!(latex.contains("Jane Doe"));
        assert!(latex.contains("Tailored for: Rust engineer"));
    }
}
