//! `quire build` command implementation.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use quire_config::{CliSettings, Config};
use quire_document::Document;
use quire_render::{GeneratedFile, MarkdownConverter, PluginRegistry, Renderer};
use quire_site::Site;
use rayon::prelude::*;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Site source directory (default: current directory).
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output directory (default: <source>/_site).
    #[arg(short, long)]
    destination: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover _config.yml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render posts in _drafts.
    #[arg(short = 'D', long)]
    drafts: bool,

    /// Publish posts dated in the future.
    #[arg(long)]
    future: bool,

    /// Render documents marked `published: false`.
    #[arg(long)]
    unpublished: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

/// A document that failed to render or write.
#[derive(Debug)]
pub(crate) struct Failure {
    pub document: String,
    pub message: String,
}

/// What a build produced.
#[derive(Debug, Default)]
pub(crate) struct BuildSummary {
    pub rendered: usize,
    pub copied: usize,
    pub generated: usize,
    pub failures: Vec<Failure>,
}

impl BuildArgs {
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let dir = match &self.source {
            Some(source) => source.clone(),
            None => std::env::current_dir()?,
        };
        let cli_settings = CliSettings {
            source: self.source.clone(),
            destination: self.destination.clone(),
            show_drafts: self.drafts.then_some(true),
            future: self.future.then_some(true),
            unpublished: self.unpublished.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), &dir, Some(&cli_settings))?;
        config.validate()?;

        output.path("Source", &config.source);
        output.path("Destination", &config.destination);
        let destination = config.destination.clone();

        let summary = build(config, PluginRegistry::new()).await?;

        for failure in &summary.failures {
            output.failure(&failure.document, &failure.message);
        }
        if !summary.failures.is_empty() {
            return Err(CliError::Render {
                failed: summary.failures.len(),
                total: summary.rendered + summary.failures.len(),
            });
        }
        if summary.rendered == 0 {
            output.warning("No documents to render");
        }

        output.summary(&summary, &destination);
        Ok(())
    }
}

/// Read, render and write a site.
///
/// Markdown conversion is always available; `registry` supplies any other
/// plugins. Render failures are collected in the summary rather than
/// aborting the build.
pub(crate) async fn build(config: Config, mut registry: PluginRegistry) -> Result<BuildSummary, CliError> {
    registry.register_converter(MarkdownConverter::from_config(&config));
    let registry = Arc::new(registry);

    let mut site = Site::new(config);
    let mut renderer = Renderer::new(&site, Arc::clone(&registry));
    for plugin in registry.basic() {
        plugin.register(&mut renderer, &mut site)?;
    }

    site.read().await?;
    site.assign_urls(|ext| registry.output_ext(ext));

    let mut generated = Vec::new();
    for generator in registry.generators() {
        let output = generator.generate(&site, &renderer)?;
        tracing::info!(
            generator = generator.name(),
            files = output.files.len(),
            documents = output.documents.len(),
            "Generator finished"
        );
        generated.extend(output.apply(&mut site));
    }
    site.assign_urls(|ext| registry.output_ext(ext));

    renderer.invalidate_site_cache();
    renderer.preload_site_data(&site);

    let documents = site.output_documents();
    let results: Vec<Result<PathBuf, Failure>> = documents
        .par_iter()
        .map(|document| write_document(&site, &renderer, document))
        .collect();

    let mut summary = BuildSummary::default();
    for result in results {
        match result {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Wrote document");
                summary.rendered += 1;
            }
            Err(failure) => {
                tracing::warn!(document = %failure.document, error = %failure.message, "Render failed");
                summary.failures.push(failure);
            }
        }
    }

    summary.generated = write_generated(site.destination(), &generated)?;
    summary.copied = copy_static_files(&site)?;
    Ok(summary)
}

fn write_document(site: &Site, renderer: &Renderer, document: &Document) -> Result<PathBuf, Failure> {
    let failure = |message: String| Failure {
        document: document.relative_path().to_owned(),
        message,
    };
    let html = renderer
        .render_document(site, document)
        .map_err(|e| failure(e.to_string()))?;
    let path = site.output_path(document.url().unwrap_or("/"));
    write_file(&path, &html).map_err(|e| failure(format!("{}: {e}", path.display())))?;
    Ok(path)
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Write generator files, skipping paths that would leave `destination`.
fn write_generated(destination: &Path, files: &[GeneratedFile]) -> Result<usize, CliError> {
    let mut written = 0;
    for file in files {
        let relative = file.path.strip_prefix("/").unwrap_or(&file.path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            tracing::warn!(path = %file.path.display(), "Skipping generated file outside destination");
            continue;
        }
        write_file(&destination.join(relative), &file.content)?;
        written += 1;
    }
    Ok(written)
}

fn copy_static_files(site: &Site) -> Result<usize, CliError> {
    let destination = site.destination();
    for file in site.static_files() {
        let target = file.destination(destination);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&file.path, &target)?;
    }
    Ok(site.static_files().len())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_build_writes_pages_posts_and_static_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "_layouts/default.html", "<body>{{ content }}</body>");
        write(root, "index.html", "---\nlayout: default\n---\n{% for post in site.posts %}{{ post.title }}{% endfor %}");
        write(root, "_posts/2024-01-15-hello.md", "---\ntitle: Hello\nlayout: default\n---\n*hi*");
        write(root, "css/site.css", "body {}");

        let config = Config::default_with_base(root);
        let summary = build(config, PluginRegistry::new()).await.unwrap();

        assert_eq!(summary.rendered, 2);
        assert_eq!(summary.copied, 1);
        assert!(summary.failures.is_empty());

        let site = root.join("_site");
        assert_eq!(
            fs::read_to_string(site.join("index.html")).unwrap(),
            "<body>Hello</body>"
        );
        assert_eq!(
            fs::read_to_string(site.join("2024/01/15/hello.html")).unwrap(),
            "<body><p><em>hi</em></p>\n</body>"
        );
        assert_eq!(fs::read_to_string(site.join("css/site.css")).unwrap(), "body {}");
    }

    #[tokio::test]
    async fn test_build_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "good.html", "---\n---\nok");
        write(root, "bad.html", "---\nlayout: missing\n---\nx");

        let summary = build(Config::default_with_base(root), PluginRegistry::new())
            .await
            .unwrap();

        assert_eq!(summary.rendered, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].document, "bad.html");
        assert!(summary.failures[0].message.contains("Layout 'missing' not found"));
    }

    #[test]
    fn test_generated_files_stay_in_destination() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            GeneratedFile {
                path: PathBuf::from("feed.xml"),
                content: "<feed/>".to_owned(),
            },
            GeneratedFile {
                path: PathBuf::from("../escape.txt"),
                content: "no".to_owned(),
            },
        ];

        let written = write_generated(dir.path(), &files).unwrap();

        assert_eq!(written, 1);
        assert!(dir.path().join("feed.xml").is_file());
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }
}
