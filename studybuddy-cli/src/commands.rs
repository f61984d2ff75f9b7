//! Subcommand handlers.

use crate::{Commands, ConfigAction, InputArgs};
use std::io::{IsTerminal, Read, Write};
use std::path::Path;
use studybuddy_core::config::{StudyConfig, load_config, workspace_config_path};
use studybuddy_core::page::{PageSnapshot, SnapshotPageSource};
use studybuddy_core::types::{Artifact, ArtifactKind, ArtifactSource};
use studybuddy_core::{SourceText, Workbench};

/// Global flags that adjust the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub offline: bool,
}

impl Overrides {
    fn apply(&self, config: &mut StudyConfig) {
        if let Some(model) = &self.model {
            config.model.model = model.clone();
            config.model.enabled = true;
        }
        if self.offline {
            config.model.enabled = false;
        }
    }
}

/// Load configuration and open the workbench it describes.
fn open(workspace: &Path, overrides: &Overrides) -> anyhow::Result<(StudyConfig, Workbench)> {
    let mut config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    overrides.apply(&mut config);
    let workbench = Workbench::from_config(&config)?;
    Ok((config, workbench))
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    overrides: &Overrides,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Summarize { input } => {
            let (_, workbench) = open(workspace, overrides)?;
            handle_summarize(&workbench, input).await
        }
        Commands::Structure { input } => {
            let (_, workbench) = open(workspace, overrides)?;
            handle_structure(&workbench, input).await
        }
        Commands::List { json } => {
            let (_, workbench) = open(workspace, overrides)?;
            handle_list(&workbench, json).await
        }
        Commands::Show { id, json } => {
            let (_, workbench) = open(workspace, overrides)?;
            handle_show(&workbench, &id, json).await
        }
        Commands::Compare { ids, json } => {
            let (_, workbench) = open(workspace, overrides)?;
            let comparison = workbench.compare(&ids).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                println!("{}", comparison.to_markdown());
            }
            Ok(())
        }
        Commands::Survey { ids, save, output } => {
            let (_, workbench) = open(workspace, overrides)?;
            let outcome = workbench.generate_survey(&ids, save).await?;
            println!("{}", outcome.document.markdown);
            if let Some(path) = output {
                std::fs::write(&path, &outcome.document.markdown)?;
                eprintln!("Wrote survey to {}", path.display());
            }
            if let Some(id) = outcome.saved_id {
                eprintln!("Saved survey as {id}");
            }
            Ok(())
        }
        Commands::Clear { yes } => {
            let (_, workbench) = open(workspace, overrides)?;
            if !yes && !confirm("Remove every saved item?")? {
                println!("Aborted.");
                return Ok(());
            }
            workbench.clear().await?;
            println!("Cleared saved items.");
            Ok(())
        }
        Commands::Status => {
            let (config, workbench) = open(workspace, overrides)?;
            let availability = workbench.check_readiness().await?;
            let count = workbench.saved().await?.len();
            println!("Model:      {} ({})", config.model.model, availability);
            println!("Model on:   {}", config.model.enabled);
            println!("Saved:      {count} / {}", workbench.store().max_entries());
            println!("Store dir:  {}", config.store.resolved_data_dir().display());
            Ok(())
        }
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&StudyConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn handle_summarize(workbench: &Workbench, input: InputArgs) -> anyhow::Result<()> {
    let artifact = match &input.page {
        Some(path) if input.title.is_none() && input.url.is_none() => {
            let source = SnapshotPageSource::new(read_snapshot(path)?);
            workbench.summarize_page(&source, "active").await?
        }
        _ => workbench.summarize(resolve_input(&input)?).await?,
    };
    print_saved(&artifact);
    Ok(())
}

async fn handle_structure(workbench: &Workbench, input: InputArgs) -> anyhow::Result<()> {
    let artifact = workbench.structure(resolve_input(&input)?).await?;
    print_saved(&artifact);
    Ok(())
}

async fn handle_list(workbench: &Workbench, json: bool) -> anyhow::Result<()> {
    let items = workbench.saved().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No saved items.");
        return Ok(());
    }
    for item in &items {
        println!(
            "{}  {}  {:<10}  {:<9}  {}",
            item.id,
            item.when.format("%Y-%m-%d %H:%M"),
            item.kind.as_str(),
            item.source.as_str(),
            item.label()
        );
    }
    Ok(())
}

async fn handle_show(workbench: &Workbench, id: &str, json: bool) -> anyhow::Result<()> {
    let artifact = workbench
        .store()
        .get(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No saved item with id {id}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
    } else {
        println!("{}", render_artifact(&artifact));
    }
    Ok(())
}

/// Markdown body of a saved item under its label.
fn render_artifact(artifact: &Artifact) -> String {
    let body = match artifact.kind {
        ArtifactKind::Structured => artifact
            .fields
            .clone()
            .unwrap_or_default()
            .to_markdown(),
        ArtifactKind::Raw | ArtifactKind::Survey => artifact.text.clone().unwrap_or_default(),
    };
    let mut out = format!("# {}\n\n", artifact.label());
    if let Some(url) = &artifact.url {
        out.push_str(&format!("<{url}>\n\n"));
    }
    out.push_str(&body);
    out
}

fn print_saved(artifact: &Artifact) {
    println!("{}", render_artifact(artifact));
    eprintln!("Saved as {}", artifact.id);
}

fn read_snapshot(path: &Path) -> anyhow::Result<PageSnapshot> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|e| anyhow::anyhow!("Invalid page snapshot {}: {}", path.display(), e))
}

/// Build the workbench input from the text argument, a file, a page snapshot or stdin.
fn resolve_input(input: &InputArgs) -> anyhow::Result<SourceText> {
    let source: ArtifactSource = input
        .source
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut resolved = if let Some(text) = &input.text {
        SourceText::new(text.clone(), source)
    } else if let Some(path) = &input.file {
        SourceText::new(std::fs::read_to_string(path)?, source)
    } else if let Some(path) = &input.page {
        SourceText::from(read_snapshot(path)?.extract())
    } else {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        SourceText::new(text, source)
    };

    if let Some(title) = &input.title {
        resolved = resolved.with_title(title.clone());
    }
    if let Some(url) = &input.url {
        resolved = resolved.with_url(url.clone());
    }
    Ok(resolved)
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use studybuddy_core::types::StructuredRecord;
    use tempfile::TempDir;

    fn input(text: &str) -> InputArgs {
        InputArgs {
            text: Some(text.to_string()),
            source: "textbox".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_overrides() {
        let mut config = StudyConfig::default();
        Overrides {
            model: Some("phi3".to_string()),
            offline: false,
        }
        .apply(&mut config);
        assert!(config.model.enabled);
        assert_eq!(config.model.model, "phi3");

        Overrides {
            model: None,
            offline: true,
        }
        .apply(&mut config);
        assert!(!config.model.enabled);
    }

    #[test]
    fn test_resolve_input_from_text() {
        let mut args = input("some text");
        args.title = Some("T".to_string());
        args.source = "selection".to_string();
        let resolved = resolve_input(&args).unwrap();
        assert_eq!(resolved.text, "some text");
        assert_eq!(resolved.source, ArtifactSource::Selection);
        assert_eq!(resolved.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_resolve_input_rejects_unknown_source() {
        let mut args = input("x");
        args.source = "clipboard".to_string();
        assert!(resolve_input(&args).is_err());
    }

    #[test]
    fn test_resolve_input_from_page_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(
            &path,
            r#"{"selection": "chosen words", "body": "ignored", "url": "https://example.org"}"#,
        )
        .unwrap();
        let args = InputArgs {
            page: Some(path),
            source: "textbox".to_string(),
            ..Default::default()
        };
        let resolved = resolve_input(&args).unwrap();
        assert_eq!(resolved.text, "chosen words");
        assert_eq!(resolved.source, ArtifactSource::Selection);
        assert_eq!(resolved.url.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn test_render_structured_artifact() {
        let artifact = Artifact::structured(
            StructuredRecord::new("o", "m", "d", "92%", "c"),
            ArtifactSource::Textbox,
        )
        .with_title("Paper");
        let out = render_artifact(&artifact);
        assert!(out.starts_with("# Paper\n\n"));
        assert!(out.contains("**Results**: 92%"));
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            &Overrides::default(),
            dir.path(),
        )
        .await
        .unwrap();

        let path = workspace_config_path(dir.path());
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: StudyConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.store.max_entries, 60);
    }
}
