//! Comandos da CLI do Lore.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::knowledge::KnowledgeBase;
use crate::maintenance::MaintenanceJob;
use crate::storage::{self, RecordSet};
use crate::types::config::{Config, InferenceBackend};
use crate::types::requests::{Feedback, ProjectContext, ProjectOutcome};
use crate::types::responses::{Prediction, Recommendation};
use crate::{inference, LoreError, LoreResult};

/// Inicializa configuração no diretório especificado.
pub async fn init(path: Option<PathBuf>) -> LoreResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join("lore.toml");

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use 'lore config' to modify.");
        return Ok(());
    }

    let data_dir = target_dir.join(".lore");
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!(".lore/ directory created");
    }

    update_gitignore(&target_dir)?;

    let config = Config::default_config();
    config.save(&config_path)?;

    println!("Lore initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Data directory: .lore/");
    println!();
    println!("Next steps:");
    println!("  1. Check the setup: lore doctor");
    println!("  2. Configure options: lore config");
    println!("  3. Register the MCP server with your client: lore serve");

    Ok(())
}

/// Adiciona `.lore/` ao .gitignore do diretório, criando-o se necessário.
fn update_gitignore(target_dir: &Path) -> LoreResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let entry = ".lore/";
    let comment = "# Lore - local knowledge base";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)?;

        if content
            .lines()
            .any(|line| line.trim() == entry || line.trim() == ".lore")
        {
            tracing::debug!(".gitignore already contains .lore/");
            return Ok(());
        }

        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(comment);
        new_content.push('\n');
        new_content.push_str(entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)?;
        println!(".gitignore updated with .lore/");
    } else {
        std::fs::write(&gitignore_path, format!("{}\n{}\n", comment, entry))?;
        println!(".gitignore created with .lore/");
    }

    Ok(())
}

/// Inicia o servidor MCP via stdio.
pub async fn serve(config: &Config) -> LoreResult<()> {
    use crate::mcp::McpServer;

    tracing::debug!(
        storage = ?config.storage.backend,
        inference = ?config.inference.backend,
        "Configuration loaded"
    );

    let knowledge = Arc::new(KnowledgeBase::open(config.clone()).await?);
    McpServer::stdio(knowledge).run().await
}

/// Mostra o que a base de conhecimento contém.
pub async fn status(config: &Config) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let metrics = knowledge.get_metrics().await;

    println!("Lore knowledge base ({})\n", knowledge.gateway().name());
    println!("  Patterns:            {}", metrics.knowledge_base_stats.patterns);
    println!(
        "  Project outcomes:    {}",
        metrics.knowledge_base_stats.project_outcomes
    );
    println!(
        "  Correlations:        {}",
        metrics.knowledge_base_stats.technology_correlations
    );
    println!(
        "  Predictor weights:   {}",
        metrics.knowledge_base_stats.success_predictors
    );
    println!(
        "  Feedback entries:    {}",
        metrics.knowledge_base_stats.feedback_entries
    );
    println!(
        "  Accuracy:            {:.0}%",
        metrics.recommendation_accuracy * 100.0
    );
    println!("  Model version:       {}", metrics.model_version);

    if !metrics.pattern_distribution.is_empty() {
        println!("\nPatterns by type:");
        for (kind, count) in &metrics.pattern_distribution {
            println!("  {:<20} {}", kind, count);
        }
    }

    if !metrics.technology_success_rates.is_empty() {
        println!("\nTechnology success rates:");
        for (tech, rate) in &metrics.technology_success_rates {
            println!("  {:<20} {:.0}%", tech, rate * 100.0);
        }
    }

    Ok(())
}

/// Configura opções interativamente.
pub async fn config_cmd(config_path: &Path) -> LoreResult<()> {
    use super::interactive::{run_interactive_config, show_config_summary};

    if config_path.exists() {
        let config = Config::load(config_path)?;
        show_config_summary(&config);
    }

    run_interactive_config(config_path)
}

/// Diagnostica problemas de configuração.
pub async fn doctor(config_path: &Path, config: &Config) -> LoreResult<()> {
    println!("Diagnosing Lore configuration...\n");

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if config_path.exists() {
        match Config::load(config_path) {
            Ok(_) => println!("✓ Configuration loaded from {}", config_path.display()),
            Err(e) => issues.push(format!("{}: {}", config_path.display(), e)),
        }
    } else {
        warnings.push(format!(
            "{} not found, using defaults (run 'lore init')",
            config_path.display()
        ));
    }

    match storage::open_gateway(&config.storage) {
        Ok(gateway) => match gateway.count_records(RecordSet::Patterns).await {
            Ok(count) => println!(
                "✓ Storage '{}' is readable ({} patterns)",
                gateway.name(),
                count
            ),
            Err(e) => issues.push(format!("Storage '{}' is not readable: {}", gateway.name(), e)),
        },
        Err(e) => issues.push(format!("Storage could not be opened: {}", e)),
    }

    if config.inference.backend == InferenceBackend::Disabled {
        println!("○ Inference is disabled (architecture suggestions off)");
    } else {
        match inference::from_config(&config.inference) {
            Ok(Some(service)) => {
                if service.is_available().await {
                    println!("✓ Inference backend '{}' is available", service.name());
                } else {
                    warnings.push(format!(
                        "Inference backend '{}' does not answer; recommendations will skip architecture suggestions",
                        service.name()
                    ));
                }
            }
            Ok(None) => println!("○ Inference is disabled"),
            Err(e) => issues.push(format!("Inference backend misconfigured: {}", e)),
        }
    }

    if !config.maintenance.enabled {
        warnings.push("Background maintenance is disabled; run 'lore maintain' manually".to_string());
    }

    println!();
    if issues.is_empty() && warnings.is_empty() {
        println!("✓ All good! Lore is ready to use.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for warning in warnings {
                println!("  ⚠ {}", warning);
            }
        }
        if !issues.is_empty() {
            println!("Problems:");
            for issue in issues {
                println!("  ✗ {}", issue);
            }
        }
    }

    Ok(())
}

/// Mostra versão.
pub fn version() {
    println!("lore {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Adaptive knowledge and recommendation engine over MCP");
}

/// Monta um contexto de consulta a partir das flags da linha de comando.
pub fn context_from_args(technologies: &[String], project_type: Option<String>) -> ProjectContext {
    let context = ProjectContext::new().with_technologies(
        technologies
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty()),
    );
    match project_type {
        Some(project_type) => context.with_project_type(project_type),
        None => context,
    }
}

/// Aprende patterns de arquivos-fonte, um arquivo por vez.
pub async fn analyze(
    files: &[PathBuf],
    context: ProjectContext,
    security: bool,
    quiet: bool,
    config: &Config,
) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(files.len() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut new_patterns = 0;
    let mut updated = 0;
    let mut skipped = 0;

    for file in files {
        progress.set_message(file.display().to_string());

        let sample = match tokio::fs::read_to_string(file).await {
            Ok(sample) => vec![sample],
            Err(e) => {
                progress.println(format!("  ✗ {}: {}", file.display(), e));
                skipped += 1;
                progress.inc(1);
                continue;
            }
        };

        let report = if security {
            knowledge.security_pattern_analysis(&sample, &context).await?
        } else {
            knowledge.analyze_patterns(&sample, &context).await?
        };

        new_patterns += report.new_patterns.len();
        updated += report.pattern_improvements.len();
        for skip in &report.skipped_samples {
            progress.println(format!("  ○ {}: {}", file.display(), skip.reason));
            skipped += 1;
        }
        progress.inc(1);
    }
    progress.finish_with_message("done");

    let persisted = knowledge.persist().await?;
    tracing::debug!(records = persisted.total(), "Analysis persisted");

    println!("\nAnalyzed {} file(s)", files.len());
    println!("  New patterns:     {}", new_patterns);
    println!("  Updated patterns: {}", updated);
    println!("  Skipped:          {}", skipped);

    Ok(())
}

/// Registra um projeto concluído lido de JSON.
pub async fn learn(file: &Path, config: &Config) -> LoreResult<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let outcome: ProjectOutcome = serde_json::from_str(&content)
        .map_err(|e| LoreError::validation(format!("{}: {}", file.display(), e)))?;

    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let report = knowledge.learn_from_project(outcome).await?;
    knowledge.persist().await?;

    println!("Learned from project {}", report.project_id);
    println!("  Success score:    {:.2}", report.success_score);
    println!("  Patterns updated: {}", report.patterns_updated);

    Ok(())
}

/// Imprime recomendações ranqueadas.
pub async fn recommend(context: ProjectContext, json: bool, config: &Config) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let recommendations = knowledge.get_recommendations(&context).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations);
    }

    Ok(())
}

fn print_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("No recommendations yet. Teach Lore with 'lore analyze' and 'lore learn'.");
        return;
    }

    println!("Recommendations:\n");
    for (i, rec) in recommendations.iter().enumerate() {
        println!(
            "  {}. [{}] {} ({:.0}%, {} impact)",
            i + 1,
            rec.kind,
            rec.title,
            rec.confidence * 100.0,
            rec.estimated_impact
        );
        println!("     {}", rec.description);
        for step in &rec.implementation_steps {
            println!("     - {}", step);
        }
        println!("     id: {}", rec.id);
    }
}

/// Imprime uma previsão de resultado.
pub async fn predict(context: ProjectContext, json: bool, config: &Config) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let prediction = knowledge.predict_outcome(&context).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&prediction);
    }

    Ok(())
}

fn print_prediction(prediction: &Prediction) {
    println!("Prediction\n");
    println!(
        "  Success score:   {:.2} (confidence {:.2})",
        prediction.predicted_success_score, prediction.confidence
    );
    println!(
        "  Estimated time:  {:.1} h",
        prediction.estimated_completion_time
    );

    let sections = [
        ("Success factors", &prediction.success_factors),
        ("Risk factors", &prediction.risk_factors),
        ("Recommended technologies", &prediction.recommended_technologies),
        ("Potential issues", &prediction.potential_issues),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for item in items {
            println!("  - {}", item);
        }
    }

    if !prediction.similar_projects.is_empty() {
        println!("\nSimilar projects:");
        for project in &prediction.similar_projects {
            println!(
                "  {} ({}) - score {:.2}, {} shared",
                project.project_id, project.project_type, project.success_score, project.similarity
            );
        }
    }
}

/// Avalia uma recomendação.
pub async fn feedback(feedback: Feedback, config: &Config) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let receipt = knowledge.submit_feedback(feedback).await?;
    knowledge.persist().await?;

    println!("Feedback {} recorded", receipt.feedback_id);
    println!(
        "Recommendation accuracy: {:.0}%",
        receipt.recommendation_accuracy * 100.0
    );

    Ok(())
}

/// Executa um ou todos os jobs de manutenção.
pub async fn maintain(job: Option<MaintenanceJob>, config: &Config) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;

    let jobs: Vec<MaintenanceJob> = match job {
        Some(job) => vec![job],
        None => MaintenanceJob::ALL.to_vec(),
    };

    for job in jobs {
        let touched = knowledge.run_maintenance(job).await?;
        println!("✓ {}: {} item(s)", job, touched);
    }

    // Poda e re-análise só alteram a memória até o flush.
    if job != Some(MaintenanceJob::Persist) {
        knowledge.persist().await?;
    }

    Ok(())
}

/// Exporta a base de conhecimento.
pub async fn export(output: &Path, config: &Config) -> LoreResult<()> {
    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let bundle = knowledge.export(output).await?;

    println!("Knowledge exported to: {}", output.display());
    println!("  Patterns: {}", bundle.patterns.len());
    println!("  Outcomes: {}", bundle.outcomes.len());

    Ok(())
}

/// Importa um export da base de conhecimento.
pub async fn import(input: &Path, config: &Config) -> LoreResult<()> {
    if !input.exists() {
        return Err(LoreError::NotFound(input.display().to_string()));
    }

    let knowledge = KnowledgeBase::open(config.clone()).await?;
    let result = knowledge.import(input).await?;
    knowledge.persist().await?;

    println!("Import complete:");
    println!("  Patterns imported: {}", result.imported);
    println!("  Patterns merged:   {}", result.merged);
    println!("  Patterns skipped:  {}", result.skipped);
    println!("  Outcomes imported: {}", result.outcomes_imported);

    Ok(())
}
