use anyhow::Context;
use clap::Parser;
use lore::cli::{commands, Cli, Commands};
use lore::types::requests::{Feedback, OVERALL_SCORE};
use lore::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Carrega configuração primeiro (ainda sem logging)
    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("invalid configuration in {}", cli.config.display()))?
    } else {
        Config::default_config()
    };

    // Flags da CLI têm precedência sobre a config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("lore={}", log_level)
            .parse()
            .with_context(|| format!("invalid log level '{}'", log_level))?,
    );

    // stdout pertence ao canal MCP; logs vão para stderr.
    let json_layer = (config.general.log_format == "json")
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (config.general.log_format != "json")
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            commands::init(path).await?;
        }
        Commands::Serve => {
            commands::serve(&config).await?;
        }
        Commands::Status => {
            commands::status(&config).await?;
        }
        Commands::Config => {
            commands::config_cmd(&cli.config).await?;
        }
        Commands::Doctor => {
            commands::doctor(&cli.config, &config).await?;
        }
        Commands::Version => {
            commands::version();
        }
        Commands::Analyze {
            files,
            technologies,
            project_type,
            score,
            security,
        } => {
            let mut context = commands::context_from_args(&technologies, project_type);
            if let Some(score) = score {
                context = context.with_success_metric(OVERALL_SCORE, score);
            }
            commands::analyze(&files, context, security, cli.quiet, &config).await?;
        }
        Commands::Learn { file } => {
            commands::learn(&file, &config)
                .await
                .with_context(|| format!("could not learn from {}", file.display()))?;
        }
        Commands::Recommend {
            technologies,
            project_type,
            json,
        } => {
            let context = commands::context_from_args(&technologies, project_type);
            commands::recommend(context, json, &config).await?;
        }
        Commands::Predict {
            technologies,
            project_type,
            json,
        } => {
            let context = commands::context_from_args(&technologies, project_type);
            commands::predict(context, json, &config).await?;
        }
        Commands::Feedback {
            recommendation_id,
            rating,
            text,
            implemented,
        } => {
            let mut feedback = Feedback::new(recommendation_id, rating);
            feedback.feedback_text = text;
            feedback.implemented = implemented;
            commands::feedback(feedback, &config).await?;
        }
        Commands::Maintain { job } => {
            commands::maintain(job, &config).await?;
        }
        Commands::Export { output } => {
            commands::export(&output, &config).await?;
        }
        Commands::Import { input } => {
            commands::import(&input, &config)
                .await
                .with_context(|| format!("could not import {}", input.display()))?;
        }
    }

    Ok(())
}
