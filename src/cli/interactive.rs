//! Configuração interativa.
//!
//! Edição do `lore.toml` por menus com dialoguer.

use std::path::{Path, PathBuf};

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::types::config::{Config, InferenceBackend, StorageBackend};
use crate::LoreResult;

/// Executa a configuração interativa.
pub fn run_interactive_config(config_path: &Path) -> LoreResult<()> {
    let theme = ColorfulTheme::default();

    println!("\n🔧 Lore Interactive Configuration\n");

    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        println!("Creating new configuration...\n");
        Config::default_config()
    };

    loop {
        let options = [
            "General",
            "Learning",
            "Recommendations",
            "Cache",
            "Inference",
            "Storage",
            "Maintenance",
            "Save and Exit",
            "Exit without Saving",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What do you want to configure?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => configure_general(&theme, &mut config)?,
            1 => configure_learning(&theme, &mut config)?,
            2 => configure_recommendations(&theme, &mut config)?,
            3 => configure_cache(&theme, &mut config)?,
            4 => configure_inference(&theme, &mut config)?,
            5 => configure_storage(&theme, &mut config)?,
            6 => configure_maintenance(&theme, &mut config)?,
            7 => {
                if let Err(e) = config.validate() {
                    println!("\n✗ {}\n", e);
                    continue;
                }
                config.save(config_path)?;
                println!("\n✓ Configuration saved to: {}\n", config_path.display());
                break;
            }
            8 => {
                if Confirm::with_theme(&theme)
                    .with_prompt("Really exit without saving?")
                    .default(false)
                    .interact()?
                {
                    println!("\nExiting without saving.\n");
                    break;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn configure_general(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n📋 General\n");

    let log_levels = ["error", "warn", "info", "debug", "trace"];
    let current_idx = log_levels
        .iter()
        .position(|&l| l == config.general.log_level)
        .unwrap_or(2);

    let log_level_idx = Select::with_theme(theme)
        .with_prompt("Log level")
        .items(&log_levels)
        .default(current_idx)
        .interact()?;

    config.general.log_level = log_levels[log_level_idx].to_string();

    let log_formats = ["text", "json"];
    let current_format_idx = log_formats
        .iter()
        .position(|&f| f == config.general.log_format)
        .unwrap_or(0);

    let log_format_idx = Select::with_theme(theme)
        .with_prompt("Log format")
        .items(&log_formats)
        .default(current_format_idx)
        .interact()?;

    config.general.log_format = log_formats[log_format_idx].to_string();

    config.general.request_timeout_secs = Input::with_theme(theme)
        .with_prompt("Request deadline (seconds)")
        .default(config.general.request_timeout_secs)
        .interact_text()?;

    println!("\n✓ General settings updated.\n");
    Ok(())
}

fn configure_learning(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n🧠 Learning\n");

    let rate: f64 = Input::with_theme(theme)
        .with_prompt("Predictor learning rate (0-1]")
        .default(config.learning.learning_rate)
        .validate_with(|v: &f64| {
            if *v > 0.0 && *v <= 1.0 {
                Ok(())
            } else {
                Err("must be in (0, 1]")
            }
        })
        .interact_text()?;
    config.learning.learning_rate = rate;

    config.learning.correlation_step = Input::with_theme(theme)
        .with_prompt("Correlation step per project")
        .default(config.learning.correlation_step)
        .interact_text()?;

    config.learning.max_samples_buffered = Input::with_theme(theme)
        .with_prompt("Samples buffered for re-analysis")
        .default(config.learning.max_samples_buffered)
        .interact_text()?;

    config.learning.enrich_patterns = Confirm::with_theme(theme)
        .with_prompt("Rewrite pattern descriptions with the inference service?")
        .default(config.learning.enrich_patterns)
        .interact()?;

    println!("\n✓ Learning settings updated.\n");
    Ok(())
}

fn configure_recommendations(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n🎯 Recommendations\n");

    let max_results: usize = Input::with_theme(theme)
        .with_prompt("Maximum recommendations per query")
        .default(config.recommendations.max_results)
        .interact_text()?;
    config.recommendations.max_results = max_results.max(1);

    let rate: f64 = Input::with_theme(theme)
        .with_prompt("Minimum pattern success rate (0-1)")
        .default(config.recommendations.pattern_min_success_rate)
        .interact_text()?;
    config.recommendations.pattern_min_success_rate = rate.clamp(0.0, 1.0);

    config.recommendations.pattern_min_frequency = Input::with_theme(theme)
        .with_prompt("Minimum pattern frequency")
        .default(config.recommendations.pattern_min_frequency)
        .interact_text()?;

    let correlation: f64 = Input::with_theme(theme)
        .with_prompt("Minimum technology correlation")
        .default(config.recommendations.technology_min_correlation)
        .interact_text()?;
    config.recommendations.technology_min_correlation = correlation.max(0.0);

    println!("\n✓ Recommendation settings updated.\n");
    Ok(())
}

fn configure_cache(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n💾 Cache\n");

    config.cache.enabled = Confirm::with_theme(theme)
        .with_prompt("Cache enabled?")
        .default(config.cache.enabled)
        .interact()?;

    if !config.cache.enabled {
        println!("Cache disabled.\n");
        return Ok(());
    }

    config.cache.capacity = Input::with_theme(theme)
        .with_prompt("Maximum capacity (contexts)")
        .default(config.cache.capacity)
        .interact_text()?;

    config.cache.ttl_secs = Input::with_theme(theme)
        .with_prompt("Time to live (seconds)")
        .default(config.cache.ttl_secs)
        .interact_text()?;

    println!("\n✓ Cache configured.\n");
    Ok(())
}

fn configure_inference(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n🤖 Inference\n");

    let backends = ["Disabled", "Ollama (HTTP)", "Command"];
    let current_idx = match config.inference.backend {
        InferenceBackend::Disabled => 0,
        InferenceBackend::Ollama => 1,
        InferenceBackend::Command => 2,
    };

    let backend_idx = Select::with_theme(theme)
        .with_prompt("Backend")
        .items(&backends)
        .default(current_idx)
        .interact()?;

    config.inference.backend = match backend_idx {
        1 => InferenceBackend::Ollama,
        2 => InferenceBackend::Command,
        _ => InferenceBackend::Disabled,
    };

    match config.inference.backend {
        InferenceBackend::Disabled => {
            println!("Inference disabled.\n");
            return Ok(());
        }
        InferenceBackend::Ollama => {
            config.inference.base_url = Input::with_theme(theme)
                .with_prompt("Base URL")
                .default(config.inference.base_url.clone())
                .interact_text()?;

            config.inference.model = Input::with_theme(theme)
                .with_prompt("Model")
                .default(config.inference.model.clone())
                .interact_text()?;
        }
        InferenceBackend::Command => {
            config.inference.command = Input::with_theme(theme)
                .with_prompt("Command")
                .default(config.inference.command.clone())
                .interact_text()?;

            let args: String = Input::with_theme(theme)
                .with_prompt("Arguments (space separated)")
                .default(config.inference.args.join(" "))
                .allow_empty(true)
                .interact_text()?;
            config.inference.args = args.split_whitespace().map(String::from).collect();
        }
    }

    config.inference.timeout_secs = Input::with_theme(theme)
        .with_prompt("Timeout (seconds)")
        .default(config.inference.timeout_secs)
        .interact_text()?;

    println!("\n✓ Inference configured.\n");
    Ok(())
}

fn configure_storage(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n🗄️  Storage\n");

    let backends = ["SQLite", "Memory (nothing survives a restart)"];
    let current_idx = match config.storage.backend {
        StorageBackend::Sqlite => 0,
        StorageBackend::Memory => 1,
    };

    let backend_idx = Select::with_theme(theme)
        .with_prompt("Backend")
        .items(&backends)
        .default(current_idx)
        .interact()?;

    config.storage.backend = if backend_idx == 0 {
        StorageBackend::Sqlite
    } else {
        StorageBackend::Memory
    };

    if config.storage.backend == StorageBackend::Sqlite {
        let db_path: String = Input::with_theme(theme)
            .with_prompt("Database path")
            .default(config.storage.db_path.display().to_string())
            .interact_text()?;
        config.storage.db_path = PathBuf::from(db_path);
    }

    config.storage.timeout_secs = Input::with_theme(theme)
        .with_prompt("Storage call timeout (seconds)")
        .default(config.storage.timeout_secs)
        .interact_text()?;

    println!("\n✓ Storage configured.\n");
    Ok(())
}

fn configure_maintenance(theme: &ColorfulTheme, config: &mut Config) -> LoreResult<()> {
    println!("\n🧹 Maintenance\n");

    config.maintenance.enabled = Confirm::with_theme(theme)
        .with_prompt("Background maintenance enabled?")
        .default(config.maintenance.enabled)
        .interact()?;

    if !config.maintenance.enabled {
        println!("Maintenance disabled.\n");
        return Ok(());
    }

    let intervals = [
        ("Re-analysis interval (seconds)", &mut config.maintenance.reanalysis_interval_secs),
        ("Persist interval (seconds)", &mut config.maintenance.persist_interval_secs),
        ("Prune interval (seconds)", &mut config.maintenance.prune_interval_secs),
    ];
    for (prompt, value) in intervals {
        let secs: u64 = Input::with_theme(theme)
            .with_prompt(prompt)
            .default(*value)
            .interact_text()?;
        *value = secs.max(1);
    }

    config.maintenance.prune_max_age_days = Input::with_theme(theme)
        .with_prompt("Prune patterns unseen for (days)")
        .default(config.maintenance.prune_max_age_days)
        .interact_text()?;

    println!("\n✓ Maintenance configured.\n");
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Imprime um resumo da configuração.
pub fn show_config_summary(config: &Config) {
    println!("\n📊 Configuration Summary\n");
    println!("┌─────────────────────────────────────────┐");
    println!("│ General                                 │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Log level: {:<28} │", config.general.log_level);
    println!("│ Log format: {:<27} │", config.general.log_format);
    println!("│ Deadline: {:<28}s │", config.general.request_timeout_secs);
    println!("├─────────────────────────────────────────┤");
    println!("│ Learning                                │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Learning rate: {:<24} │", config.learning.learning_rate);
    println!("│ Correlation step: {:<21} │", config.learning.correlation_step);
    println!(
        "│ Enrich patterns: {:<22} │",
        yes_no(config.learning.enrich_patterns)
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Recommendations                         │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Max results: {:<26} │", config.recommendations.max_results);
    println!(
        "│ Min success rate: {:<21} │",
        config.recommendations.pattern_min_success_rate
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Cache                                   │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Enabled: {:<30} │", yes_no(config.cache.enabled));
    if config.cache.enabled {
        println!("│ Capacity: {:<29} │", config.cache.capacity);
        println!("│ TTL: {:<33}s │", config.cache.ttl_secs);
    }
    println!("├─────────────────────────────────────────┤");
    println!("│ Inference / Storage                     │");
    println!("├─────────────────────────────────────────┤");
    println!(
        "│ Inference: {:<28} │",
        format!("{:?}", config.inference.backend)
    );
    println!(
        "│ Storage: {:<30} │",
        format!("{:?}", config.storage.backend)
    );
    if config.storage.backend == StorageBackend::Sqlite {
        println!("│ Database: {:<29} │", config.storage.db_path.display().to_string());
    }
    println!("├─────────────────────────────────────────┤");
    println!("│ Maintenance                             │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Enabled: {:<30} │", yes_no(config.maintenance.enabled));
    if config.maintenance.enabled {
        println!(
            "│ Persist every: {:<23}s │",
            config.maintenance.persist_interval_secs
        );
        println!(
            "│ Prune every: {:<25}s │",
            config.maintenance.prune_interval_secs
        );
    }
    println!("└─────────────────────────────────────────┘");
    println!();
}
