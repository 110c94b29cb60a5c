//! Interface de linha de comando do Lore.

pub mod commands;
pub mod interactive;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::maintenance::MaintenanceJob;

/// Lore - motor adaptativo de conhecimento e recomendações.
#[derive(Parser, Debug)]
#[command(name = "lore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arquivo de configuração.
    #[arg(short, long, default_value = "lore.toml")]
    pub config: PathBuf,

    /// Modo verbose.
    #[arg(short, long)]
    pub verbose: bool,

    /// Modo silencioso.
    #[arg(short, long)]
    pub quiet: bool,

    /// Comando a executar.
    #[command(subcommand)]
    pub command: Commands,
}

/// Comandos disponíveis.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inicializa configuração no diretório atual.
    Init {
        /// Diretório de destino (padrão: diretório atual).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Inicia o servidor MCP via stdio.
    Serve,

    /// Mostra o que a base de conhecimento aprendeu até agora.
    Status,

    /// Configura opções interativamente.
    Config,

    /// Diagnostica problemas de configuração.
    Doctor,

    /// Mostra versão.
    Version,

    /// Aprende patterns de arquivos-fonte.
    Analyze {
        /// Arquivos a analisar.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tecnologias do projeto ao qual os arquivos pertencem.
        #[arg(short, long, value_delimiter = ',')]
        technologies: Vec<String>,

        /// Tipo de projeto (web_application, api_service, ...).
        #[arg(short = 'p', long)]
        project_type: Option<String>,

        /// Sucesso geral do código, em [0, 1].
        #[arg(short, long)]
        score: Option<f64>,

        /// Analisa com foco em segurança.
        #[arg(long)]
        security: bool,
    },

    /// Registra um projeto concluído a partir de um arquivo JSON.
    Learn {
        /// JSON com o outcome do projeto.
        file: PathBuf,
    },

    /// Mostra recomendações ranqueadas para um projeto.
    Recommend {
        /// Tecnologias em uso.
        #[arg(short, long, value_delimiter = ',')]
        technologies: Vec<String>,

        /// Tipo de projeto.
        #[arg(short = 'p', long)]
        project_type: Option<String>,

        /// Imprime JSON bruto.
        #[arg(long)]
        json: bool,
    },

    /// Prevê como um projeto planejado vai se sair.
    Predict {
        /// Tecnologias planejadas.
        #[arg(short, long, value_delimiter = ',')]
        technologies: Vec<String>,

        /// Tipo de projeto.
        #[arg(short = 'p', long)]
        project_type: Option<String>,

        /// Imprime JSON bruto.
        #[arg(long)]
        json: bool,
    },

    /// Avalia uma recomendação.
    Feedback {
        /// Id da recomendação.
        recommendation_id: String,

        /// Nota de 1 a 5.
        #[arg(short, long)]
        rating: u8,

        /// Comentário livre.
        #[arg(short = 'm', long)]
        text: Option<String>,

        /// A recomendação foi implementada.
        #[arg(long)]
        implemented: bool,
    },

    /// Executa jobs de manutenção agora.
    Maintain {
        /// Job a executar (padrão: todos).
        #[arg(short, long, value_enum)]
        job: Option<MaintenanceJob>,
    },

    /// Exporta a base de conhecimento para JSON.
    Export {
        /// Arquivo de saída.
        #[arg(short, long, default_value = "lore-knowledge.json")]
        output: PathBuf,
    },

    /// Importa um export da base de conhecimento.
    Import {
        /// Arquivo de entrada.
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "lore", "analyze", "a.rs", "b.py", "-t", "rust,python", "-p", "api_service",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                files,
                technologies,
                project_type,
                security,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(technologies, vec!["rust", "python"]);
                assert_eq!(project_type.as_deref(), Some("api_service"));
                assert!(!security);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_maintain_job() {
        let cli = Cli::try_parse_from(["lore", "maintain", "--job", "prune"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Maintain {
                job: Some(MaintenanceJob::Prune)
            }
        ));
    }

    #[test]
    fn test_analyze_requires_files() {
        assert!(Cli::try_parse_from(["lore", "analyze"]).is_err());
    }
}
