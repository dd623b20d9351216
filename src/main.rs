use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use retiscan_app_lib::analysis::AnalysisResult;
use retiscan_app_lib::commands::{analysis, classifier, history, theme};
use retiscan_app_lib::settings::get_settings;
use retiscan_app_lib::store::{default_store_path, JsonFileStore};
use retiscan_app_lib::{logging, AppState};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "retiscan",
    version,
    about = "Grade retinal images for diabetic retinopathy with a generative model"
)]
struct Cli {
    /// Store file holding settings, theme and history
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a JPEG or PNG image (max 4 MB)
    Analyze {
        image: PathBuf,
        /// Also write a report into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Inspect the last ten results
    #[command(subcommand)]
    History(HistoryCommand),
    #[command(subcommand)]
    Theme(ThemeCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    /// List the models the classifier can use
    Models,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    List,
    Show { id: String },
    Delete { id: String },
    Export {
        id: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ThemeCommand {
    Show,
    Dark,
    Light,
    Toggle,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    SetApiKey { key: String },
    SetModel { model: String },
    SetTimeout { secs: u64 },
    /// Send a tiny request to check the API key
    Test,
}

fn print_result(result: &AnalysisResult) {
    println!("id:          {}", result.id());
    println!("date:        {}", result.timestamp().to_rfc3339());
    println!("level:       {}", result.level().code());
    println!("description: {}", result.description());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let store_path = cli.store.unwrap_or_else(default_store_path);
    let store = Arc::new(JsonFileStore::open(store_path));
    logging::init(get_settings(store.as_ref()).log_level);

    let state = AppState::new(store);

    match cli.command {
        Commands::Analyze { image, export } => {
            let result = analysis::analyze_image(&state, image)
                .await
                .map_err(|e| anyhow!(e))?;
            print_result(&result);
            if let Some(dir) = export {
                let path = analysis::export_analysis(&state, result.id(), &dir)
                    .map_err(|e| anyhow!(e))?;
                println!("report:      {}", path.display());
            }
        }
        Commands::History(cmd) => match cmd {
            HistoryCommand::List => {
                let entries = history::get_history(&state);
                if entries.is_empty() {
                    println!("No analyses yet.");
                }
                for entry in entries {
                    println!(
                        "{}  {}  level {}  {}",
                        entry.id(),
                        entry.timestamp().format("%Y-%m-%d %H:%M"),
                        entry.level().code(),
                        entry.description()
                    );
                }
            }
            HistoryCommand::Show { id } => {
                let result = history::select_history_entry(&state, &id).map_err(|e| anyhow!(e))?;
                print_result(&result);
            }
            HistoryCommand::Delete { id } => {
                history::delete_history_entry(&state, &id).map_err(|e| anyhow!(e))?;
                println!("Deleted {}", id);
            }
            HistoryCommand::Export { id, dir } => {
                let path =
                    analysis::export_analysis(&state, &id, &dir).map_err(|e| anyhow!(e))?;
                println!("{}", path.display());
            }
        },
        Commands::Theme(cmd) => {
            let dark = match cmd {
                ThemeCommand::Show => theme::get_dark_mode(&state),
                ThemeCommand::Dark => {
                    theme::set_dark_mode(&state, true).map_err(|e| anyhow!(e))?;
                    true
                }
                ThemeCommand::Light => {
                    theme::set_dark_mode(&state, false).map_err(|e| anyhow!(e))?;
                    false
                }
                ThemeCommand::Toggle => theme::toggle_dark_mode(&state).map_err(|e| anyhow!(e))?,
            };
            println!("{}", if dark { "dark" } else { "light" });
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommand::Show => {
                let config = classifier::get_classifier_config(&state);
                println!("model:   {}", config.model);
                println!("timeout: {}s", config.request_timeout_secs);
                println!("api key: {}", if config.api_key_set { "set" } else { "missing" });
            }
            ConfigCommand::SetApiKey { key } => {
                classifier::set_classifier_api_key(&state, key).map_err(|e| anyhow!(e))?;
            }
            ConfigCommand::SetModel { model } => {
                classifier::set_classifier_model(&state, model).map_err(|e| anyhow!(e))?;
            }
            ConfigCommand::SetTimeout { secs } => {
                classifier::set_request_timeout(&state, secs).map_err(|e| anyhow!(e))?;
            }
            ConfigCommand::Test => {
                classifier::test_classifier_connection(&state)
                    .await
                    .map_err(|e| anyhow!(e))?;
                println!("Connection OK");
            }
        },
        Commands::Models => {
            for model in classifier::get_classifier_models() {
                println!("{:<24} {:<20} {}", model.id, model.name, model.description);
            }
        }
    }

    Ok(())
}
