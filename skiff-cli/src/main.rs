use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "SKIFF declarative deployment orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a stack from a manifest
    Up {
        /// Path to the manifest file
        #[arg(short, long, default_value = "skiff.yml")]
        file: String,

        /// Path to the environment file for ${VAR} substitution
        #[arg(short, long)]
        env_file: Option<String>,

        /// Stack name (defaults to the manifest's directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Force image rebuilds, bypassing the engine's layer cache
        #[arg(long)]
        build: bool,

        /// Exit after deployment instead of staying attached
        #[arg(short, long)]
        detach: bool,
    },

    /// Tear down a stack
    Down {
        /// Stack name
        stack: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Also remove the stack's volumes and networks
        #[arg(long)]
        purge: bool,
    },

    /// List deployed stacks or show one stack's services
    Ps {
        /// Stack name (optional)
        stack: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    skiff_core::observability::init("info");

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Up { file, env_file, name, build, detach } => {
            commands::up::run(&file, env_file.as_deref(), name, build, detach).await
        }
        Commands::Down { stack, force, purge } => {
            commands::down::run(&stack, force, purge).await
        }
        Commands::Ps { stack } => commands::ps::run(stack.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
