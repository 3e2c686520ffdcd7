//! `skiff down`: tear down a stack.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use skiff_core::lifecycle::shutdown_signal;
use skiff_core::Result;
use std::io::{self, Write};
use std::time::Duration;

pub async fn run(stack: &str, force: bool, purge: bool) -> Result<()> {
    if !force {
        print!(
            "{} Tear down stack '{}'{}? [y/N]: ",
            "⚠".yellow().bold(),
            stack.bold(),
            if purge { " and remove its volumes and networks" } else { "" }
        );
        io::stdout().flush().map_err(skiff_core::SkiffError::internal)?;

        let mut input = String::new();
        io::stdin().read_line(&mut input).map_err(skiff_core::SkiffError::internal)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let (controller, _state) = super::controller().await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} {msg}")
            .expect("static template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(format!("Tearing down stack '{}'...", stack));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = controller.down_with_signal(stack, purge, shutdown_signal()).await;

    spinner.finish_and_clear();
    result?;

    println!("{} Stack down: {}", "✓".green().bold(), stack.bold());
    Ok(())
}
