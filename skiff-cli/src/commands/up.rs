//! `skiff up`: deploy a stack from a manifest.

use colored::Colorize;
use skiff_core::lifecycle::{shutdown_signal, UpOptions};
use skiff_core::types::ServiceSource;
use skiff_core::{ManifestLoader, Result};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub async fn run(
    manifest_file: &str,
    env_file: Option<&str>,
    stack_name: Option<String>,
    build: bool,
    detach: bool,
) -> Result<()> {
    let spec =
        ManifestLoader::load(manifest_file, env_file.map(Path::new), stack_name)?;

    println!(
        "{} Deploying stack {} ({} service(s))",
        "→".cyan().bold(),
        spec.name.bold(),
        spec.services.len()
    );
    for service in &spec.services {
        let source = match &service.source {
            ServiceSource::Image(image) => image.clone(),
            ServiceSource::Build(b) => format!("(build {})", b.context.display()),
        };
        println!("  {} {} {}", "•".dimmed(), service.name.bold(), source.dimmed());
    }
    println!();

    let (controller, _state) = super::controller().await?;

    // Stream lifecycle events while the deployment runs.
    let mut events = controller.events().subscribe(vec!["service.*".to_string()]);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let marker = match event.event_type.as_str() {
                "service.started" => "✓".green().bold(),
                "service.failed" => "✗".red().bold(),
                _ => "·".dimmed(),
            };
            println!("  {} {}", marker, event.message);
        }
    });

    let record = controller.up(&spec, &UpOptions { build }).await;
    printer.abort();

    let record = record?;

    println!();
    println!("{} Stack deployed: {}", "✓".green().bold(), record.name.bold());

    #[derive(Tabled)]
    struct ServiceRow {
        #[tabled(rename = "SERVICE")]
        name: String,
        #[tabled(rename = "CONTAINER")]
        container: String,
        #[tabled(rename = "STATUS")]
        status: String,
    }

    let rows: Vec<ServiceRow> = record
        .services
        .iter()
        .map(|s| ServiceRow {
            name: s.name.clone(),
            container: s
                .container_id
                .as_deref()
                .map(|id| id[..12.min(id.len())].to_string())
                .unwrap_or_default(),
            status: super::colorize_status(&s.status),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    if detach {
        println!("{}", "Stack running in background".dimmed());
        return Ok(());
    }

    // Attached mode: stay up until interrupted, then tear down. Teardown
    // listens for a second interrupt of its own.
    println!("{}", "Attached; press Ctrl+C to stop the stack".dimmed());
    let mut signal = shutdown_signal();
    let _ = signal.recv().await;

    println!("{} Stopping stack {}...", "⚠".yellow().bold(), record.name.bold());
    controller.down_with_signal(&record.name, false, shutdown_signal()).await?;
    println!("{} Stack stopped", "✓".green().bold());

    Ok(())
}
