//! `skiff ps`: list deployed stacks and their services.

use colored::Colorize;
use skiff_core::Result;
use tabled::{settings::Style, Table, Tabled};

pub async fn run(stack: Option<&str>) -> Result<()> {
    let (_controller, state) = super::controller().await?;

    if let Some(name) = stack {
        let record = state.get_stack(name).await?;

        println!("{} {}", "Stack:".bold(), record.name);
        println!();

        #[derive(Tabled)]
        struct ServiceRow {
            #[tabled(rename = "SERVICE")]
            name: String,
            #[tabled(rename = "CONTAINER")]
            container: String,
            #[tabled(rename = "STATUS")]
            status: String,
            #[tabled(rename = "ORDER")]
            order: i64,
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
                    .unwrap_or_else(|| "-".to_string()),
                status: super::colorize_status(&s.status),
                order: s.start_order,
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
        return Ok(());
    }

    let stacks = state.list_stacks().await?;
    if stacks.is_empty() {
        println!("No stacks deployed");
        return Ok(());
    }

    #[derive(Tabled)]
    struct StackRow {
        #[tabled(rename = "STACK")]
        name: String,
        #[tabled(rename = "SERVICES")]
        services: usize,
        #[tabled(rename = "RUNNING")]
        running: usize,
    }

    let rows: Vec<StackRow> = stacks
        .iter()
        .map(|s| StackRow {
            name: s.name.clone(),
            services: s.services.len(),
            running: s.services.iter().filter(|svc| svc.status == "running").count(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}
