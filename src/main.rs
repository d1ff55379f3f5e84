mod app;
mod catalog;
mod config;
mod core;
mod index;
mod ui;

use anyhow::{Context, Result};

fn main() -> Result<()> {
    let mut check_only = false;
    let mut reindex = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" | "-c" => check_only = true,
            "--reindex" | "-r" => reindex = true,
            "--help" | "-h" => {
                println!("Modhearth");
                println!("  --check     List untracked mod folders and exit");
                println!("  --reindex   Rebuild the mod index without the TUI");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {arg}");
            }
        }
    }

    if check_only || reindex {
        return run_headless(check_only);
    }

    let mut app = app::App::initialize()?;
    ui::run(&mut app)
}

fn run_headless(check_only: bool) -> Result<()> {
    let config = config::AppConfig::load_or_create()?;
    let data_dir = config::base_data_dir()?;
    let mods_dir = config.mods_dir()?;
    std::fs::create_dir_all(&mods_dir).context("create mods dir")?;

    let mut index = index::ModIndex::load_or_create(&data_dir)?;
    let untracked = index.untracked_in(&mods_dir)?;

    if check_only {
        if untracked.is_empty() {
            println!("No untracked mods");
        } else {
            for folder in &untracked {
                println!("{folder}");
            }
        }
        return Ok(());
    }

    // With untracked mods present the headless path only reports; the TUI
    // owns the confirmation flow.
    if untracked.is_empty() {
        let report = index.rebuild_from(&mods_dir)?;
        index.save(&data_dir)?;
        println!(
            "Mods re-indexed successfully ({} added, {} updated, {} removed)",
            report.added, report.updated, report.removed
        );
    } else {
        println!("Untracked mods present; re-index from the TUI to pick them up:");
        for folder in &untracked {
            println!("  {folder}");
        }
    }

    Ok(())
}
