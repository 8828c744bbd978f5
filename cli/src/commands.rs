use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::mpsc;
use wakmeter_core::roster::CharacterRecord;
use wakmeter_core::{GameSignal, LogFileRole, ResetScope, Tracker};
use wakmeter_types::formatting::{format_compact, format_duration, format_grouped};

fn kamas(n: u64) -> String {
    format!("{} ₭", format_grouped(n, ' '))
}

fn describe(record: &CharacterRecord) -> String {
    let mut flags = Vec::new();
    if record.is_main_character {
        flags.push("main");
    }
    if record.is_in_group {
        flags.push("group");
    }
    if record.is_active {
        flags.push("fighting");
    }
    if record.is_manual {
        flags.push("manual");
    }
    let seen = record
        .last_seen_in_combat_at
        .map(|t| {
            let secs = (Utc::now() - t).num_seconds().max(0) as u64;
            format!(" (last fight {} ago)", format_duration(secs))
        })
        .unwrap_or_default();
    if flags.is_empty() {
        format!("{}{}", record.name, seen)
    } else {
        format!("{} [{}]{}", record.name, flags.join(", "), seen)
    }
}

pub async fn print_startup(tracker: &Tracker) {
    let stats = tracker.stats().await;
    println!("Start-up: {:?}", stats.startup_mode);
    for file in &stats.files {
        println!("  watching {:?} {}", file.role, file.path.display());
    }
}

/// Print signals as they arrive until the tracker drops the channel.
pub async fn print_signals(mut rx: mpsc::UnboundedReceiver<GameSignal>) {
    while let Some(signal) = rx.recv().await {
        match signal {
            GameSignal::CharacterListChanged { characters } => {
                let names: Vec<_> = characters.iter().map(|c| c.name.as_str()).collect();
                println!("[roster] {}", names.join(", "));
            }
            GameSignal::MainCharacterChanged { name } => {
                println!("[roster] main character: {}", name.as_deref().unwrap_or("-"));
            }
            GameSignal::ServerChanged { server, transition } => {
                println!("[server] {:?} {}", transition, server.as_deref().unwrap_or("-"));
            }
            GameSignal::LootChanged { change, record } => {
                println!(
                    "[loot] {:?} {} x{} ({})",
                    change, record.item_name, record.quantity, record.character_name
                );
            }
            GameSignal::SaleDetected {
                item_count,
                total_currency,
                totals,
            } => {
                println!(
                    "[sale] {} items for {} (session {})",
                    item_count,
                    kamas(total_currency),
                    kamas(totals.cumulative_amount)
                );
            }
            GameSignal::XpGained {
                entity,
                amount,
                totals,
            } => {
                println!(
                    "[xp] {} +{} (session {})",
                    entity,
                    format_compact(amount),
                    format_compact(totals.counter.cumulative_amount)
                );
            }
            GameSignal::LogReset { path } => {
                println!("[log] {} was reset", path.display());
            }
        }
    }
}

pub async fn watch(tracker: &Tracker, path: PathBuf, role: LogFileRole) {
    let display = path.display().to_string();
    if tracker.watch(path, role).await {
        println!("Watching {display} as {role:?}");
    } else {
        println!("Already watching {display}");
    }
}

pub async fn unwatch(tracker: &Tracker, path: &Path) {
    match tracker.unwatch(path).await {
        Ok(()) => println!("Stopped watching {}", path.display()),
        Err(e) => println!("error: {e}"),
    }
}

pub async fn reread(tracker: &Tracker, path: &Path) {
    match tracker.force_read(path).await {
        Ok(count) => println!("Read {count} new lines"),
        Err(e) => println!("error: {e}"),
    }
}

pub fn show_roster(tracker: &Tracker, all: bool) {
    let characters = if all {
        tracker.characters()
    } else {
        tracker.visible_characters()
    };
    if characters.is_empty() {
        println!("No characters tracked");
        return;
    }
    for (i, record) in characters.iter().enumerate() {
        println!("{:>2}. {}", i + 1, describe(record));
    }
}

pub fn set_main(tracker: &Tracker, name: &str) {
    match tracker.set_main_character(name) {
        Ok(()) => println!("Main character: {name}"),
        Err(e) => println!("error: {e}"),
    }
}

pub fn add_character(tracker: &Tracker, name: &str) {
    match tracker.add_manual_character(name) {
        Ok(()) => println!("Added {name}"),
        Err(e) => println!("error: {e}"),
    }
}

pub fn remove_character(tracker: &Tracker, name: &str) {
    match tracker.remove_character(name) {
        Ok(()) => println!("Removed {name}"),
        Err(e) => println!("error: {e}"),
    }
}

pub fn set_visibility(tracker: &Tracker, name: &str, visible: bool) {
    match tracker.set_character_visibility(name, visible) {
        Ok(()) if visible => println!("{name} is shown"),
        Ok(()) => println!("{name} is hidden"),
        Err(e) => println!("error: {e}"),
    }
}

pub fn my_character(tracker: &Tracker, name: &str, remove: bool) {
    if remove {
        if !tracker.remove_my_character(name) {
            println!("{name} was not one of your characters");
        }
    } else {
        match tracker.add_my_character(name) {
            Ok(true) => println!("{name} added to your characters"),
            Ok(false) => println!("{name} is already one of your characters"),
            Err(e) => println!("error: {e}"),
        }
    }
    let mine = tracker.roster_config().my_characters;
    println!("Your characters: {}", mine.join(", "));
}

pub fn show_loot(tracker: &Tracker) {
    let records = tracker.loot();
    if records.is_empty() {
        println!("No loot this session");
        return;
    }
    for record in records {
        let star = if record.is_favorite { "*" } else { " " };
        println!(
            "{star} {:<20} {:<30} x{}",
            record.character_name,
            record.item_name,
            format_grouped(record.quantity, ' ')
        );
    }
}

pub fn toggle_favorite(tracker: &Tracker, character: &str, item: &str) {
    match tracker.toggle_favorite(character, item) {
        Ok(record) if record.is_favorite => println!("{} is now a favorite", record.item_name),
        Ok(record) => println!("{} is no longer a favorite", record.item_name),
        Err(e) => println!("error: {e}"),
    }
}

pub fn delete_loot(tracker: &Tracker, character: &str, item: &str, quantity: Option<u64>) {
    match quantity {
        Some(quantity) => match tracker.remove_loot_quantity(character, item, quantity) {
            Some(record) => println!("{} x{} left", record.item_name, record.quantity),
            None => println!("error: no loot recorded for {character} / {item}"),
        },
        None => match tracker.delete_loot(character, item) {
            Ok(record) => println!("Deleted {}", record.item_name),
            Err(e) => println!("error: {e}"),
        },
    }
}

pub fn show_sales(tracker: &Tracker) {
    let (totals, items_sold) = tracker.sales();
    println!(
        "{} sales, {} items, {}",
        totals.event_count,
        items_sold,
        kamas(totals.cumulative_amount)
    );
}

pub fn show_xp(tracker: &Tracker) {
    let totals = tracker.xp();
    if totals.is_empty() {
        println!("No experience gained this session");
        return;
    }
    for entry in totals {
        let kind = if entry.is_combat { "combat" } else { "profession" };
        let next = entry
            .remaining_to_next_level
            .map(|r| format!(", {} to next level", format_compact(r)))
            .unwrap_or_default();
        println!(
            "{:<20} {:<10} {}{}",
            entry.entity,
            kind,
            format_grouped(entry.counter.cumulative_amount, ' '),
            next
        );
    }
}

pub async fn reset(tracker: &Tracker, scope: ResetScope) {
    tracker.reset(scope).await;
    println!("Reset {scope:?}");
}

pub async fn show_stats(tracker: &Tracker) {
    let stats = tracker.stats().await;
    println!("Server:         {}", stats.server.as_deref().unwrap_or("-"));
    println!(
        "Main character: {}",
        stats.main_character.as_deref().unwrap_or("-")
    );
    println!("Roster:         {}", stats.roster_size);
    println!("Loot entries:   {}", stats.ledger_entries);
    println!(
        "Sales:          {} ({} items)",
        kamas(stats.sales.cumulative_amount),
        stats.items_sold
    );
    println!("Experience:     {}", format_compact(stats.xp_total));
    for file in stats.files {
        println!(
            "{:?}: {} at {}/{} bytes",
            file.role,
            file.path.display(),
            file.byte_offset,
            file.last_known_length
        );
    }
}

pub fn show_config(tracker: &Tracker) {
    let config = tracker.config();
    println!("Log directory:  {}", config.log_directory().display());
    println!("Data directory: {}", config.data_directory().display());
    println!("{:#?}", config.tracker);
}

pub fn set_directory(tracker: &Tracker, path: String) {
    let mut config = tracker.config().clone();
    config.tracker.log_directory = path;
    match config.save() {
        Ok(()) => println!(
            "Log directory set to {} (applies on next start)",
            config.log_directory().display()
        ),
        Err(e) => println!("error: {e}"),
    }
}

pub fn exit() {
    println!("Exiting...");
}
