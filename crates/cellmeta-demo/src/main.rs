//! Demo binary that replays a short scripted session against an in-memory
//! host and logs what happens to the stored cell data.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p cellmeta-demo -- --scheduler region --log-level debug`.

use std::sync::Arc;

use cellmeta_config::{CliArgs, Config, default_config_dir};
use cellmeta_core::{
    CellDataService, CellId, CellType, DataListener, Direction, HeightRange, MemoryHost,
    MoveNotice, MoveReaction, Namespace, NamespacedKey, RemoveNotice, Tenant, WorldEvent,
    WorldId,
};
use clap::Parser;
use tracing::{info, warn};

const DEMO_TENANT: &str = "demo";

/// Logs every notice and refuses to let the "vault" cell lose its data.
struct AuditListener {
    vault: CellId,
}

impl DataListener for AuditListener {
    fn on_remove(&self, notice: &mut RemoveNotice<'_>) {
        if notice.cell == self.vault {
            info!(cell = ?notice.cell, "audit: vetoing removal of vault data");
            notice.set_cancelled(true);
        } else {
            info!(tenant = %notice.tenant, cell = ?notice.cell, "audit: data removed");
        }
    }

    fn on_move(&self, notice: &mut MoveNotice<'_>) {
        info!(from = ?notice.from, to = ?notice.to, "audit: data moving");
    }
}

fn describe(tenant: &Tenant, cell: CellId, label: &NamespacedKey) -> String {
    let store = tenant.store(cell);
    match store.get::<String>(label) {
        Some(text) if store.is_protected() => format!("{text:?} (protected)"),
        Some(text) => format!("{text:?}"),
        None if store.is_empty() => "<empty>".to_string(),
        None => format!("{} entries", store.keys().count()),
    }
}

fn demonstrate_write_and_place(
    host: &MemoryHost,
    tenant: &Tenant,
    cell: CellId,
    label: &NamespacedKey,
) {
    let mut store = tenant.store(cell);
    store.set(label.clone(), "freshly placed".to_string());
    info!(?cell, dirty = tenant.is_dirty(&cell), "wrote data");

    host.dispatch(&WorldEvent::Place { cell });
    info!(data = %describe(tenant, cell, label), "after same-tick placement");

    host.advance_tick();
    info!(dirty = tenant.is_dirty(&cell), "tick passed");
}

fn demonstrate_break(host: &MemoryHost, tenant: &Tenant, cell: CellId, label: &NamespacedKey) {
    host.dispatch(&WorldEvent::Break { cell });
    info!(data = %describe(tenant, cell, label), "after break");
}

fn demonstrate_protection(
    host: &MemoryHost,
    tenant: &Tenant,
    cell: CellId,
    label: &NamespacedKey,
) {
    let mut store = tenant.store(cell);
    store.set(label.clone(), "crown jewels".to_string());
    store.set_protected(true);
    host.advance_tick();

    host.dispatch(&WorldEvent::BlockExplode { cells: vec![cell] });
    info!(data = %describe(tenant, cell, label), "after explosion");
}

fn demonstrate_piston_push(
    host: &MemoryHost,
    tenant: &Tenant,
    start: CellId,
    label: &NamespacedKey,
) {
    let chain: Vec<CellId> =
        std::iter::successors(Some(start), |c| Some(c.relative(Direction::East)))
            .take(3)
            .collect();
    for (i, cell) in chain.iter().enumerate() {
        tenant.store(*cell).set(label.clone(), format!("crate #{}", i + 1));
    }

    let torch = CellType::new("torch");
    let beside = start.relative(Direction::South);
    host.set_move_reaction(torch.clone(), MoveReaction::Break);
    host.set_cell_type(beside, torch);
    tenant.store(beside).set(label.clone(), "torch".to_string());
    host.advance_tick();

    host.dispatch(&WorldEvent::PistonExtend {
        direction: Direction::East,
        cells: chain.clone(),
    });
    host.dispatch(&WorldEvent::PistonExtend {
        direction: Direction::East,
        cells: vec![beside],
    });
    host.advance_tick();

    let mut cells = chain;
    if let Some(&last) = cells.last() {
        cells.push(last.relative(Direction::East));
    }
    for cell in cells {
        info!(?cell, data = %describe(tenant, cell, label), "after piston push");
    }
    info!(data = %describe(tenant, beside, label), "torch cell after push");
}

fn summarize(tenant: &Tenant, world: WorldId, origin: CellId) {
    let mut cells: Vec<_> = tenant.cells_with_data(&origin.region()).into_iter().collect();
    cells.sort_by_key(|c| c.pos);
    info!(%world, region = ?origin.region().pos, count = cells.len(), "cells with data");
    for cell in cells {
        info!(pos = ?cell.pos, "  holds data");
    }
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| std::env::temp_dir().join("cellmeta"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    cellmeta_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let host = Arc::new(MemoryHost::new());
    let world = host.create_world(HeightRange::default());
    let namespace = match Namespace::new(DEMO_TENANT) {
        Ok(ns) => ns,
        Err(e) => {
            eprintln!("Invalid demo namespace: {e}");
            return;
        }
    };
    host.activate_tenant(&namespace);

    let service = match CellDataService::start(host.clone(), &config) {
        Ok(service) => service,
        Err(e) => {
            warn!("Ignoring configured namespaces: {e}");
            CellDataService::new(host.clone(), &config.scheduler)
        }
    };
    service.register_reconciler(&namespace);

    let origin = CellId::new(world, 0, 64, 0);
    let vault = CellId::new(world, 8, 64, 8);
    service.subscribe_listener(Arc::new(AuditListener { vault }));

    let tenant = service.tenant(namespace.clone());
    let label = match namespace.key("label") {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Invalid label key: {e}");
            return;
        }
    };

    info!(mode = ?config.scheduler.mode, "Starting cellmeta demo");
    demonstrate_write_and_place(&host, &tenant, origin, &label);
    demonstrate_break(&host, &tenant, origin, &label);
    demonstrate_protection(&host, &tenant, vault, &label);
    demonstrate_piston_push(&host, &tenant, CellId::new(world, 2, 64, 2), &label);
    summarize(&tenant, world, origin);

    service.shutdown();
    info!("cellmeta demo completed");
}
