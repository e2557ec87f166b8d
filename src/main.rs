/*
 * Copyright (c) 2026.  tarnlog contributors.
 * Please refer to the project repository for more information about this project and its license.
 */

//! Smoke-test binary: opens a data directory, formats a page, inserts a
//! record, and prints buffer pool stats. Not a CLI surface — it takes no
//! arguments and exists only to exercise the four layers end to end.

use std::env;
use std::sync::Arc;

use tarnlog::config::EngineConfig;
use tarnlog::file_manager::FileManager;
use tarnlog::slotted_page::{FieldSpec, FieldType, SlottedPage};
use tarnlog::transaction::{EngineTransaction, Transaction};
use tarnlog::wal::Wal;
use tarnlog::BufferPool;

const RELATION_FILE: &str = "demo.tbl";

fn main() -> tarnlog::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let data_dir = env::temp_dir().join("tarnlog-demo");
    let config = EngineConfig::new(&data_dir);
    let is_new = config.ensure_data_dir()?;
    println!("data dir: {} (new: {is_new})", data_dir.display());

    let file_manager = Arc::new(FileManager::new(&config.data_dir)?);
    let wal = Arc::new(Wal::open(file_manager.clone(), &config.wal_file_name)?);
    let buffer_pool = Arc::new(BufferPool::new(
        file_manager.clone(),
        wal.clone(),
        config.buffer_pool_size,
        config.max_pin_count,
        config.pin_timeout,
    ));

    let tx = EngineTransaction::new(1, buffer_pool.clone(), wal.clone(), file_manager.clone());
    let block = tx.append(RELATION_FILE)?;
    tx.pin(&block)?;

    let page = SlottedPage::new(&tx, block.clone());
    page.format(0, true)?;

    let layout = [FieldSpec {
        name: "greeting",
        ty: FieldType::Varlen,
    }];
    let value = b"hello from tarnlog";
    let slot = page.insert_after(None, tarnlog::page::Page::varlen_size(value.len()), false, true)?;
    page.set_var_len(slot, "greeting", value, &layout, true)?;

    let read_back = page.var_len(slot, "greeting", &layout)?;
    println!("record at slot {slot}: {}", String::from_utf8_lossy(&read_back));

    tx.commit()?;
    println!(
        "buffer pool: {}/{} frames free",
        buffer_pool.available(),
        buffer_pool.capacity()
    );

    Ok(())
}
