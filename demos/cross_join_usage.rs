use anyhow::Result;
use arrow_array::{Float64Array, Int32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use gpu_join_engine::arrow::{join_schema, record_batch_to_table, table_to_record_batch};
use gpu_join_engine::join::api;
use gpu_join_engine::prelude::*;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Device cross join - Rust examples");

    // Example 1: Explicit stream and memory resource
    explicit_resources_example()?;

    // Example 2: Defaults through the options layer
    default_options_example()?;

    // Example 3: Arrow in, Arrow out
    arrow_example()?;

    // Example 4: Configured executor with a slab pool
    executor_example().await?;

    Ok(())
}

fn explicit_resources_example() -> Result<()> {
    info!("=== Example 1: Explicit resources ===");

    let stream = Stream::new()?;
    let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());

    let sizes = Table::new(vec![Column::from_slice(&[1i32, 2], &stream, &mr)?])?;
    let colors = Table::new(vec![Column::from_options(&[Some(10i64), None, Some(30)], &stream, &mr)?])?;

    // Returns as soon as the work is enqueued
    let pairs = cross_join(&sizes, &colors, &stream, &mr)?;
    stream.synchronize()?;

    for row in pairs.to_host()?.rows() {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        info!("  ({})", cells.join(", "));
    }

    Ok(())
}

fn default_options_example() -> Result<()> {
    info!("=== Example 2: Default stream and resource ===");

    let stream = Stream::default_stream()?;
    let mr = default_resource();
    let left = Table::new(vec![Column::from_slice(&[true, false], &stream, &mr)?])?;
    let right = Table::new(vec![Column::from_slice(&[1.5f32, 2.5, 3.5], &stream, &mr)?])?;

    let out = api::cross_join(&left, &right, &JoinOptions::new())?;
    stream.synchronize()?;
    info!("Joined {} x {} rows into {}", left.num_rows(), right.num_rows(), out.num_rows());

    Ok(())
}

fn arrow_example() -> Result<()> {
    info!("=== Example 3: Arrow round trip ===");

    let stream = Stream::new()?;
    let mr = default_resource();

    let products = RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("price", DataType::Float64, true),
        ])),
        vec![
            Arc::new(Int32Array::from(vec![1, 2, 3])),
            Arc::new(Float64Array::from(vec![Some(9.99), None, Some(4.5)])),
        ],
    )?;
    let stores = RecordBatch::try_new(
        Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)])),
        vec![Arc::new(Int32Array::from(vec![100, 200]))],
    )?;

    let joined = cross_join(
        &record_batch_to_table(&products, &stream, &mr)?,
        &record_batch_to_table(&stores, &stream, &mr)?,
        &stream,
        &mr,
    )?;
    let batch = table_to_record_batch(&joined, join_schema(&products.schema(), &stores.schema()))?;

    info!("Schema: {:?}", batch.schema());
    info!("Result has {} rows", batch.num_rows());

    Ok(())
}

async fn executor_example() -> Result<()> {
    info!("=== Example 4: Executor configuration ===");

    let config = EngineConfig {
        memory_resource: gpu_join_engine::join::ResourceKind::Pool,
        max_device_memory: Some(64 * 1024 * 1024), // 64MB
        track_allocations: true,
        ..EngineConfig::default()
    };
    let executor = JoinExecutor::new(config)?;
    let (stream, mr) = (executor.stream(), executor.memory_resource());

    let ids: Vec<i64> = (0..1000).collect();
    let left = Table::new(vec![Column::from_slice(&ids, stream, mr)?])?;
    let right = Table::new(vec![Column::from_slice(&ids[..100], stream, mr)?])?;

    let out = executor.execute(JoinKind::Cross, &left, &right).await?;
    info!("Produced {} rows", out.num_rows());

    if let Some(stats) = executor.allocation_stats() {
        info!(
            "Live allocations: {}, live bytes: {}, peak bytes: {}",
            stats.live_allocations, stats.live_bytes, stats.peak_bytes
        );
    }

    Ok(())
}
