//! WorldState export.
//!
//! Streams a full baseline to one client: the block history from genesis to
//! the current head, then every account. The sequence is
//! `NumBlocks`, `Blocks`×n, `NumAccounts`, `Accounts`×m, then the buffered
//! `BlockAdded` events and `WorldStateDone` (see
//! [`SnapshotGate::complete_export`](super::transition::SnapshotGate::complete_export)).

use std::time::{Duration, Instant};

use ledgerwire_core::backend::is_sentinel_hash;
use ledgerwire_core::summary::{AccountDelta, BlockSummary};
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::metrics::{SNAPSHOT_EXPORT_DURATION_SECONDS, SNAPSHOT_EXPORTS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::types::{RpcResponse, labels};
use crate::websocket::transition::ExportMode;

/// Counts from a completed export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    /// Block summaries streamed.
    pub blocks: usize,
    /// Account summaries streamed.
    pub accounts: usize,
    /// Buffered block events flushed at the Live transition.
    pub drained: usize,
    /// Whether this export moved the session to Live.
    pub initial: bool,
}

/// Run a full WorldState export for the session behind `ctx`.
///
/// On failure nothing further is sent, the session stays in its current
/// state and the buffer is kept, so a retry still delivers every buffered
/// event exactly once.
pub async fn stream_world_state(ctx: &RpcContext) -> Result<ExportReport, RpcError> {
    let mode = ctx.gate.begin_export().await?;
    let started = Instant::now();
    counter!(SNAPSHOT_EXPORTS_TOTAL, "outcome" => "started").increment(1);
    info!(session_id = %ctx.session_id, ?mode, "world state export started");

    let (blocks, accounts) = match export_baseline(ctx).await {
        Ok(counts) => counts,
        Err(e) => {
            ctx.gate.abort_export().await;
            counter!(SNAPSHOT_EXPORTS_TOTAL, "outcome" => "failed").increment(1);
            warn!(session_id = %ctx.session_id, code = e.code(), error = %e, "world state export aborted");
            return Err(e);
        }
    };

    let drained = match ctx.gate.complete_export(mode, &ctx.outbound).await {
        Ok(drained) => drained,
        Err(e) => {
            counter!(SNAPSHOT_EXPORTS_TOTAL, "outcome" => "failed").increment(1);
            return Err(e.into());
        }
    };

    counter!(SNAPSHOT_EXPORTS_TOTAL, "outcome" => "completed").increment(1);
    histogram!(SNAPSHOT_EXPORT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    info!(session_id = %ctx.session_id, blocks, accounts, drained, "world state export complete");
    Ok(ExportReport {
        blocks,
        accounts,
        drained,
        initial: mode == ExportMode::Initial,
    })
}

async fn export_baseline(ctx: &RpcContext) -> Result<(usize, usize), RpcError> {
    let pace = ctx.settings.snapshot.pace_interval();

    let blocks = walk_history(ctx).await?;
    ctx.outbound
        .write(RpcResponse::success(labels::NUM_BLOCKS, json!(blocks.len())))
        .await?;
    for summary in &blocks {
        ctx.outbound.write(RpcResponse::push(labels::BLOCKS, summary)?).await?;
        pause(pace).await;
    }

    let world = ctx.call(ctx.ledger.world_state()).await?;
    ctx.outbound
        .write(RpcResponse::success(labels::NUM_ACCOUNTS, json!(world.len())))
        .await?;
    for account in world.iter() {
        ctx.outbound
            .write(RpcResponse::push(labels::ACCOUNTS, &AccountDelta::from(account))?)
            .await?;
        pause(pace).await;
    }

    Ok((blocks.len(), world.len()))
}

/// Block summaries from genesis to the current head, oldest first.
///
/// Follows parent links back from the head until the sentinel hash. A
/// missing block, or a walk longer than the reported block count, fails with
/// [`RpcError::SnapshotWalk`].
pub async fn walk_history(ctx: &RpcContext) -> Result<Vec<BlockSummary>, RpcError> {
    let mut hash = ctx.call(ctx.ledger.latest_block_hash()).await?;
    let limit = ctx.call(ctx.ledger.block_count()).await?;

    let mut blocks = Vec::new();
    while !is_sentinel_hash(&hash) {
        if blocks.len() as u64 >= limit {
            return Err(RpcError::SnapshotWalk {
                message: format!(
                    "history walk exceeded {limit} blocks at {hash}; the chain has a cycle"
                ),
            });
        }
        let block = ctx
            .call(ctx.ledger.block(&hash))
            .await?
            .ok_or_else(|| RpcError::SnapshotWalk {
                message: format!(
                    "block {hash} is missing, {} blocks below the head",
                    blocks.len()
                ),
            })?;
        blocks.push(BlockSummary::from_block(&block));
        hash = block.prev_hash;
    }
    blocks.reverse();
    debug!(blocks = blocks.len(), "history walk complete");
    Ok(blocks)
}

async fn pause(pace: Duration) {
    if !pace.is_zero() {
        tokio::time::sleep(pace).await;
    }
}
