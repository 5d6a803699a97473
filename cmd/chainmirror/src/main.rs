mod cli;

use chainmirror_sync::enumerator::enumerate_storage_keys;
use chainmirror_sync::{SyncEngine, SyncOutcome};
use clap::Parser;
use cli::{Cli, Command};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = cli.engine_config()?;
    let mut engine = SyncEngine::new(cfg)?;

    match cli.command {
        Command::Migrate => {
            engine.init().await?;
            let report = engine.migrate_src_contract(cli.src_block_tag).await?;
            info!(
                relay = %format!("{:#x}", report.relay),
                logic = %format!("{:#x}", report.logic),
                proxy = %format!("{:#x}", report.proxy),
                src_block = report.src_block,
                keys = report.keys_migrated,
                chunks = report.chunk_transactions,
                gas = %report.total_gas,
                verify_tx = %format!("{:#x}", report.verify_tx),
                "migration finished"
            );
        }
        Command::Sync { strategy, interval } => {
            engine.init().await?;
            match interval {
                None => report_outcome(engine.sync_once(strategy).await?),
                Some(seconds) => loop {
                    // no engine-level retry: a failed cycle ends the loop
                    // and the operator restarts from the relay checkpoint
                    match engine.sync_once(strategy).await {
                        Ok(outcome) => report_outcome(outcome),
                        Err(e) => {
                            error!("synchronization cycle failed: {e}");
                            return Err(e.into());
                        }
                    }
                    tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
                },
            }
        }
        Command::Diff {
            strategy,
            from_block,
            to_block,
        } => {
            engine.init().await?;
            let diff = engine.compute_diff(strategy, from_block, to_block).await?;
            if diff.is_empty() {
                info!(from_block, to_block, "no differences");
            }
            for slot in &diff {
                println!(
                    "{:#x} {:#x} -> {:#x}",
                    slot.key, slot.target_value, slot.src_value
                );
            }
        }
        Command::Keys { block } => {
            let keys = enumerate_storage_keys(
                engine.source_client(),
                cli.source_address,
                block,
                cli.page_size,
            )
            .await?;
            if keys.is_empty() {
                warn!(%block, "contract has no storage");
            }
            for key in keys {
                println!("{key:#x}");
            }
        }
        Command::DeploymentBlock => {
            let block = engine.find_deployment_block().await?;
            println!("{block}");
        }
    }
    Ok(())
}

fn report_outcome(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::NoOp => info!("nothing to synchronize"),
        SyncOutcome::Applied {
            update_tx,
            keys,
            src_block,
        } => info!(
            keys,
            src_block,
            tx_hash = %format!("{update_tx:#x}"),
            "proxy synchronized"
        ),
    }
}
