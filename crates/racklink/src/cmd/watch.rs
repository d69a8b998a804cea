use racklink_client::{ClientError, RackLinkClient, PRESENCE_MAP_LEN};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::cmd::status::all_outlets;
use crate::cmd::{parse_duration, DeviceArgs, WatchArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_outlets, OutletRow, OutletState, OutputFormat};

pub async fn run(args: WatchArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let period = parse_duration(&args.interval)?;
    let host = device.host()?.to_string();
    let client = RackLinkClient::new(device.client_config()?);

    let polling = poll_loop(&client, &args, &host, period, format);
    let result = tokio::select! {
        result = polling => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, closing session");
            Ok(())
        }
    };

    client.close().await;
    result.map(|()| SUCCESS)
}

async fn poll_loop(
    client: &RackLinkClient,
    args: &WatchArgs,
    host: &str,
    period: std::time::Duration,
    format: OutputFormat,
) -> CliResult<()> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outlets = args.outlets.clone();
    let mut polls = 0usize;

    loop {
        ticker.tick().await;

        let rows = poll(client, &mut outlets).await?;
        print_outlets(host, &rows, format);

        polls += 1;
        if args.count.is_some_and(|count| polls >= count) {
            return Ok(());
        }
    }
}

/// One poll. An unreachable device yields `unknown` for every outlet, or
/// for every presence-map slot while the outlet list is still unknown;
/// only a rejected login ends the watch.
async fn poll(client: &RackLinkClient, outlets: &mut Vec<u8>) -> CliResult<Vec<OutletRow>> {
    if outlets.is_empty() {
        match all_outlets(client).await {
            Ok(all) => *outlets = all,
            Err(err) => {
                warn!(error = %err, "outlet count unavailable");
                if err.code == crate::exit::PERMISSION_DENIED {
                    return Err(err);
                }
                return Ok(unknown(&every_slot()));
            }
        }
    }

    match client.outlets_status(outlets).await {
        Ok(states) => Ok(states
            .into_iter()
            .map(|(outlet, on)| OutletRow {
                outlet,
                state: OutletState::from(on),
            })
            .collect()),
        Err(err @ ClientError::Authentication { .. }) => Err(client_error("status failed", err)),
        Err(err) => {
            warn!(error = %err, "status poll failed");
            Ok(unknown(outlets))
        }
    }
}

fn every_slot() -> Vec<u8> {
    (1..=PRESENCE_MAP_LEN as u8).collect()
}

fn unknown(outlets: &[u8]) -> Vec<OutletRow> {
    outlets
        .iter()
        .map(|&outlet| OutletRow {
            outlet,
            state: OutletState::Unknown,
        })
        .collect()
}
