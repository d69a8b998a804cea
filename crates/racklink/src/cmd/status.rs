use racklink_client::RackLinkClient;

use crate::cmd::{connect, DeviceArgs, StatusArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_outlets, OutletRow, OutletState, OutputFormat};

pub async fn run(args: StatusArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(device).await?;
    let result = query(&client, &args.outlets).await;
    client.close().await;

    let rows = result?;
    print_outlets(device.host()?, &rows, format);
    Ok(SUCCESS)
}

async fn query(client: &RackLinkClient, outlets: &[u8]) -> CliResult<Vec<OutletRow>> {
    let outlets = match outlets {
        [] => all_outlets(client).await?,
        some => some.to_vec(),
    };
    let states = client
        .outlets_status(&outlets)
        .await
        .map_err(|err| client_error("status failed", err))?;

    Ok(states
        .into_iter()
        .map(|(outlet, on)| OutletRow {
            outlet,
            state: OutletState::from(on),
        })
        .collect())
}

/// Outlets `1..=count` as reported by the PDU.
pub async fn all_outlets(client: &RackLinkClient) -> CliResult<Vec<u8>> {
    let count = client
        .outlet_count()
        .await
        .map_err(|err| client_error("outlet count failed", err))?;
    let last = u8::try_from(count).unwrap_or(u8::MAX);
    Ok((1..=last).collect())
}
