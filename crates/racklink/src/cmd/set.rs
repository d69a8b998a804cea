use tracing::info;

use crate::cmd::{connect, DeviceArgs, Power, SetArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_outlets, OutletRow, OutletState, OutputFormat};

pub async fn run(args: SetArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let on = args.state == Power::On;
    let client = connect(device).await?;
    let result = client.set_outlet_state(args.outlet, on).await;
    client.close().await;
    result.map_err(|err| client_error("set failed", err))?;

    info!(outlet = args.outlet, on, "outlet switched");
    let row = OutletRow {
        outlet: args.outlet,
        state: OutletState::from(on),
    };
    print_outlets(device.host()?, &[row], format);
    Ok(SUCCESS)
}
