use racklink_client::OutletPresence;
use serde::Serialize;

use crate::cmd::{connect, DeviceArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct CountOutput<'a> {
    host: &'a str,
    outlets: usize,
    /// Slot map, `true` where an outlet is fitted.
    present: Vec<bool>,
}

pub async fn run(device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(device).await?;
    let result = client.outlet_presence().await;
    client.close().await;
    let presence = result.map_err(|err| client_error("outlet count failed", err))?;

    let present: Vec<bool> = presence.iter().map(|slot| slot.is_present()).collect();
    let out = CountOutput {
        host: device.host()?,
        outlets: present.iter().filter(|&&p| p).count(),
        present,
    };
    let fields = [
        ("host", out.host.to_string()),
        ("outlets", out.outlets.to_string()),
        ("map", presence_map(&presence)),
    ];
    print_record(&out, &fields, format);

    Ok(SUCCESS)
}

/// `#` per fitted slot, `.` per empty one.
fn presence_map(presence: &[OutletPresence]) -> String {
    presence
        .iter()
        .map(|slot| if slot.is_present() { '#' } else { '.' })
        .collect()
}
