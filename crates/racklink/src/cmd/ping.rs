use std::time::Instant;

use serde::Serialize;

use crate::cmd::{connect, DeviceArgs};
use crate::exit::{client_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct PingOutput<'a> {
    host: &'a str,
    port: u16,
    reachable: bool,
    latency_ms: f64,
}

pub async fn run(device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(device).await?;

    let started = Instant::now();
    let result = client.ping().await;
    let latency_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    client.close().await;
    let reachable = result.map_err(|err| client_error("ping failed", err))?;

    let out = PingOutput {
        host: device.host()?,
        port: device.port,
        reachable,
        latency_ms,
    };
    let fields = [
        ("host", out.host.to_string()),
        ("port", out.port.to_string()),
        ("reachable", out.reachable.to_string()),
        ("latency_ms", format!("{latency_ms:.2}")),
    ];
    print_record(&out, &fields, format);

    Ok(if reachable { SUCCESS } else { FAILURE })
}
