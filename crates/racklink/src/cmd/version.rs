use racklink_frame::MAX_PAYLOAD_LEN;
use racklink_transport::DEFAULT_PORT;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("racklink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: racklink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", target_triple());
    println!("rustc: {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("default_port: {DEFAULT_PORT}");
    println!("max_payload: {MAX_PAYLOAD_LEN}");

    Ok(SUCCESS)
}

fn target_triple() -> String {
    match option_env!("RACKLINK_BUILD_TARGET") {
        Some(target) => target.to_string(),
        None => format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
    }
}
