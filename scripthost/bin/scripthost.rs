use clap::Parser;
use scripthost::{
    cli::{build_host, dispatch, HostArgs},
    HostResult,
};

//--------------------------------------------------------------------------------------------------
// Function: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> HostResult<()> {
    tracing_subscriber::fmt::init();

    let args = HostArgs::try_parse().map_err(scripthost::HostError::Args)?;
    let host = build_host(&args).await?;
    let result = dispatch(&host, args.subcommand).await;
    host.close();
    result
}
