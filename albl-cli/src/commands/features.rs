use albl_core::OptionalFeatures;
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct FeaturesArgs {
    /// Print availability as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: FeaturesArgs) -> Result<()> {
    let features = OptionalFeatures::detect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&features)?);
    } else {
        println!("{}", features.report());
    }
    Ok(())
}
