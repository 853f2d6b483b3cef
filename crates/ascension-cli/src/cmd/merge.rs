//! Merge subcommand - combine stores from separate runs

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Store files to merge (earlier files win on conflicting names)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,
}

pub fn run(args: MergeArgs) -> Result<()> {
    let rows = ascension_achievements::merge_stores(&args.inputs, &args.output)?;
    eprintln!(
        "Merged {} stores into {} ({} rows)",
        args.inputs.len(),
        args.output.display(),
        ascension_core::fmt_num(rows)
    );
    Ok(())
}
