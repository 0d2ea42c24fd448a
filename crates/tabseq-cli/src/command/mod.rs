use clap::{Parser, Subcommand};

use self::{balance::BalanceArg, prepare::PrepareArg, split::SplitArg, windows::WindowsArg};

mod balance;
mod prepare;
mod split;
mod windows;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Split a CSV file into train and test files, preserving row order
    Split(#[clap(flatten)] SplitArg),
    /// Write a balanced evaluation CSV: leading rows of each anomalous class plus benign context
    Balance(#[clap(flatten)] BalanceArg),
    /// Fit the preparation pipeline and report labels and statistics
    Prepare(#[clap(flatten)] PrepareArg),
    /// Prepare a dataset and draw window batches from it
    Windows(#[clap(flatten)] WindowsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Split(arg) => split::run(&arg)?,
        Mode::Balance(arg) => balance::run(&arg)?,
        Mode::Prepare(arg) => prepare::run(&arg)?,
        Mode::Windows(arg) => windows::run(&arg)?,
    }
    Ok(())
}
