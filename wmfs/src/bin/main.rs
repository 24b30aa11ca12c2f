use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::error;
use wmfs::wm::supervise;
use wmfs::Exit;
use wmfs::Options;
use wmfs::Wm;

#[derive(Parser, Debug)]
struct Args {
    /// X display to manage, instead of $DISPLAY.
    #[clap(long)]
    display: Option<String>,
    /// Configuration file, instead of $XDG_CONFIG_HOME/wmfs/wmfsrc.toml.
    #[clap(long)]
    config: Option<PathBuf>,
}

fn run_once(opts: &Options) -> wmfs::Result<Exit> {
    let mut wm = Wm::init(opts)?;
    let res = wm.scan().and_then(|()| wm.run());
    let exit = wm.quit();
    res.map(|()| exit)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let opts = Options {
        display: args.display,
        config: args.config,
    };
    if let Err(e) = supervise(&opts, run_once) {
        error!("{}", e);
    }
    // Leaving without a reload is reported as a failure either way.
    exit(1);
}
