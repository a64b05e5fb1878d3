use clap::Parser;
use tierfs::{cli::Cli, shell::start_shell};

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    start_shell(cli.disk_options(), cli.history);
}
