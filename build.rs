//! Build script rendering manual pages for `flowframe` and its subcommands.

use std::{fs, path::Path};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

type BoxError = Box<dyn std::error::Error>;

fn render(man: &Man, out_dir: &Path, file: &str) -> Result<(), BoxError> {
    let mut buf: Vec<u8> = Vec::new();
    man.render(&mut buf)?;
    fs::write(out_dir.join(file), buf)?;
    Ok(())
}

fn main() -> Result<(), BoxError> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    let out_dir = Path::new("target/generated-man");
    fs::create_dir_all(out_dir)?;

    let cmd = cli::Cli::command();
    for sub in cmd.get_subcommands() {
        let name = format!("flowframe-{}", sub.get_name());
        let man = Man::new(sub.clone()).title(name.as_str());
        render(&man, out_dir, &format!("{name}.1"))?;
    }
    render(&Man::new(cmd), out_dir, "flowframe.1")
}
