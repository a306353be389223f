mod opt;

use crate::opt::Opt;

use std::{
    env::var_os,
    fs::{create_dir_all, File},
    io::{stdout, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, shells::*, Generator};
use dirs::home_dir;
use strum::{Display, EnumString};

#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    EnumString,
    ValueEnum,
)]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "lowercase")]
enum Shell {
    Bash,
    Elvish,
    Fish,
    #[allow(clippy::enum_variant_names)]
    PowerShell,
    Zsh,
}

#[derive(Debug, Parser)]
struct ShellSelect {
    /// Shell for which to generate completions
    ///
    /// If omitted, try to generate completions for the login shell
    #[clap(value_enum)]
    shell: Option<Shell>,
}

fn gen_completion<S: Generator, W: Write>(shell: S, mut to: W) {
    generate(shell, &mut Opt::command(), "calodigi", &mut to);
}

fn main() -> Result<()> {
    let shell = ShellSelect::parse()
        .shell
        .map_or_else(get_login_shell, Ok)
        .context("Failed to determine shell")?;
    eprintln!("Generating {shell} completions");
    match shell {
        Shell::Bash => gen_completion(Bash, gen_bash_outfile()?),
        Shell::Elvish => gen_completion(Elvish, &mut stdout()),
        Shell::Fish => gen_completion(Fish, gen_fish_outfile()?),
        Shell::PowerShell => gen_completion(PowerShell, &mut stdout()),
        Shell::Zsh => gen_completion(Zsh, &mut stdout()),
    }
    Ok(())
}

fn get_login_shell() -> Result<Shell> {
    let Some(shell_path) = var_os("SHELL") else {
        bail!("SHELL environment variable is not set")
    };
    let shell_path = PathBuf::from(shell_path);
    let Some(shell_name) = shell_path.file_name().and_then(|n| n.to_str())
    else {
        bail!("Cannot extract shell name from {shell_path:?}")
    };
    let shell = shell_name
        .parse()
        .with_context(|| format!("{shell_name} is not a supported shell"))?;
    Ok(shell)
}

fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = var_os("XDG_DATA_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let mut dir = home_dir().ok_or_else(|| anyhow!("No home directory found"))?;
    dir.push(".local");
    dir.push("share");
    Ok(dir)
}

fn gen_bash_outfile() -> Result<File> {
    let mut outfile = match var_os("BASH_COMPLETION_USER_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => data_dir()?.join("bash-completion"),
    };
    outfile.push("completions");
    outfile.push("calodigi.bash");
    create_file(outfile)
}

fn gen_fish_outfile() -> Result<File> {
    let mut outfile = data_dir()?;
    for part in ["fish", "vendor_completions.d", "calodigi.fish"] {
        outfile.push(part);
    }
    create_file(outfile)
}

fn create_file<P: AsRef<Path>>(name: P) -> Result<File> {
    let name = name.as_ref();
    if let Some(dir) = name.parent() {
        create_dir_all(dir)
            .with_context(|| format!("Failed to create {dir:?}"))?;
    }
    eprintln!("Writing to {name:?}");
    File::create(name).with_context(|| format!("Failed to create {name:?}"))
}
