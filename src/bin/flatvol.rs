//! flatvol interactive shell
//!
//! Thin text-parsing wrapper around the [`Volume`] engine: reads a command
//! line, dispatches to one engine operation, prints the result. Host
//! file-system access happens only here, for `import`/`export`.

use anyhow::Context;
use clap::Parser;
use flatvol::Volume;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flatvol")]
#[command(about = "Interactive shell for a single-file flat-namespace volume")]
struct Args {
    /// Path to the volume file (initialized if missing)
    #[arg(short, long, default_value = "flat.vol")]
    volume: PathBuf,
}

const HELP: &str = "\
Available commands:
  create <name>              create an empty file
  rename <old> <new>         rename a file
  delete <name>              delete a file
  list                       list all files
  cat <name>                 print a file's content
  write <name> <content>     replace a file's content with the given text
  import <path> <name>       import an external file into the volume
  export <name> <path>       export a file to an external path
  info                       show usage statistics
  help                       show this help
  exit                       leave the shell";

enum Outcome {
    Continue,
    Exit,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut volume = Volume::open_or_create(&args.volume)
        .with_context(|| format!("failed to open volume {}", args.volume.display()))?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("flatvol> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        match dispatch(&mut volume, line.trim()) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Exit) => break,
            Err(err) => println!("error: {err:#}"),
        }
    }

    volume.close()?;
    Ok(())
}

fn dispatch(volume: &mut Volume, line: &str) -> anyhow::Result<Outcome> {
    let Some((command, rest)) = split_word(line) else {
        return Ok(Outcome::Continue);
    };

    match command {
        "create" => {
            let name = one_arg(rest, "create <name>")?;
            volume.create_file(name)?;
            println!("created {name}");
        }
        "rename" => {
            let (old, new) = two_args(rest, "rename <old> <new>")?;
            volume.rename_file(old, new)?;
            println!("renamed {old} to {new}");
        }
        "delete" => {
            let name = one_arg(rest, "delete <name>")?;
            volume.delete_file(name)?;
            println!("deleted {name}");
        }
        "list" => {
            let entries = volume.list();
            if entries.is_empty() {
                println!("volume is empty");
            }
            for entry in entries {
                println!("{}  {} bytes", entry.name, entry.size);
            }
        }
        "cat" => {
            let name = one_arg(rest, "cat <name>")?;
            let content = volume.read_file(name)?;
            println!("{}", String::from_utf8_lossy(&content));
        }
        "write" => {
            // Content is the rest of the line, spaces included
            let Some((name, content)) = split_word(rest) else {
                anyhow::bail!("usage: write <name> <content>");
            };
            volume.write_file(name, content.as_bytes())?;
            println!("wrote {} bytes to {name}", content.len());
        }
        "import" => {
            let (path, name) = two_args(rest, "import <path> <name>")?;
            let content =
                std::fs::read(path).with_context(|| format!("cannot read {path}"))?;
            volume.import_file(name, &content)?;
            println!("imported {path} as {name}");
        }
        "export" => {
            let (name, path) = two_args(rest, "export <name> <path>")?;
            let content = volume.export_file(name)?;
            std::fs::write(path, content).with_context(|| format!("cannot write {path}"))?;
            println!("exported {name} to {path}");
        }
        "info" => {
            let stats = volume.stats();
            println!("capacity:     {} MiB", stats.capacity / 1024 / 1024);
            println!("block size:   {} MiB", stats.block_size as u64 / 1024 / 1024);
            println!(
                "blocks:       {} used / {} free / {} total",
                stats.used_blocks, stats.free_blocks, stats.total_blocks
            );
            println!(
                "space:        {:.2} MiB used, {:.2} MiB free",
                stats.used_bytes as f64 / 1024.0 / 1024.0,
                stats.free_bytes as f64 / 1024.0 / 1024.0
            );
            println!("files:        {}", stats.file_count);
        }
        "help" => println!("{HELP}"),
        "exit" | "quit" => return Ok(Outcome::Exit),
        other => println!("unknown command: {other} (try 'help')"),
    }

    Ok(Outcome::Continue)
}

/// Split off the first whitespace-delimited word; returns (word, trimmed rest)
fn split_word(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim_start())),
        None => Some((line, "")),
    }
}

fn one_arg<'a>(rest: &'a str, usage: &str) -> anyhow::Result<&'a str> {
    match split_word(rest) {
        Some((arg, "")) => Ok(arg),
        _ => anyhow::bail!("usage: {usage}"),
    }
}

fn two_args<'a>(rest: &'a str, usage: &str) -> anyhow::Result<(&'a str, &'a str)> {
    if let Some((first, rest)) = split_word(rest) {
        if let Some((second, "")) = split_word(rest) {
            return Ok((first, second));
        }
    }
    anyhow::bail!("usage: {usage}")
}
