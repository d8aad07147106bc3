//! cbmfs - drive a CBM DOS filesystem device from the host shell.
//!
//! Usage:
//!   cbmfs [--dir DIR] [--unit N] [--config FILE] <command>
//!
//! Examples:
//!   cbmfs --dir ~/c64 list               # Directory listing
//!   cbmfs --dir ~/c64 list 'g*'          # Only names matching g*
//!   cbmfs --dir ~/c64 cmd 's0:old*'      # Scratch files
//!   cbmfs --dir ~/c64 load game --out game.prg
//!   cbmfs --dir ~/c64 --save-p00 save game game.prg
//!
//! Text typed here is host text: lowercase letters become unshifted PETSCII,
//! which is what a C64 sends for plain typing.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fsdev_core::fs::charset::{host_to_petscii, petscii_to_host_string};
use fsdev_core::{
    ConfigStore, DirectoryStore, FsDeviceManager, HostFileIo, MemoryDirectoryStore, UnitConfig,
    UnitOptions,
};

/// CBM DOS filesystem device CLI
#[derive(Parser, Debug)]
#[command(name = "cbmfs")]
#[command(about = "Access host directories through an emulated CBM drive")]
struct Args {
    /// Host directory served by the unit
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Unit number (8-11)
    #[arg(short, long, default_value_t = 8, global = true)]
    unit: u8,

    /// JSON device configuration; directory changes are saved back to it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show P00 containers under their host names
    #[arg(long, global = true)]
    no_convert_p00: bool,

    /// Save new files as P00 containers
    #[arg(long, global = true)]
    save_p00: bool,

    /// Hide files that are not P00 containers
    #[arg(long, global = true)]
    hide_cbm_files: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the directory listing
    List {
        /// Name mask, e.g. "g*" or "sub/*.prg"
        pattern: Option<String>,
    },
    /// Send a command to channel 15 and print the status
    Cmd {
        /// Command text, e.g. "cd:games" or "r0:new=old"
        text: String,
    },
    /// Print the pending status line
    Status,
    /// Read a file through channel 0
    Load {
        name: String,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write a host file through channel 1
    Save { name: String, host_file: PathBuf },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> CliResult<()> {
    env_logger::init();
    let args = Args::parse();

    match &args.config {
        Some(path) => {
            let mut store = ConfigStore::load(path)?;
            if let Some(dir) = &args.dir {
                store.config_mut().unit_mut(args.unit)?.directory = Some(dir.clone());
            }
            let config = store.config().clone();
            let unit = config.unit(args.unit);
            let mut device = FsDeviceManager::with_config(store, HostFileIo::new(), &config);
            run(&mut device, &args, &unit)
        }
        None => {
            let dir = args.dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let mut device =
                FsDeviceManager::new(MemoryDirectoryStore::new(dir), HostFileIo::new());
            run(&mut device, &args, &UnitConfig::default())
        }
    }
}

fn run<S: DirectoryStore>(
    device: &mut FsDeviceManager<S, HostFileIo>,
    args: &Args,
    unit_config: &UnitConfig,
) -> CliResult<()> {
    let unit = args.unit;
    let mut options = UnitOptions::from(unit_config);
    if args.no_convert_p00 {
        options.convert_p00 = false;
    }
    options.save_p00 |= args.save_p00;
    options.hide_cbm_files |= args.hide_cbm_files;
    device.configure_unit(unit, options)?;
    log::debug!("unit {} serving {}", unit, device.directory(unit).display());

    // Drop the power-on version banner.
    device.read_status(unit)?;

    match &args.command {
        Command::List { pattern } => {
            let mut name = b"$".to_vec();
            if let Some(pattern) = pattern {
                name.push(b':');
                name.extend(host_to_petscii(pattern.as_bytes()));
            }
            let program = read_file(device, unit, 0, &name)?;
            for line in basic_lines(&program) {
                println!("{}", line);
            }
        }
        Command::Cmd { text } => {
            println!("{}", send_command(device, unit, text)?);
        }
        Command::Status => {
            println!("{}", status_line(device, unit)?);
        }
        Command::Load { name, out } => {
            let data = read_file(device, unit, 0, &host_to_petscii(name.as_bytes()))?;
            match out {
                Some(path) => std::fs::write(path, &data)?,
                None => std::io::stdout().write_all(&data)?,
            }
        }
        Command::Save { name, host_file } => {
            let data = std::fs::read(host_file)?;
            if device.open(unit, 1, &host_to_petscii(name.as_bytes())).is_err() {
                return Err(status_line(device, unit)?.into());
            }
            for &byte in &data {
                device.write_byte(unit, 1, byte)?;
            }
            device.close(unit, 1)?;
            eprintln!("{} bytes written", data.len());
        }
    }

    Ok(())
}

/// Run a command on channel 15. The status line comes back either way; a
/// failed command turns it into the error.
fn send_command<S: DirectoryStore>(
    device: &mut FsDeviceManager<S, HostFileIo>,
    unit: u8,
    text: &str,
) -> CliResult<String> {
    let result = device.send_command(unit, &host_to_petscii(text.as_bytes()));
    let line = status_line(device, unit)?;
    match result {
        Ok(_) => Ok(line),
        Err(_) => Err(line.into()),
    }
}

/// Open `name` on `secondary` and read it to the end.
fn read_file<S: DirectoryStore>(
    device: &mut FsDeviceManager<S, HostFileIo>,
    unit: u8,
    secondary: u8,
    name: &[u8],
) -> CliResult<Vec<u8>> {
    if device.open(unit, secondary, name).is_err() {
        return Err(status_line(device, unit)?.into());
    }
    let mut data = Vec::new();
    loop {
        let byte = device.read_byte(unit, secondary)?;
        if byte.eof {
            break;
        }
        data.push(byte.data);
    }
    device.close(unit, secondary)?;
    Ok(data)
}

/// The pending status line as host text, without its CR.
fn status_line<S: DirectoryStore>(
    device: &mut FsDeviceManager<S, HostFileIo>,
    unit: u8,
) -> CliResult<String> {
    let line = device.read_status(unit)?;
    Ok(petscii_to_host_string(&line).trim_end_matches('\r').to_string())
}

/// Decode a listing program into `"<blocks> <text>"` lines.
fn basic_lines(program: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    // Skip the load address.
    let mut pos = 2;
    while pos + 4 <= program.len() {
        if program[pos] == 0 && program[pos + 1] == 0 {
            break;
        }
        let number = u16::from_le_bytes([program[pos + 2], program[pos + 3]]);
        let text_start = pos + 4;
        let text_end = program[text_start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(program.len(), |i| text_start + i);
        let text: Vec<u8> = program[text_start..text_end]
            .iter()
            .copied()
            .filter(|&b| b != 0x12)
            .collect();
        lines.push(format!("{} {}", number, petscii_to_host_string(&text).trim_end()));
        pos = text_end + 1;
    }
    lines
}
