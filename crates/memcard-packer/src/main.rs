use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use colored::Colorize;
use memcard::{CorruptFilePolicy, FormatKind};
use memcard_packer::{list_card, pack_card, print_listing, unpack_card, Error, OpenOptions};

/// Pack, unpack and list retro console memory card images.
#[derive(FromArgs)]
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Pack(PackArgs),
    Unpack(UnpackArgs),
    List(ListArgs),
}

/// Build a card image from a folder holding card.toml and the payload files.
#[derive(FromArgs)]
#[argh(subcommand, name = "pack")]
struct PackArgs {
    /// folder holding card.toml
    #[argh(positional)]
    folder: PathBuf,
    /// image file to write
    #[argh(positional)]
    output: PathBuf,
}

/// Extract every save of a card image into a folder, with a card.toml to pack it back.
#[derive(FromArgs)]
#[argh(subcommand, name = "unpack")]
struct UnpackArgs {
    /// card image to read
    #[argh(positional)]
    image: PathBuf,
    /// folder to write the saves and card.toml into
    #[argh(positional)]
    folder: PathBuf,
    /// card format (gamecube, dreamcast, n64, ps1, saturn), detected when omitted
    #[argh(option)]
    format: Option<FormatKind>,
    /// what to do with a corrupted save: strict or skip
    #[argh(option)]
    corrupt_files: Option<CorruptFilePolicy>,
    /// write saves as GCI, DCI or BUP files where the console has a single-save format
    #[argh(switch)]
    individual: bool,
}

/// Show the saves on a card image.
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
struct ListArgs {
    /// card image to read
    #[argh(positional)]
    image: PathBuf,
    /// card format (gamecube, dreamcast, n64, ps1, saturn), detected when omitted
    #[argh(option)]
    format: Option<FormatKind>,
    /// what to do with a corrupted save: strict or skip
    #[argh(option)]
    corrupt_files: Option<CorruptFilePolicy>,
    /// print the listing as JSON
    #[argh(switch)]
    json: bool,
}

fn run(args: Args) -> Result<(), Error> {
    match args.command {
        Command::Pack(args) => pack_card(&args.folder, &args.output),
        Command::Unpack(args) => {
            let options = OpenOptions {
                format: args.format,
                corrupt_files: args.corrupt_files,
            };
            let config = unpack_card(&args.image, &args.folder, options, args.individual)?;
            println!(
                "{} {} {}",
                "Unpacked".dimmed(),
                config.files.len(),
                format!("{} saves", config.format).dimmed()
            );
            Ok(())
        }
        Command::List(args) => {
            let options = OpenOptions {
                format: args.format,
                corrupt_files: args.corrupt_files,
            };
            let listing = list_card(&args.image, options)?;
            if args.json {
                let json = serde_json::to_string_pretty(&listing)
                    .map_err(|e| Error::ConfigError(e.to_string()))?;
                println!("{json}");
            } else {
                print_listing(&listing);
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red());
            ExitCode::FAILURE
        }
    }
}
