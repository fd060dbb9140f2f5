use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;
use webparts::{
    Checker, ConversionPipeline, ConvertOptions, ElementKind, LibrePcbCli, ManifestStore,
    NoChecker,
};

#[derive(Parser)]
#[command(
    name = "webparts",
    about = "Convert LCSC/EasyEDA parts into LibrePCB library elements"
)]
struct Cli {
    /// LibrePCB library directory
    #[arg(
        long,
        global = true,
        env = "WEBPARTS_LIBRARY",
        default_value = "./WebParts.lplib"
    )]
    library: PathBuf,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a vendor part file (.json) into the library
    Convert {
        input: PathBuf,

        /// Path to librepcb-cli; elements are not checked when omitted
        #[arg(long)]
        checker: Option<PathBuf>,

        /// Seconds before a checker run is abandoned
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Use this symbol UUID instead of the vendor one
        #[arg(long)]
        symbol_uuid: Option<Uuid>,

        /// Use this package UUID instead of the vendor one
        #[arg(long)]
        package_uuid: Option<Uuid>,

        /// Use this component UUID instead of the derived one
        #[arg(long)]
        component_uuid: Option<Uuid>,

        /// Use this device UUID instead of the derived one
        #[arg(long)]
        device_uuid: Option<Uuid>,
    },
    /// Mark an element as reviewed (kind: symbol, footprint, component, device)
    Approve { kind: ElementKind, uuid: Uuid },
    /// Send an element back to review
    Reopen { kind: ElementKind, uuid: Uuid },
    /// Reject a part by device UUID
    Reject { device: Uuid },
    /// Show the manifest of a part by device UUID
    Status { device: Uuid },
    /// List all parts in the library
    List,
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn convert<C: Checker>(
    library: PathBuf,
    input: &std::path::Path,
    checker: C,
    options: ConvertOptions,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = ConversionPipeline::new(library, checker, options);
    let report = pipeline.convert_file(input)?;
    print(&report, pretty)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = ManifestStore::new(&cli.library);
    match cli.command {
        Command::Convert {
            input,
            checker,
            timeout_secs,
            symbol_uuid,
            package_uuid,
            component_uuid,
            device_uuid,
        } => {
            let options = ConvertOptions {
                checker_timeout: Duration::from_secs(timeout_secs),
                symbol_uuid,
                package_uuid,
                component_uuid,
                device_uuid,
                ..Default::default()
            };
            match checker {
                Some(program) => convert(
                    cli.library,
                    &input,
                    LibrePcbCli::new(program),
                    options,
                    cli.pretty,
                ),
                None => convert(cli.library, &input, NoChecker, options, cli.pretty),
            }
        }
        Command::Approve { kind, uuid } => print(&store.approve_element(kind, &uuid)?, cli.pretty),
        Command::Reopen { kind, uuid } => print(&store.reopen_element(kind, &uuid)?, cli.pretty),
        Command::Reject { device } => print(&store.reject_part(&device)?, cli.pretty),
        Command::Status { device } => print(&store.load_part(&device)?, cli.pretty),
        Command::List => print(&store.list_parts()?, cli.pretty),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
