//! onboard – prints a branded onboarding sheet for one scannable code.
//!
//! Usage:
//!   onboard <identifier> [output.pdf] [--base-uri URI] [--org NAME]
//!           [--resources DIR] [--verbose]
//!
//! The sheet is made for a sample organisation ("Fake Org", Manchester, New
//! Hampshire) unless `--org` renames it. If `output.pdf` is omitted the PDF
//! is written to `pdfs/zerobase-qr.pdf`.

use std::{env, fs, path::PathBuf, process};

use log::LevelFilter;
use qr_onboard::{
    Address, BundledResources, CodeConfig, ContactInfo, DirResources, DocumentFactory,
    Organization, OrganizationId, QrCodeGenerator, Resources,
};

const DEFAULT_OUTPUT: &str = "pdfs/zerobase-qr.pdf";

struct Options {
    identifier: String,
    output: PathBuf,
    base_uri: Option<String>,
    org_name: String,
    resources: Option<PathBuf>,
    verbose: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    // The filter is decided here, once; the library only emits records.
    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if options.verbose {
        logger.filter_level(LevelFilter::Trace);
    }
    logger.init();

    let result = match &options.resources {
        Some(dir) => run(&options, DirResources::new(dir)),
        None => run(&options, BundledResources),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run<R: Resources>(options: &Options, resources: R) -> qr_onboard::Result<()> {
    let mut config = CodeConfig::default();
    if let Some(base_uri) = &options.base_uri {
        config.base_uri = base_uri.clone();
    }

    let generator = QrCodeGenerator::from_resources(config, &resources)?;
    let code = generator.generate(&options.identifier)?;
    log::info!("encoded {}", code.uri());

    let organization = sample_organization(&options.org_name);
    let document = DocumentFactory::new(resources).site_onboarding(&organization, &code)?;
    let pages = document.layout()?.pages.len();

    if let Some(parent) = options.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(&options.output)?;
    let written = document.render_to(file)?;

    eprintln!(
        "Wrote '{}' ({} bytes, {} page{})",
        options.output.display(),
        written,
        pages,
        if pages == 1 { "" } else { "s" }
    );
    Ok(())
}

fn sample_organization(name: &str) -> Organization {
    Organization {
        id: OrganizationId("sample-org".to_string()),
        name: name.to_string(),
        address: Address::new("", "", "Manchester", "New Hampshire", "", ""),
        contact_name: String::new(),
        contact_info: ContactInfo::default(),
    }
}

fn parse_args(args: &[String]) -> Options {
    let prog = args.first().map(String::as_str).unwrap_or("onboard");
    let mut identifier: Option<String> = None;
    let mut output: Option<PathBuf> = None;
    let mut base_uri: Option<String> = None;
    let mut org_name = "Fake Org".to_string();
    let mut resources: Option<PathBuf> = None;
    let mut verbose = false;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--base-uri" => base_uri = Some(flag_value(prog, arg, iter.next())),
            "--org" => org_name = flag_value(prog, arg, iter.next()),
            "--resources" => resources = Some(PathBuf::from(flag_value(prog, arg, iter.next()))),
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown flag: {other}");
                print_usage(prog);
                process::exit(1);
            }
            value => {
                match positional {
                    0 => identifier = Some(value.to_string()),
                    1 => output = Some(PathBuf::from(value)),
                    _ => {
                        eprintln!("Unexpected argument: {value}");
                        print_usage(prog);
                        process::exit(1);
                    }
                }
                positional += 1;
            }
        }
    }

    let Some(identifier) = identifier else {
        eprintln!("Error: no identifier specified.");
        print_usage(prog);
        process::exit(1);
    };

    Options {
        identifier,
        output: output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        base_uri,
        org_name,
        resources,
        verbose,
    }
}

fn flag_value(prog: &str, flag: &str, value: Option<&String>) -> String {
    match value {
        Some(v) => v.clone(),
        None => {
            eprintln!("Error: {flag} needs a value.");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("onboard – branded QR onboarding sheet generator (qr-onboard)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <identifier> [output.pdf] [--base-uri URI] [--org NAME] [--resources DIR] [--verbose]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <identifier>       Value appended to the base URI and encoded in the QR code");
    eprintln!("  [output.pdf]       Output path (default: {DEFAULT_OUTPUT})");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --base-uri URI     Origin the identifier is appended to (default: https://zerobase.io/)");
    eprintln!("  --org NAME         Organisation name printed on the sheet (default: Fake Org)");
    eprintln!("  --resources DIR    Read qr/qr-code-logo.png and templates/ from DIR instead of the bundled copies");
    eprintln!("  --verbose, -v      Log every pipeline stage");
    eprintln!("  --help             Print this message");
}
