//! Address Book CLI
//!
//! Converts address books between XML and JSON and validates them.
//!
//! ```text
//! address-book                         interactive menu
//! address-book <input> <output>        convert, direction from extensions
//! address-book <input> -v|--validate   validate only
//! address-book <input> --round-trip    convert there and back, show differences
//! address-book --write-config <path>   save the effective configuration
//! ```

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use address_book::{AddressBookSchema, AppConfig, ConvertError, Converter, Format};

const EXIT_USAGE: u8 = 2;
const EXIT_IO: u8 = 4;
const EXIT_CONFIG: u8 = 5;

#[derive(Parser)]
#[command(name = "address-book")]
#[command(about = "Convert address books between XML and JSON and validate them")]
struct Cli {
    /// Input address book (.xml or .json); omit for interactive mode
    input: Option<PathBuf>,

    /// Output file; the two extensions select the conversion direction
    output: Option<PathBuf>,

    /// Validate the input instead of converting it
    #[arg(short, long, conflicts_with_all = ["output", "round_trip"])]
    validate: bool,

    /// Convert the input to the other form and back and compare
    #[arg(long, conflicts_with = "output")]
    round_trip: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Schema definition file, overriding the configured one
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Write the effective configuration to this file and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["input", "validate", "round_trip"])]
    write_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(path) = &cli.write_config {
        return ExitCode::from(exit_code(write_config(&config, path, &mut out)));
    }

    let converter = match build_converter(&config) {
        Ok(converter) => converter,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    ExitCode::from(exit_code(run(&cli, &converter, &mut out)))
}

/// Exit status of a finished command; console I/O failures count as I/O errors
fn exit_code(result: io::Result<u8>) -> u8 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_IO
        }
    }
}

fn write_config<W: Write>(config: &AppConfig, path: &Path, out: &mut W) -> io::Result<u8> {
    if let Err(e) = config.save(path) {
        writeln!(out, "Could not write configuration to {}: {}", path.display(), e)?;
        return Ok(EXIT_IO);
    }
    writeln!(out, "Configuration written to {}", path.display())?;
    Ok(0)
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from(cli.config.as_deref()).context("Could not load configuration")?;
    if let Some(schema) = &cli.schema {
        config.schema.path = Some(schema.clone());
    }
    Ok(config)
}

fn build_converter(config: &AppConfig) -> anyhow::Result<Converter> {
    let schema: AddressBookSchema = config.load_schema().context("Could not load address book schema")?;
    Ok(Converter::new(schema, config.convert_options()))
}

fn run<W: Write>(cli: &Cli, converter: &Converter, out: &mut W) -> io::Result<u8> {
    let Some(input) = &cli.input else {
        if cli.validate || cli.round_trip {
            writeln!(out, "An input address book must be specified.")?;
            print_usage(out)?;
            return Ok(EXIT_USAGE);
        }
        let stdin = io::stdin();
        return interactive(converter, &mut stdin.lock(), out);
    };

    if cli.validate {
        return validate(converter, input, out);
    }
    if cli.round_trip {
        return round_trip(converter, input, out);
    }
    match &cli.output {
        Some(output) => convert(converter, input, output, out),
        None => {
            writeln!(out, "Invalid number of arguments passed.")?;
            print_usage(out)?;
            Ok(EXIT_USAGE)
        }
    }
}

/// Menu loop; ends on option 4 or end of input
fn interactive<R: BufRead, W: Write>(converter: &Converter, input: &mut R, out: &mut W) -> io::Result<u8> {
    loop {
        writeln!(out, "Please select an option by typing the corresponding number:")?;
        writeln!(out, "[1] Convert address book from XML to JSON")?;
        writeln!(out, "[2] Convert address book from JSON to XML")?;
        writeln!(out, "[3] Validate schema of address book")?;
        writeln!(out, "[4] Exit")?;

        let Some(selection) = read_line(input)? else {
            return Ok(0);
        };

        match selection.trim() {
            "1" => {
                let Some((source, target)) = prompt_paths(input, out, "XML", "JSON")? else {
                    return Ok(0);
                };
                report_conversion(out, converter.markup_to_notation(&source, &target), Format::Markup)?;
            }
            "2" => {
                let Some((source, target)) = prompt_paths(input, out, "JSON", "XML")? else {
                    return Ok(0);
                };
                report_conversion(out, converter.notation_to_markup(&source, &target), Format::Notation)?;
            }
            "3" => {
                writeln!(out, "Please enter the filepath for the XML or JSON document to be validated:")?;
                let Some(path) = read_line(input)? else {
                    return Ok(0);
                };
                validate(converter, Path::new(path.trim()), out)?;
            }
            "4" => return Ok(0),
            _ => writeln!(out, "Invalid option selected!")?,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn prompt_paths<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    from: &str,
    to: &str,
) -> io::Result<Option<(PathBuf, PathBuf)>> {
    writeln!(out, "Please enter the filepath for the {} address document to be converted:", from)?;
    let Some(source) = read_line(input)? else {
        return Ok(None);
    };
    writeln!(out, "Please enter the filepath for the output {} file:", to)?;
    let Some(target) = read_line(input)? else {
        return Ok(None);
    };
    Ok(Some((PathBuf::from(source.trim()), PathBuf::from(target.trim()))))
}

fn convert<W: Write>(converter: &Converter, input: &Path, output: &Path, out: &mut W) -> io::Result<u8> {
    let from = Format::from_path(input).unwrap_or(Format::Markup);
    let code = report_conversion(out, converter.convert(input, output), from)?;
    if code == EXIT_USAGE {
        print_usage(out)?;
    }
    Ok(code)
}

fn report_conversion<W: Write>(out: &mut W, result: address_book::Result<()>, from: Format) -> io::Result<u8> {
    match result {
        Ok(()) => {
            writeln!(out, "Successfully converted {} address book to {}!", from, from.other())?;
            Ok(0)
        }
        Err(e) => {
            warn!(error = %e, "Could not convert {} address book to {}", from, from.other());
            writeln!(out, "Something went wrong!")?;
            report_error(out, &e)?;
            Ok(e.exit_code())
        }
    }
}

fn report_error<W: Write>(out: &mut W, e: &ConvertError) -> io::Result<()> {
    writeln!(out, "{}", e)?;
    if let ConvertError::InvalidDocument { reason, .. } | ConvertError::InvalidConversion { reason, .. } = e {
        if reason.violations().is_empty() {
            writeln!(out, "  {}", reason)?;
        }
        for violation in reason.violations() {
            writeln!(out, "  - {}", violation)?;
        }
    }
    Ok(())
}

fn validate<W: Write>(converter: &Converter, input: &Path, out: &mut W) -> io::Result<u8> {
    match converter.validate(input) {
        Ok(true) => {
            writeln!(out, "This document is a valid address book.")?;
            Ok(0)
        }
        Ok(false) => {
            writeln!(out, "This document is not a valid address book.")?;
            Ok(1)
        }
        Err(e) => {
            report_error(out, &e)?;
            Ok(e.exit_code())
        }
    }
}

fn round_trip<W: Write>(converter: &Converter, input: &Path, out: &mut W) -> io::Result<u8> {
    match converter.round_trip(input) {
        Ok(report) if report.identical => {
            writeln!(
                out,
                "Round trip through {} reproduced {} byte-for-byte.",
                report.format.other(),
                report.input.display()
            )?;
            Ok(0)
        }
        Ok(report) => {
            writeln!(out, "Round trip through {} changed the document:", report.format.other())?;
            write!(out, "{}", report.diff)?;
            Ok(1)
        }
        Err(e) => {
            writeln!(out, "Something went wrong!")?;
            report_error(out, &e)?;
            Ok(e.exit_code())
        }
    }
}

fn print_usage<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", Cli::command().render_usage())?;
    writeln!(out, "To convert an address book:")?;
    writeln!(out, "  address-book <input file> <output file>")?;
    writeln!(out, "To validate that a document follows the address book schema:")?;
    writeln!(out, "  address-book <input file> --validate")?;
    writeln!(out, "  address-book <input file> -v")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_menu(converter: &Converter, script: &str) -> String {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let code = interactive(converter, &mut input, &mut out).unwrap();
        assert_eq!(code, 0);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_menu_rejects_unknown_option_and_exits() {
        let converter = Converter::with_embedded_schema().unwrap();
        let output = run_menu(&converter, "9\n4\n");
        assert!(output.contains("Invalid option selected!"));
        assert_eq!(output.matches("[4] Exit").count(), 2);
    }

    #[test]
    fn test_menu_ends_on_eof() {
        let converter = Converter::with_embedded_schema().unwrap();
        let output = run_menu(&converter, "");
        assert!(output.contains("[1] Convert address book from XML to JSON"));
    }

    #[test]
    fn test_menu_converts_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("book.xml");
        let json = dir.path().join("book.json");
        std::fs::write(
            &xml,
            "<AddressBook><Contact><name>Jane Doe</name><phone>555-1234</phone></Contact></AddressBook>",
        )
        .unwrap();

        let converter = Converter::with_embedded_schema().unwrap();
        let script = format!("1\n{}\n{}\n3\n{}\n4\n", xml.display(), json.display(), json.display());
        let output = run_menu(&converter, &script);

        assert!(output.contains("Successfully converted XML address book to JSON!"));
        assert!(output.contains("This document is a valid address book."));
        assert!(json.exists());
    }

    #[test]
    fn test_cli_parses_validate_flag() {
        let cli = Cli::try_parse_from(["address-book", "book.xml", "-v"]).unwrap();
        assert!(cli.validate);
        assert_eq!(cli.input, Some(PathBuf::from("book.xml")));
        assert!(cli.output.is_none());

        assert!(Cli::try_parse_from(["address-book", "book.xml", "book.json", "--validate"]).is_err());
    }

    #[test]
    fn test_console_failure_is_an_io_exit() {
        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed");
        assert_eq!(exit_code(Err(broken)), EXIT_IO);
        assert_eq!(exit_code(Ok(1)), 1);
    }

    #[test]
    fn test_write_config_saves_effective_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("effective.toml");

        let cli = Cli::try_parse_from([
            "address-book",
            "--schema",
            "custom.json",
            "--write-config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert!(Cli::try_parse_from(["address-book", "book.xml", "--write-config", "x.toml"]).is_err());

        let mut config = AppConfig::default();
        config.schema.path = cli.schema.clone();
        let mut out = Vec::new();
        let code = write_config(&config, cli.write_config.as_deref().unwrap(), &mut out).unwrap();
        assert_eq!(code, 0);
        assert!(String::from_utf8(out).unwrap().contains("Configuration written"));

        let saved = AppConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(saved.schema.path, Some(PathBuf::from("custom.json")));

        let mut out = Vec::new();
        let code = write_config(&config, &dir.path().join("missing").join("x.toml"), &mut out).unwrap();
        assert_eq!(code, EXIT_IO);
    }

    #[test]
    fn test_unsupported_direction_prints_usage() {
        let converter = Converter::with_embedded_schema().unwrap();
        let mut out = Vec::new();
        let code = convert(&converter, Path::new("a.xml"), Path::new("b.txt"), &mut out).unwrap();
        assert_eq!(code, EXIT_USAGE);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("accepted file types are .xml or .json"));
        assert!(text.contains("--validate"));
    }
}
